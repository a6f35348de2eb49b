// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The production [`WorkerSpawner`]: re-execs this same binary under the
//! hidden `--worker` flag and wires its stdin/stdout to the broker's
//! per-worker unicast channel and report channel.
//!
//! This is the one place the daemon crate is allowed to bridge
//! `udevbroker-broker`'s adapter-agnostic trait with `udevbroker-adapters`'s
//! concrete implementations — `broker` itself has no dependency on
//! `adapters` at all.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use udevbroker_broker::worker_pool::{WorkerReport, WorkerSpawner};
use udevbroker_broker::BrokerError;
use udevbroker_core::{Event, PropertiesSet, WorkerId};

use crate::worker_main::WorkerAck;

#[derive(Clone)]
pub struct SubprocessWorkerSpawner {
    exe: std::path::PathBuf,
    rule_engine_path: std::path::PathBuf,
    data_dir: std::path::PathBuf,
}

impl SubprocessWorkerSpawner {
    pub fn new(
        rule_engine_path: impl Into<std::path::PathBuf>,
        data_dir: impl Into<std::path::PathBuf>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            exe: std::env::current_exe()?,
            rule_engine_path: rule_engine_path.into(),
            data_dir: data_dir.into(),
        })
    }
}

#[async_trait::async_trait]
impl WorkerSpawner for SubprocessWorkerSpawner {
    async fn spawn(
        &self,
        event: &Event,
        properties: &PropertiesSet,
        report: mpsc::UnboundedSender<WorkerReport>,
    ) -> Result<(WorkerId, mpsc::UnboundedSender<Event>), BrokerError> {
        let mut child = Command::new(&self.exe)
            .arg("--worker")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .env(
                "UDEV_PROPERTIES",
                serde_json::to_string(properties).unwrap_or_default(),
            )
            .env("UDEV_RULE_ENGINE", &self.rule_engine_path)
            .env("UDEV_DATA_DIR", &self.data_dir)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrokerError::Spawn(e.to_string()))?;

        let pid = child
            .id()
            .ok_or_else(|| BrokerError::Spawn("child exited before reporting a pid".to_string()))?;
        let worker = WorkerId::new(pid);

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BrokerError::Spawn("child stdin not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BrokerError::Spawn("child stdout not piped".to_string()))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
        tokio::spawn(forward_events(stdin, event_rx));
        tokio::spawn(drain_acks(worker, stdout, report.clone()));
        tokio::spawn(reap_child(worker, child, report));

        send_first_event(&event_tx, event.clone());
        Ok((worker, event_tx))
    }

    fn kill(&self, worker: WorkerId) -> Result<(), BrokerError> {
        kill(Pid::from_raw(worker.get() as i32), Signal::SIGTERM)
            .map_err(|e| BrokerError::Spawn(format!("kill({worker}) failed: {e}")))
    }
}

fn send_first_event(tx: &mpsc::UnboundedSender<Event>, event: Event) {
    if tx.send(event).is_err() {
        tracing::warn!("worker's stdin forwarder exited before its first event was sent");
    }
}

/// Feed events arriving on the broker's unicast channel to the child's
/// stdin, one length-prefixed JSON frame each. At most one event is
/// outstanding per worker at a time, enforced by the pool, not here.
async fn forward_events(
    mut stdin: tokio::process::ChildStdin,
    mut events: mpsc::UnboundedReceiver<Event>,
) {
    while let Some(event) = events.recv().await {
        let Ok(payload) = serde_json::to_vec(&event) else {
            tracing::error!(seqnum = event.seqnum, "failed to encode event for worker stdin");
            continue;
        };
        if stdin.write_all(&(payload.len() as u32).to_be_bytes()).await.is_err()
            || stdin.write_all(&payload).await.is_err()
            || stdin.flush().await.is_err()
        {
            tracing::warn!("worker stdin pipe closed, worker is likely dead");
            return;
        }
    }
}

/// Read [`WorkerAck`] frames from the child's stdout and translate each into
/// a [`WorkerReport::Completed`] for the pool.
async fn drain_acks(
    worker: WorkerId,
    mut stdout: tokio::process::ChildStdout,
    report: mpsc::UnboundedSender<WorkerReport>,
) {
    loop {
        let mut len_buf = [0u8; 4];
        if stdout.read_exact(&mut len_buf).await.is_err() {
            return;
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        if stdout.read_exact(&mut buf).await.is_err() {
            return;
        }
        match serde_json::from_slice::<WorkerAck>(&buf) {
            Ok(_ack) => {
                let _ = report.send(WorkerReport::Completed { worker });
            }
            Err(e) => tracing::warn!(error = %e, "malformed worker ack, ignored"),
        }
    }
}

/// Wait for the child to exit and report it.
async fn reap_child(worker: WorkerId, mut child: Child, report: mpsc::UnboundedSender<WorkerReport>) {
    let _ = child.wait().await;
    let _ = report.send(WorkerReport::Exited { worker });
}
