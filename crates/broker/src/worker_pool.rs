// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker pool: spawns, recycles, times out, and reaps worker
//! subprocesses.

use crate::error::BrokerError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use udevbroker_core::{Clock, Event, PropertiesSet, WorkerId, WorkerState};

/// Default `children_max` when not overridden: `8 + 2 * cpu_count`,
/// computed via `std::thread::available_parallelism`.
pub fn default_children_max() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    8 + 2 * cpus
}

/// Delivered back to the pool's `report` channel by the task driving each
/// worker, standing in for the real subprocess's unicast/datagram pair.
#[derive(Debug, Clone)]
pub enum WorkerReport {
    /// The worker finished its assigned event and is ready for another.
    Completed { worker: WorkerId },
    /// The worker's process exited (cleanly or not).
    Exited { worker: WorkerId },
}

/// Spawns and signals worker subprocesses.
///
/// The channel handed back by `spawn` is a unicast transport:
/// the pool sends at most one event to it at a time and waits for a
/// [`WorkerReport::Completed`] on `report` before sending the next.
#[async_trait]
pub trait WorkerSpawner: Clone + Send + Sync + 'static {
    async fn spawn(
        &self,
        event: &Event,
        properties: &PropertiesSet,
        report: mpsc::UnboundedSender<WorkerReport>,
    ) -> Result<(WorkerId, mpsc::UnboundedSender<Event>), BrokerError>;

    /// Send a termination signal to a worker.
    fn kill(&self, worker: WorkerId) -> Result<(), BrokerError>;
}

struct WorkerRecord {
    state: WorkerState,
    event_seqnum: Option<u64>,
    channel: mpsc::UnboundedSender<Event>,
    start_time: Option<std::time::Instant>,
    warned: bool,
}

/// Pool of worker subprocesses, bounded by `children_max`.
pub struct WorkerPool<S: WorkerSpawner, C: Clock> {
    spawner: S,
    clock: C,
    children_max: usize,
    workers: HashMap<WorkerId, WorkerRecord>,
    report_tx: mpsc::UnboundedSender<WorkerReport>,
    report_rx: mpsc::UnboundedReceiver<WorkerReport>,
}

impl<S: WorkerSpawner, C: Clock> WorkerPool<S, C> {
    pub fn new(spawner: S, clock: C, children_max: usize) -> Self {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        Self {
            spawner,
            clock,
            children_max,
            workers: HashMap::new(),
            report_tx,
            report_rx,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn children_max(&self) -> usize {
        self.children_max
    }

    pub fn worker_state(&self, id: WorkerId) -> Option<WorkerState> {
        self.workers.get(&id).map(|w| w.state)
    }

    /// `SET_MAX_CHILDREN`: pre-existing workers are not culled.
    pub fn set_children_max(&mut self, n: usize) {
        self.children_max = n;
    }

    /// Wait for the next worker-results readiness.
    pub async fn next_report(&mut self) -> Option<WorkerReport> {
        self.report_rx.recv().await
    }

    /// Reuse an idle worker if one exists, else spawn a new one if under
    /// cap, else leave the event queued.
    pub async fn dispatch(&mut self, event: &Event, properties: &PropertiesSet) -> Option<WorkerId> {
        if let Some(id) = self.find_idle() {
            if self.send_to(id, event).is_ok() {
                self.attach(id, event);
                return Some(id);
            }
            tracing::warn!(worker = %id, "unicast send failed, treating worker as broken");
            self.kill_worker(id);
        }

        if self.workers.len() >= self.children_max {
            return None;
        }

        match self
            .spawner
            .spawn(event, properties, self.report_tx.clone())
            .await
        {
            Ok((id, channel)) => {
                self.workers.insert(
                    id,
                    WorkerRecord {
                        state: WorkerState::Running,
                        event_seqnum: Some(event.seqnum),
                        channel,
                        start_time: Some(self.clock.now()),
                        warned: false,
                    },
                );
                Some(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to spawn worker");
                None
            }
        }
    }

    fn find_idle(&self) -> Option<WorkerId> {
        self.workers
            .iter()
            .find(|(_, w)| w.state == WorkerState::Idle)
            .map(|(id, _)| *id)
    }

    fn send_to(&self, id: WorkerId, event: &Event) -> Result<(), BrokerError> {
        let worker = self
            .workers
            .get(&id)
            .ok_or(BrokerError::UnknownWorker(id))?;
        worker
            .channel
            .send(event.clone())
            .map_err(|_| BrokerError::ChannelClosed(id))
    }

    fn attach(&mut self, id: WorkerId, event: &Event) {
        if let Some(worker) = self.workers.get_mut(&id) {
            worker.state = WorkerState::Running;
            worker.event_seqnum = Some(event.seqnum);
            worker.start_time = Some(self.clock.now());
            worker.warned = false;
        }
    }

    /// Locate by id; no-op (with a warning) if unknown or already idle.
    /// Returns the freed event's seqnum.
    pub fn on_completion(&mut self, id: WorkerId) -> Option<u64> {
        let Some(worker) = self.workers.get_mut(&id) else {
            tracing::warn!(worker = %id, "completion for unknown worker, dropped");
            return None;
        };
        if worker.state != WorkerState::Running {
            tracing::warn!(worker = %id, state = ?worker.state, "duplicate completion, dropped");
            return None;
        }
        worker.state = WorkerState::Idle;
        worker.start_time = None;
        worker.warned = false;
        worker.event_seqnum.take()
    }

    /// Removes the worker; returns the seqnum of the event it was
    /// holding, if any, so the caller can re-forward it unprocessed and
    /// delete its persistence record.
    pub fn on_child_exit(&mut self, id: WorkerId) -> Option<u64> {
        self.workers.remove(&id).and_then(|w| w.event_seqnum)
    }

    /// Terminate every non-`Killed` worker.
    pub fn kill_all(&mut self) {
        let ids: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|(_, w)| w.state != WorkerState::Killed)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.kill_worker(id);
        }
    }

    /// Bound process count when the queue is empty.
    pub fn kill_idle(&mut self) {
        let ids: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|(_, w)| w.state == WorkerState::Idle)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.kill_worker(id);
        }
    }

    /// Warn once past `warn`, kill past `fatal`.
    pub fn timeout_sweep(&mut self, warn: Duration, fatal: Duration) {
        let now = self.clock.now();
        let mut to_kill = Vec::new();
        for (id, worker) in self.workers.iter_mut() {
            if worker.state != WorkerState::Running {
                continue;
            }
            let Some(start) = worker.start_time else {
                continue;
            };
            let elapsed = now.saturating_duration_since(start);
            if elapsed > fatal {
                to_kill.push(*id);
            } else if elapsed > warn && !worker.warned {
                tracing::warn!(worker = %id, elapsed_s = elapsed.as_secs(), "event taking long");
                worker.warned = true;
            }
        }
        for id in to_kill {
            tracing::error!(worker = %id, "event timed out, killing worker");
            self.kill_worker(id);
        }
    }

    fn kill_worker(&mut self, id: WorkerId) {
        if let Err(e) = self.spawner.kill(id) {
            tracing::warn!(worker = %id, error = %e, "failed to signal worker");
        }
        if let Some(worker) = self.workers.get_mut(&id) {
            worker.state = WorkerState::Killed;
        }
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
