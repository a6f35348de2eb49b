// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker subprocess entry point.
//!
//! This module links only `udevbroker-core` and `udevbroker-adapters` —
//! never `udevbroker-broker` — so the type system itself enforces
//! isolation: a worker process has no way to reach the queue or the
//! pool, only the one event handed to it over its stdin pipe.
//!
//! Wire shape on the worker's stdin/stdout: the same 4-byte length prefix
//! + JSON framing as the admin control socket (`crate::protocol`), carrying
//! one [`Event`] per incoming frame and one [`WorkerAck`] per outgoing
//! frame, so a worker always announces completion before its parent
//! considers it idle again.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use udevbroker_adapters::{
    key_for_event, try_lock_devnode, DevicePersistence, LockError, ProcessedEventSink,
    RuleExecutor, RuleOutcome,
};
use udevbroker_core::{Event, PropertiesSet};

#[derive(Debug, Error)]
pub enum WorkerLoopError {
    #[error("stdin/stdout io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed event frame: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Acknowledgement a worker writes to stdout after finishing one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerAck {
    pub seqnum: u64,
    /// `false` when the devnode lock could not be acquired: rule
    /// processing is skipped, not retried, and the worker still acks so
    /// it becomes available for the next event.
    pub processed: bool,
}

/// The collaborators a worker needs, bundled so `run` only takes one
/// generic parameter list instead of three.
pub struct WorkerDeps<R, P, K> {
    pub rules: R,
    pub persistence: P,
    pub sink: K,
    pub properties: PropertiesSet,
}

/// Drive the worker's event loop to completion (stdin EOF, i.e. the parent
/// closed the unicast channel because it's killing this worker).
pub async fn run<R, P, K>(deps: WorkerDeps<R, P, K>) -> Result<(), WorkerLoopError>
where
    R: RuleExecutor,
    P: DevicePersistence,
    K: ProcessedEventSink,
{
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    loop {
        let event = match read_event(&mut stdin).await? {
            Some(event) => event,
            None => return Ok(()),
        };
        let ack = process_one(&deps, &event).await;
        write_ack(&mut stdout, &ack).await?;
    }
}

/// Lock the devnode, apply rules, run any `RUN+=` programs, persist the
/// record, and publish the processed event.
async fn process_one<R, P, K>(deps: &WorkerDeps<R, P, K>, event: &Event) -> WorkerAck
where
    R: RuleExecutor,
    P: DevicePersistence,
    K: ProcessedEventSink,
{
    let lock = match try_lock_devnode(&event.devpath) {
        Ok(lock) => Some(lock),
        Err(LockError::WouldBlock { path }) => {
            tracing::warn!(devnode = %path.display(), seqnum = event.seqnum, "devnode locked by another worker, skipping rule processing");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, seqnum = event.seqnum, "devnode not lockable, skipping rule processing");
            None
        }
    };

    let Some(lock) = lock else {
        return WorkerAck {
            seqnum: event.seqnum,
            processed: false,
        };
    };
    let _lock = lock;

    let outcome = match deps.rules.apply(event, &deps.properties).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, seqnum = event.seqnum, "rule application failed");
            RuleOutcome::default()
        }
    };

    if let Err(e) = deps.rules.run_programs(event, &outcome).await {
        tracing::warn!(error = %e, seqnum = event.seqnum, "RUN+= program failed");
    }

    let key = key_for_event(event);
    if let Err(e) = deps.persistence.record(&key, &outcome.properties).await {
        tracing::warn!(error = %e, seqnum = event.seqnum, "failed to persist device record");
    }

    if let Err(e) = deps.sink.publish(event).await {
        tracing::warn!(error = %e, seqnum = event.seqnum, "failed to publish processed event");
    }

    WorkerAck {
        seqnum: event.seqnum,
        processed: true,
    }
}

async fn read_event<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Option<Event>, WorkerLoopError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(serde_json::from_slice(&buf)?))
}

async fn write_ack<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    ack: &WorkerAck,
) -> Result<(), WorkerLoopError> {
    let payload = serde_json::to_vec(ack)?;
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use udevbroker_adapters::{FakeDevicePersistence, FakeEventSink, FakeRuleExecutor};
    use udevbroker_core::EventAction;

    fn deps() -> WorkerDeps<FakeRuleExecutor, FakeDevicePersistence, FakeEventSink> {
        WorkerDeps {
            rules: FakeRuleExecutor::new(),
            persistence: FakeDevicePersistence::new(),
            sink: FakeEventSink::new(),
            properties: PropertiesSet::new(),
        }
    }

    #[tokio::test]
    async fn processes_and_publishes_when_lock_is_free() {
        let d = deps();
        let sink = d.sink.clone();
        let devnode = tempfile::NamedTempFile::new().unwrap();
        let event = Event::new(1, devnode.path().to_str().unwrap(), "misc", EventAction::Add);

        let ack = process_one(&d, &event).await;

        assert!(ack.processed);
        assert_eq!(ack.seqnum, 1);
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test]
    async fn skips_processing_and_still_acks_when_lock_is_held() {
        let d = deps();
        let sink = d.sink.clone();
        let devnode = tempfile::NamedTempFile::new().unwrap();
        let held = std::fs::File::open(devnode.path()).unwrap();
        fs2::FileExt::lock_exclusive(&held).unwrap();
        let event = Event::new(1, devnode.path().to_str().unwrap(), "misc", EventAction::Add);

        let ack = process_one(&d, &event).await;

        assert!(!ack.processed);
        assert_eq!(ack.seqnum, 1);
        assert_eq!(sink.calls().len(), 0, "rule processing and publishing are skipped when the devnode is already locked");
    }

    #[tokio::test]
    async fn ack_round_trips_through_the_wire_framing() {
        let ack = WorkerAck {
            seqnum: 42,
            processed: true,
        };
        let mut buf = Vec::new();
        write_ack(&mut buf, &ack).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let mut len_buf = [0u8; 4];
        cursor.read_exact(&mut len_buf).await.unwrap();
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        cursor.read_exact(&mut payload).await.unwrap();
        let decoded: WorkerAck = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded.seqnum, 42);
        assert!(decoded.processed);
    }

    #[tokio::test]
    async fn read_event_returns_none_on_clean_eof() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(read_event(&mut cursor).await.unwrap().is_none());
    }
}
