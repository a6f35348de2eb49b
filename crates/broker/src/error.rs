// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the event broker.

use udevbroker_core::WorkerId;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("worker spawn failed: {0}")]
    Spawn(String),
    #[error("worker {0} is not known to the pool")]
    UnknownWorker(WorkerId),
    #[error("send to worker {0} failed: channel closed")]
    ChannelClosed(WorkerId),
}
