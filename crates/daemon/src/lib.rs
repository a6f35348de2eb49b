// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The device-event broker daemon: reactor loop, lifecycle/supervisor
//! state machine, and the admin control-socket protocol. The binary
//! entry point lives in `main.rs`; this library exposes the pieces a
//! client crate (`udevbrokerctl`) or an integration test needs.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod protocol;
pub mod spawner;
pub mod worker_main;

pub use lifecycle::{Config, LifecycleError, SupervisorState};
pub use protocol::{ControlResponse, ProtocolError, DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE};
pub use spawner::SubprocessWorkerSpawner;
pub use udevbroker_broker::ControlCommand;
