// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Administrative control-plane commands.
//!
//! The wire framing (length-prefixed JSON over the admin `UnixListener`)
//! lives in `udevbroker-daemon::protocol`; this module only names the
//! commands themselves, since both the daemon's listener task and the
//! broker's `apply_control` need the same vocabulary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    SetLogLevel { level: u8 },
    StopExecQueue,
    StartExecQueue,
    Reload,
    SetEnv { assignment: String },
    SetMaxChildren { max: usize },
    Ping,
    Exit,
}
