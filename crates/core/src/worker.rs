// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity and lifecycle state.
//!
//! The [`Worker`] record itself (channel, attached event) lives in
//! `udevbroker-broker::worker_pool`, which owns process handles this crate
//! has no business depending on. This module only carries the id and the
//! state enum both the broker and the daemon's control/status surfaces
//! need to name.

crate::define_numeric_id! {
    /// Identifies a worker subprocess by its OS pid.
    pub struct WorkerId(u32);
}

/// Lifecycle state of a worker subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Has an event assigned and is executing rules for it.
    Running,
    /// No event assigned; eligible for immediate dispatch.
    Idle,
    /// Terminated by the broker (timeout or reload); never reassigned.
    Killed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_from_pid() {
        let id = WorkerId::new(1234);
        assert_eq!(id.get(), 1234);
        assert_eq!(id.to_string(), "1234");
    }

    #[test]
    fn worker_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&WorkerState::Idle).unwrap(), "\"idle\"");
        assert_eq!(
            serde_json::to_string(&WorkerState::Killed).unwrap(),
            "\"killed\""
        );
    }
}
