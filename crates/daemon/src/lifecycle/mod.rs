// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, the supervisor state machine, and the
//! `/run/udev/queue` busy marker.

use crate::env::{CliArgs, KernelArgs, ResolveNames};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Resolved daemon configuration, layered CLI flag > kernel cmdline >
/// built-in default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Admin control socket (`udevadm control`).
    pub control_socket: PathBuf,
    /// Busy marker file; present while the queue is non-idle.
    pub queue_marker: PathBuf,
    /// Per-device record directory.
    pub data_dir: PathBuf,
    /// External rule-engine binary.
    pub rule_engine_path: PathBuf,
    /// Daemon's own log file, rotated externally (e.g. logrotate).
    pub log_path: PathBuf,
    pub children_max: usize,
    /// Past this elapsed time a running event is warned about.
    pub warn_timeout: Duration,
    /// Past this elapsed time a running event's worker is killed.
    pub event_timeout: Duration,
    /// Delay before dispatching any event, for batching bursts.
    pub exec_delay: Duration,
    pub resolve_names: ResolveNames,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_socket: PathBuf::from("/run/udev/control"),
            queue_marker: PathBuf::from("/run/udev/queue"),
            data_dir: PathBuf::from("/run/udev/data"),
            rule_engine_path: PathBuf::from("/lib/udev/rule-engine"),
            log_path: PathBuf::from("/var/log/udevbrokerd.log"),
            children_max: udevbroker_broker::default_children_max(),
            warn_timeout: Duration::from_secs(60),
            event_timeout: Duration::from_secs(180),
            exec_delay: Duration::ZERO,
            resolve_names: ResolveNames::default(),
            debug: false,
        }
    }
}

impl Config {
    /// Merge CLI overrides (highest precedence) and kernel-cmdline
    /// overrides (lower precedence) onto the built-in default.
    pub fn resolve(cli: &CliArgs, kernel: &KernelArgs) -> Self {
        let mut config = Self::default();

        if let Some(max) = kernel.children_max {
            config.children_max = max;
        }
        if let Some(delay) = kernel.exec_delay {
            config.exec_delay = delay;
        }
        if let Some(timeout) = kernel.event_timeout {
            config.event_timeout = timeout;
        }

        if let Some(max) = cli.children_max {
            config.children_max = max;
        }
        if let Some(delay) = cli.exec_delay {
            config.exec_delay = delay;
        }
        if let Some(timeout) = cli.event_timeout {
            config.event_timeout = timeout;
        }
        if let Some(mode) = cli.resolve_names {
            config.resolve_names = mode;
        }
        config.debug = cli.debug;

        config
    }
}

/// The daemon's top-level lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl SupervisorState {
    /// `Starting -> Running`, once the control socket and netlink source are
    /// both bound.
    pub fn start_complete(self) -> Self {
        match self {
            SupervisorState::Starting => SupervisorState::Running,
            other => other,
        }
    }

    /// `Running -> Draining`, on `EXIT` or `SIGTERM`.
    pub fn begin_drain(self) -> Self {
        match self {
            SupervisorState::Running => SupervisorState::Draining,
            other => other,
        }
    }

    /// `Draining -> Stopped`, once the queue and pool are both empty or the
    /// drain timeout elapses.
    pub fn drain_complete(self) -> Self {
        match self {
            SupervisorState::Draining => SupervisorState::Stopped,
            other => other,
        }
    }

    pub fn is_accepting_events(self) -> bool {
        matches!(self, SupervisorState::Running)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind control socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),
    #[error("io error managing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Single writer for `/run/udev/queue`: created when the broker goes
/// busy, removed when it goes idle. Called from one place in the reactor
/// loop so there is never a race between two writers disagreeing about
/// whether the marker should exist.
pub fn update_marker(path: &std::path::Path, is_idle: bool) -> Result<(), LifecycleError> {
    if is_idle {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LifecycleError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    } else {
        match std::fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(source) => Err(LifecycleError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
