// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment, argv, and kernel-cmdline parsing for the daemon
//! binary. No `clap`: the flag surface is small enough to hand-parse
//! directly.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("unrecognized argument '{0}'")]
    UnknownArg(String),
    #[error("invalid value for --{flag}: '{value}'")]
    BadValue { flag: &'static str, value: String },
}

/// `--resolve-names=early|late|never`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveNames {
    Early,
    #[default]
    Late,
    Never,
}

impl ResolveNames {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "early" => Some(Self::Early),
            "late" => Some(Self::Late),
            "never" => Some(Self::Never),
            _ => None,
        }
    }
}

/// Either print-and-exit info (`--help`/`--version`) or a set of overrides
/// to layer onto [`crate::lifecycle::Config`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub daemon: bool,
    pub debug: bool,
    pub children_max: Option<usize>,
    pub exec_delay: Option<Duration>,
    pub event_timeout: Option<Duration>,
    pub resolve_names: Option<ResolveNames>,
    pub help: bool,
    pub version: bool,
}

/// Parse the daemon binary's own flags (argv, excluding argv[0]).
pub fn parse_cli<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs, EnvError> {
    let mut parsed = CliArgs::default();
    for arg in args {
        match arg.as_str() {
            "--daemon" => parsed.daemon = true,
            "--debug" => parsed.debug = true,
            "--help" | "-h" => parsed.help = true,
            "--version" | "-v" | "-V" => parsed.version = true,
            _ if arg.starts_with("--children-max=") => {
                let value = &arg["--children-max=".len()..];
                parsed.children_max = Some(value.parse().map_err(|_| EnvError::BadValue {
                    flag: "children-max",
                    value: value.to_string(),
                })?);
            }
            _ if arg.starts_with("--exec-delay=") => {
                let value = &arg["--exec-delay=".len()..];
                let secs: u64 = value.parse().map_err(|_| EnvError::BadValue {
                    flag: "exec-delay",
                    value: value.to_string(),
                })?;
                parsed.exec_delay = Some(Duration::from_secs(secs));
            }
            _ if arg.starts_with("--event-timeout=") => {
                let value = &arg["--event-timeout=".len()..];
                let secs: u64 = value.parse().map_err(|_| EnvError::BadValue {
                    flag: "event-timeout",
                    value: value.to_string(),
                })?;
                parsed.event_timeout = Some(Duration::from_secs(secs));
            }
            _ if arg.starts_with("--resolve-names=") => {
                let value = &arg["--resolve-names=".len()..];
                parsed.resolve_names =
                    Some(ResolveNames::parse(value).ok_or_else(|| EnvError::BadValue {
                        flag: "resolve-names",
                        value: value.to_string(),
                    })?);
            }
            other => return Err(EnvError::UnknownArg(other.to_string())),
        }
    }
    Ok(parsed)
}

/// Overrides parsed from `/proc/cmdline`-style kernel knobs, with an
/// optional `rd.` prefix stripped before matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelArgs {
    pub log_priority: Option<u8>,
    pub children_max: Option<usize>,
    pub exec_delay: Option<Duration>,
    pub event_timeout: Option<Duration>,
}

/// Parse a raw kernel command line (whitespace-separated `key=value` tokens).
pub fn parse_kernel_cmdline(cmdline: &str) -> KernelArgs {
    let mut parsed = KernelArgs::default();
    for token in cmdline.split_whitespace() {
        let token = token.strip_prefix("rd.").unwrap_or(token);
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key {
            "udev.log-priority" => parsed.log_priority = value.parse().ok(),
            "udev.children-max" => parsed.children_max = value.parse().ok(),
            "udev.exec-delay" => parsed.exec_delay = value.parse().ok().map(Duration::from_secs),
            "udev.event-timeout" => {
                parsed.event_timeout = value.parse().ok().map(Duration::from_secs)
            }
            _ => {}
        }
    }
    parsed
}

/// Read `/proc/cmdline`; empty string (no overrides) if unreadable — a
/// missing `/proc` is not fatal, since kernel-cmdline knobs are optional.
pub fn read_kernel_cmdline() -> String {
    std::fs::read_to_string("/proc/cmdline").unwrap_or_default()
}

/// Pre-opened file descriptors adopted via systemd socket activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InheritedFds {
    /// First inherited fd (by convention, the admin control socket).
    pub control: Option<std::os::fd::RawFd>,
    /// Second inherited fd (by convention, the netlink uevent socket).
    pub netlink: Option<std::os::fd::RawFd>,
}

/// Standard systemd fd range, matching `SD_LISTEN_FDS_START`.
const SD_LISTEN_FDS_START: std::os::fd::RawFd = 3;

/// Adopt pre-opened sockets via `LISTEN_FDS`/`LISTEN_PID`, falling back
/// to `InheritedFds::default()` (both `None`) when not socket-activated.
pub fn inherited_fds() -> InheritedFds {
    let Ok(pid) = std::env::var("LISTEN_PID") else {
        return InheritedFds::default();
    };
    if pid.parse::<u32>().ok() != Some(std::process::id()) {
        return InheritedFds::default();
    }
    let count: i32 = std::env::var("LISTEN_FDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    InheritedFds {
        control: (count >= 1).then_some(SD_LISTEN_FDS_START),
        netlink: (count >= 2).then_some(SD_LISTEN_FDS_START + 1),
    }
}
