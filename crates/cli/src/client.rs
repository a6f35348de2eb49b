// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin client for the admin control socket: connect, send one
//! [`ControlCommand`], read back one [`ControlResponse`], done. Unlike the
//! teacher's `DaemonClient`, there is no auto-start or version-check
//! dance here — `udevadm control` has never started the daemon on the
//! caller's behalf, it just errors if nothing is listening.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixStream;
use udevbroker_broker::ControlCommand;
use udevbroker_daemon::protocol::{self, ControlResponse, ProtocolError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Default control socket path, matching `Config::default().control_socket`
/// (kept independent rather than importing `lifecycle::Config`, since the
/// client has no business depending on the rest of the daemon's state).
pub fn default_socket_path() -> PathBuf {
    std::env::var("UDEV_CONTROL_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/udev/control"))
}

/// Connect once, send `command`, and return the daemon's response.
pub async fn send(
    socket_path: &Path,
    command: &ControlCommand,
    timeout: Duration,
) -> Result<ControlResponse, ClientError> {
    let mut stream =
        UnixStream::connect(socket_path)
            .await
            .map_err(|source| ClientError::Connect {
                path: socket_path.to_path_buf(),
                source,
            })?;

    protocol::write_command(&mut stream, command, timeout).await?;
    let response = protocol::read_response(&mut stream, timeout).await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // Both tests below mutate process-wide environment state, so they
    // must not interleave with each other (or with anything else that
    // reads UDEV_CONTROL_SOCKET) across threads.

    #[test]
    #[serial]
    fn default_socket_path_respects_env_override() {
        std::env::set_var("UDEV_CONTROL_SOCKET", "/tmp/custom.sock");
        assert_eq!(default_socket_path(), PathBuf::from("/tmp/custom.sock"));
        std::env::remove_var("UDEV_CONTROL_SOCKET");
    }

    #[test]
    #[serial]
    fn default_socket_path_falls_back_when_unset() {
        std::env::remove_var("UDEV_CONTROL_SOCKET");
        assert_eq!(default_socket_path(), PathBuf::from("/run/udev/control"));
    }

    #[tokio::test]
    async fn connect_failure_is_reported_distinctly() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such.sock");
        let err = send(&missing, &ControlCommand::Ping, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }));
    }
}
