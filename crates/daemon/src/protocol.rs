// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire framing for the admin control socket.
//!
//! Wire format: 4-byte big-endian length prefix + JSON payload, matching
//! the framing `udevadm control` uses against the real daemon. The
//! vocabulary itself ([`udevbroker_broker::ControlCommand`]) lives in the
//! broker crate, since both the daemon's listener task and `Broker::apply_control`
//! need it; this module only owns the bytes-on-the-wire concern and the
//! small acknowledgement the daemon sends back.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use udevbroker_broker::ControlCommand;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("timeout")]
    Timeout,
}

/// Generous upper bound on a single control message (a `SET_ENV` assignment
/// is the largest payload this protocol ever carries).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Default round-trip timeout for a control request.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// What the daemon sends back after applying a [`ControlCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlResponse {
    Ok,
    /// `PING` has no reply payload upstream beyond liveness of the socket
    /// itself; this daemon answers explicitly so a client can distinguish
    /// "daemon took my command" from "connect failed" without relying on
    /// EOF timing.
    Pong,
    Error { message: String },
}

pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(json)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub async fn read_message<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn write_message<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_command<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<ControlCommand, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_response<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &ControlResponse,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Client-side counterpart to [`read_command`]/[`write_response`]: send one
/// command and wait for the daemon's reply (`udevbrokerctl`'s only use of
/// this wire format).
pub async fn write_command<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    command: &ControlCommand,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let data = encode(command)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

pub async fn read_response<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<ControlResponse, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn command_round_trips_through_the_wire_framing() {
        let cmd = ControlCommand::SetEnv {
            assignment: "FOO=bar".to_string(),
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &encode(&cmd).unwrap()).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = read_command(&mut cursor, DEFAULT_TIMEOUT).await.unwrap();
        assert_eq!(decoded, cmd);
    }

    #[tokio::test]
    async fn oversized_message_is_rejected_before_allocating() {
        let huge = vec![0u8; MAX_MESSAGE_SIZE + 1];
        let err = write_message(&mut Vec::new(), &huge).await.unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[tokio::test]
    async fn closed_connection_is_reported_distinctly() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }
}
