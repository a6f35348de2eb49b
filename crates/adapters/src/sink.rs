// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch of processed devices to subscribers via netlink multicast.

use async_trait::async_trait;
use thiserror::Error;
use udevbroker_core::Event;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// Publishes a fully rule-processed device to subscribers.
///
/// Called by the worker after rule execution completes, and by the
/// daemon when re-forwarding an unprocessed event after a worker crash
/// or reload kill.
#[async_trait]
pub trait ProcessedEventSink: Clone + Send + Sync + 'static {
    async fn publish(&self, event: &Event) -> Result<(), SinkError>;
}

/// Production sink: re-broadcasts over the kernel uevent netlink multicast
/// group so `libudev`-style subscribers see the same wire shape a kernel
/// uevent would have had.
#[derive(Clone)]
pub struct NetlinkEventSink {
    socket: std::sync::Arc<tokio::sync::Mutex<netlink_sys::TokioSocket>>,
}

impl NetlinkEventSink {
    pub fn bind() -> Result<Self, SinkError> {
        const NETLINK_KOBJECT_UEVENT: i32 = 15;
        // Multicast group 2 is the "udev" (post-rule) group, as distinct
        // from group 1 (raw kernel events) that the device source reads.
        const UDEV_MULTICAST_GROUP: u32 = 2;
        let mut socket = netlink_sys::Socket::new(NETLINK_KOBJECT_UEVENT)
            .map_err(|e| SinkError::PublishFailed(e.to_string()))?;
        socket
            .bind(&netlink_sys::SocketAddr::new(0, UDEV_MULTICAST_GROUP))
            .map_err(|e| SinkError::PublishFailed(e.to_string()))?;
        let socket = socket
            .into_tokio()
            .map_err(|e| SinkError::PublishFailed(e.to_string()))?;
        Ok(Self {
            socket: std::sync::Arc::new(tokio::sync::Mutex::new(socket)),
        })
    }

    fn encode(event: &Event) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("{}@{}\0", event.action, event.devpath).as_bytes());
        let mut field = |k: &str, v: &str| {
            buf.extend_from_slice(k.as_bytes());
            buf.push(b'=');
            buf.extend_from_slice(v.as_bytes());
            buf.push(0);
        };
        field("ACTION", &event.action.to_string());
        field("DEVPATH", &event.devpath);
        field("SUBSYSTEM", &event.subsystem);
        field("SEQNUM", &event.seqnum.to_string());
        if !event.devnum.is_none() {
            field("MAJOR", &event.devnum.major.to_string());
            field("MINOR", &event.devnum.minor.to_string());
        }
        if event.ifindex != 0 {
            field("IFINDEX", &event.ifindex.to_string());
        }
        buf
    }
}

#[async_trait]
impl ProcessedEventSink for NetlinkEventSink {
    async fn publish(&self, event: &Event) -> Result<(), SinkError> {
        let payload = Self::encode(event);
        let socket = self.socket.lock().await;
        socket
            .send(&payload, 0)
            .await
            .map_err(|e| SinkError::PublishFailed(e.to_string()))?;
        Ok(())
    }
}

/// Recorded publish call, for test assertions.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub struct SinkCall {
    pub seqnum: u64,
    pub devpath: String,
}

/// Test double recording every publish.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeEventSink {
    calls: std::sync::Arc<parking_lot::Mutex<Vec<SinkCall>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ProcessedEventSink for FakeEventSink {
    async fn publish(&self, event: &Event) -> Result<(), SinkError> {
        self.calls.lock().push(SinkCall {
            seqnum: event.seqnum,
            devpath: event.devpath.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
