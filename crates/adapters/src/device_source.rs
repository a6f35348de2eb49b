// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kernel uevent source: receives device notifications over a
//! `NETLINK_KOBJECT_UEVENT` socket and parses them into [`RawUevent`].

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use udevbroker_core::{DevNum, Event, EventAction};

/// 128 MiB receive buffer for the kernel uevent socket.
pub const RECV_BUFFER_BYTES: usize = 128 * 1024 * 1024;

/// Netlink multicast group carrying kernel (not userspace udev) uevents.
pub const KERNEL_UEVENT_GROUP: u32 = 1;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("socket error: {0}")]
    Socket(String),
    #[error("malformed uevent: {0}")]
    Malformed(String),
}

/// A parsed but not-yet-validated kernel uevent.
///
/// Carries the same fields as `Event` minus the queue-only bookkeeping
/// (`state`, `delaying_seqnum`, `worker`, `start_time`, `warned`), since a
/// raw uevent is not yet a queued event until `EventQueue::insert` builds
/// one from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUevent {
    pub seqnum: u64,
    pub devpath: String,
    pub devpath_old: Option<String>,
    pub devnum: DevNum,
    pub is_block: bool,
    pub ifindex: u32,
    pub subsystem: String,
    pub action: EventAction,
    pub devtype: String,
    pub sysname: String,
}

impl RawUevent {
    /// Build the queued [`Event`] this uevent describes.
    pub fn into_event(self) -> Event {
        let mut event = Event::new(self.seqnum, self.devpath, self.subsystem, self.action)
            .with_devnum(self.devnum, self.is_block)
            .with_ifindex(self.ifindex);
        event.devtype = self.devtype;
        event.sysname = self.sysname;
        if let Some(old) = self.devpath_old {
            event = event.with_devpath_old(old);
        }
        event
    }

    /// Parse the `KEY=value\0KEY=value\0...` payload the kernel sends.
    ///
    /// The leading `libudev` header line (`"change@/devices/..."`) is
    /// skipped; only the `KEY=value` lines are read. Missing `SEQNUM`,
    /// `DEVPATH`, `ACTION`, or `SUBSYSTEM` is a malformed message.
    pub fn parse(payload: &[u8]) -> Result<Self, SourceError> {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for line in payload.split(|&b| b == 0) {
            if line.is_empty() {
                continue;
            }
            let Ok(line) = std::str::from_utf8(line) else {
                continue;
            };
            // Skip the synthetic header line, e.g. "change@/devices/...".
            if !line.contains('=') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                fields.insert(key, value);
            }
        }

        let seqnum = fields
            .get("SEQNUM")
            .ok_or_else(|| SourceError::Malformed("missing SEQNUM".into()))?
            .parse::<u64>()
            .map_err(|e| SourceError::Malformed(format!("bad SEQNUM: {e}")))?;
        let devpath = fields
            .get("DEVPATH")
            .ok_or_else(|| SourceError::Malformed("missing DEVPATH".into()))?
            .to_string();
        let subsystem = fields
            .get("SUBSYSTEM")
            .ok_or_else(|| SourceError::Malformed("missing SUBSYSTEM".into()))?
            .to_string();
        let action = EventAction::parse(
            fields
                .get("ACTION")
                .ok_or_else(|| SourceError::Malformed("missing ACTION".into()))?,
        );

        let is_block = subsystem == "block";
        let devnum = match (fields.get("MAJOR"), fields.get("MINOR")) {
            (Some(maj), Some(min)) => DevNum::new(
                maj.parse().unwrap_or(0),
                min.parse().unwrap_or(0),
            ),
            _ => DevNum::NONE,
        };
        let ifindex = fields
            .get("IFINDEX")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let devpath_old = fields.get("DEVPATH_OLD").map(|s| s.to_string());
        let devtype = fields.get("DEVTYPE").map(|s| s.to_string()).unwrap_or_default();
        let sysname = devpath
            .rsplit('/')
            .next()
            .map(|s| s.to_string())
            .unwrap_or_default();

        Ok(Self {
            seqnum,
            devpath,
            devpath_old,
            devnum,
            is_block,
            ifindex,
            subsystem,
            action,
            devtype,
            sysname,
        })
    }
}

/// Source of kernel device-change notifications.
///
/// A trait so the reactor's uevent branch can be driven by a real
/// `NETLINK_KOBJECT_UEVENT` socket in production and by an in-memory queue
/// in tests.
#[async_trait]
pub trait DeviceEventSource: Send + Sync + 'static {
    async fn recv(&mut self) -> Result<RawUevent, SourceError>;
}

/// Production uevent source backed by a raw `AF_NETLINK` socket.
///
/// Wraps `netlink-sys`'s thin libc socket wrapper in kobject-uevent mode,
/// joined to the kernel multicast group, with `SO_RCVBUF` set to
/// [`RECV_BUFFER_BYTES`] to tolerate uevent storms without drops.
pub struct NetlinkUeventSource {
    socket: netlink_sys::TokioSocket,
}

impl NetlinkUeventSource {
    /// Bind a netlink socket in `NETLINK_KOBJECT_UEVENT` mode, joined to the
    /// kernel uevent multicast group.
    pub fn bind() -> Result<Self, SourceError> {
        const NETLINK_KOBJECT_UEVENT: isize = 15;
        let mut socket = netlink_sys::Socket::new(NETLINK_KOBJECT_UEVENT as isize as i32)
            .map_err(|e| SourceError::Socket(e.to_string()))?;
        socket
            .bind(&netlink_sys::SocketAddr::new(0, KERNEL_UEVENT_GROUP))
            .map_err(|e| SourceError::Socket(e.to_string()))?;
        socket
            .set_rx_buf_sz(RECV_BUFFER_BYTES)
            .map_err(|e| SourceError::Socket(e.to_string()))?;
        let socket = socket
            .into_tokio()
            .map_err(|e| SourceError::Socket(e.to_string()))?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl DeviceEventSource for NetlinkUeventSource {
    async fn recv(&mut self) -> Result<RawUevent, SourceError> {
        let mut buf = vec![0u8; 64 * 1024];
        let (n, _addr) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| SourceError::Socket(e.to_string()))?;
        RawUevent::parse(&buf[..n])
    }
}

/// Test double: replays a fixed, in-memory queue of uevents.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeEventSource {
    pending: std::collections::VecDeque<RawUevent>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeEventSource {
    pub fn new(events: impl IntoIterator<Item = RawUevent>) -> Self {
        Self {
            pending: events.into_iter().collect(),
        }
    }

    pub fn push(&mut self, event: RawUevent) {
        self.pending.push_back(event);
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl DeviceEventSource for FakeEventSource {
    async fn recv(&mut self) -> Result<RawUevent, SourceError> {
        match self.pending.pop_front() {
            Some(event) => Ok(event),
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
#[path = "device_source_tests.rs"]
mod tests;
