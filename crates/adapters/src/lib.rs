// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the broker's external collaborators: the kernel uevent
//! source, the processed-event sink, the rule executor, the device
//! persistence store, and the inotify bridge.
//!
//! Every capability here is a trait with a production implementation and a
//! `Fake*` test double recording calls.

pub mod device_source;
pub mod inotify_bridge;
pub mod lock;
pub mod persistence;
pub mod rule_executor;
pub mod sink;
pub mod subprocess;
pub mod traced;

pub use device_source::{DeviceEventSource, NetlinkUeventSource, RawUevent, SourceError};
pub use inotify_bridge::{InotifyError, InotifyEvent, InotifyWatcher, LinuxInotifyWatcher};
pub use lock::{try_lock_devnode, DevnodeLock, LockError};
pub use persistence::{DevicePersistence, DevicePersistenceError, FsDevicePersistence};
pub use rule_executor::{ProcessRuleExecutor, RuleError, RuleExecutor, RuleOutcome};
pub use sink::{NetlinkEventSink, ProcessedEventSink, SinkError};
pub use traced::TracedSink;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use device_source::FakeEventSource;
#[cfg(any(test, feature = "test-support"))]
pub use inotify_bridge::FakeInotifyWatcher;
#[cfg(any(test, feature = "test-support"))]
pub use persistence::FakeDevicePersistence;
#[cfg(any(test, feature = "test-support"))]
pub use rule_executor::{FakeRuleExecutor, RuleCall};
#[cfg(any(test, feature = "test-support"))]
pub use sink::{FakeEventSink, SinkCall};
