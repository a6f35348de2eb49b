// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent per-device record store (`/run/udev/data/*`).
//!
//! Records are written by workers after rule execution and deleted by the
//! daemon when a worker dies holding an event. The device-attribute
//! database itself is an external collaborator — this is the thin record
//! store the broker is allowed to mutate directly, not the attribute
//! query engine.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use udevbroker_core::{DevNum, Event};

#[derive(Debug, Error)]
pub enum DevicePersistenceError {
    #[error("io error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Device-record identity: by devnum when the device has one, otherwise by
/// devpath — mirrors how the broker itself disambiguates devices in the
/// blocking relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceKey {
    Node { devnum: DevNum, is_block: bool },
    Path(String),
}

impl DeviceKey {
    fn filename(&self) -> String {
        match self {
            DeviceKey::Node { devnum, is_block } => {
                let kind = if *is_block { 'b' } else { 'c' };
                format!("{kind}{}:{}", devnum.major, devnum.minor)
            }
            DeviceKey::Path(devpath) => format!("+path:{}", devpath.replace('/', "-")),
        }
    }
}

/// Persists and removes per-device rule-execution records.
#[async_trait]
pub trait DevicePersistence: Clone + Send + Sync + 'static {
    /// Write (or overwrite) the record for `key` with `properties` content.
    async fn record(
        &self,
        key: &DeviceKey,
        properties: &[(String, String)],
    ) -> Result<(), DevicePersistenceError>;

    /// Delete the record for `key`, if any.
    async fn delete(&self, key: &DeviceKey) -> Result<(), DevicePersistenceError>;

    /// Remove `key` from any tag index it was added to, on worker-fatal
    /// cleanup.
    async fn untag(&self, key: &DeviceKey) -> Result<(), DevicePersistenceError>;
}

/// Production store: one file per device under `data_dir` (default
/// `/run/udev/data`), `KEY=value\n` lines, matching the on-disk format the
/// rest of the udev ecosystem expects to find there.
#[derive(Clone)]
pub struct FsDevicePersistence {
    data_dir: PathBuf,
}

impl FsDevicePersistence {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path_for(&self, key: &DeviceKey) -> PathBuf {
        self.data_dir.join(key.filename())
    }
}

#[async_trait]
impl DevicePersistence for FsDevicePersistence {
    async fn record(
        &self,
        key: &DeviceKey,
        properties: &[(String, String)],
    ) -> Result<(), DevicePersistenceError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DevicePersistenceError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let mut content = String::new();
        for (k, v) in properties {
            content.push_str(&format!("{k}={v}\n"));
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| DevicePersistenceError::Io { path, source })
    }

    async fn delete(&self, key: &DeviceKey) -> Result<(), DevicePersistenceError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DevicePersistenceError::Io { path, source }),
        }
    }

    async fn untag(&self, key: &DeviceKey) -> Result<(), DevicePersistenceError> {
        // Tag indices live alongside the per-device record as
        // `tags/<tag>/<filename>` symlinks; dropping the whole per-device
        // tag directory is enough since it's recreated on next `record`.
        let tag_dir = self.data_dir.join("tags").join(key.filename());
        match tokio::fs::remove_dir_all(&tag_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DevicePersistenceError::Io {
                path: tag_dir,
                source,
            }),
        }
    }
}

/// Recorded call to a [`FakeDevicePersistence`], for test assertions.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub enum PersistenceCall {
    Record(DeviceKey),
    Delete(DeviceKey),
    Untag(DeviceKey),
}

/// In-memory test double.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeDevicePersistence {
    calls: std::sync::Arc<parking_lot::Mutex<Vec<PersistenceCall>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeDevicePersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PersistenceCall> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl DevicePersistence for FakeDevicePersistence {
    async fn record(
        &self,
        key: &DeviceKey,
        _properties: &[(String, String)],
    ) -> Result<(), DevicePersistenceError> {
        self.calls.lock().push(PersistenceCall::Record(key.clone()));
        Ok(())
    }

    async fn delete(&self, key: &DeviceKey) -> Result<(), DevicePersistenceError> {
        self.calls.lock().push(PersistenceCall::Delete(key.clone()));
        Ok(())
    }

    async fn untag(&self, key: &DeviceKey) -> Result<(), DevicePersistenceError> {
        self.calls.lock().push(PersistenceCall::Untag(key.clone()));
        Ok(())
    }
}

/// Build the persistence key for an event, preferring the devnode identity
/// when the event has one and falling back to devpath.
pub fn key_for_event(event: &Event) -> DeviceKey {
    if event.devnum.is_none() {
        DeviceKey::Path(event.devpath.clone())
    } else {
        DeviceKey::Node {
            devnum: event.devnum,
            is_block: event.is_block,
        }
    }
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
