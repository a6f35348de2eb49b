// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch-list bridge: rules can request a persistent inotify watch on a
//! devnode, so that later writes to it synthesize a `change` event without
//! waiting for the kernel to emit one itself.

use async_trait::async_trait;
use futures::StreamExt;
use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InotifyError {
    #[error("failed to initialize inotify: {0}")]
    Init(std::io::Error),
    #[error("failed to watch {path}: {source}")]
    AddWatch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("watch stream error: {0}")]
    Stream(std::io::Error),
}

/// An observed filesystem event on a watched devnode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InotifyEvent {
    /// A writer closed the devnode — synthesize a `change` uevent for it.
    CloseWrite { devpath: String },
    /// The kernel dropped the watch (devnode removed, filesystem
    /// unmounted, etc.) — the watch-list entry for this devnode ends.
    WatchEnded { devpath: String },
}

/// Maintains inotify watches on devnodes that rules asked to be watched.
#[async_trait]
pub trait InotifyWatcher: Send + Sync + 'static {
    /// Begin watching `devnode` (labeled `devpath` for the events it
    /// produces). Idempotent: watching an already-watched devnode just
    /// keeps the existing watch.
    fn watch(&mut self, devnode: &Path, devpath: &str) -> Result<(), InotifyError>;

    /// Stop watching `devpath`, if it was being watched.
    fn unwatch(&mut self, devpath: &str);

    /// Wait for the next watch-list event. Pending forever if nothing is
    /// being watched, mirroring [`crate::device_source::DeviceEventSource`]'s
    /// "no-op branch never fires" shape so the reactor's `select!` can treat
    /// an empty watch list the same as a source with nothing pending.
    async fn next(&mut self) -> Result<InotifyEvent, InotifyError>;
}

/// Production watcher backed by a real Linux inotify instance.
pub struct LinuxInotifyWatcher {
    inotify: Inotify,
    watches: HashMap<WatchDescriptor, String>,
    devpath_to_wd: HashMap<String, WatchDescriptor>,
}

impl LinuxInotifyWatcher {
    pub fn new() -> Result<Self, InotifyError> {
        let inotify = Inotify::init().map_err(InotifyError::Init)?;
        Ok(Self {
            inotify,
            watches: HashMap::new(),
            devpath_to_wd: HashMap::new(),
        })
    }
}

#[async_trait]
impl InotifyWatcher for LinuxInotifyWatcher {
    fn watch(&mut self, devnode: &Path, devpath: &str) -> Result<(), InotifyError> {
        if self.devpath_to_wd.contains_key(devpath) {
            return Ok(());
        }
        let wd = self
            .inotify
            .watches()
            .add(devnode, WatchMask::CLOSE_WRITE)
            .map_err(|source| InotifyError::AddWatch {
                path: devnode.to_path_buf(),
                source,
            })?;
        self.watches.insert(wd.clone(), devpath.to_string());
        self.devpath_to_wd.insert(devpath.to_string(), wd);
        Ok(())
    }

    fn unwatch(&mut self, devpath: &str) {
        if let Some(wd) = self.devpath_to_wd.remove(devpath) {
            let _ = self.inotify.watches().remove(wd.clone());
            self.watches.remove(&wd);
        }
    }

    async fn next(&mut self) -> Result<InotifyEvent, InotifyError> {
        if self.watches.is_empty() {
            return std::future::pending().await;
        }
        let mut buffer = [0u8; 4096];
        let mut stream = self
            .inotify
            .get_event_stream(&mut buffer)
            .map_err(InotifyError::Init)?;
        let event = stream
            .next()
            .await
            .ok_or_else(|| InotifyError::Stream(std::io::Error::other("stream ended")))?
            .map_err(InotifyError::Stream)?;

        let Some(devpath) = self.watches.get(&event.wd).cloned() else {
            return self.next().await;
        };

        if event.mask.contains(EventMask::IGNORED) {
            self.devpath_to_wd.remove(&devpath);
            self.watches.remove(&event.wd);
            return Ok(InotifyEvent::WatchEnded { devpath });
        }
        if event.mask.contains(EventMask::CLOSE_WRITE) {
            return Ok(InotifyEvent::CloseWrite { devpath });
        }
        Box::pin(self.next()).await
    }
}

/// Test double driven by a pushed queue of events.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeInotifyWatcher {
    watched: std::collections::HashSet<String>,
    pending: std::collections::VecDeque<InotifyEvent>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeInotifyWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InotifyEvent) {
        self.pending.push_back(event);
    }

    pub fn is_watching(&self, devpath: &str) -> bool {
        self.watched.contains(devpath)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl InotifyWatcher for FakeInotifyWatcher {
    fn watch(&mut self, _devnode: &Path, devpath: &str) -> Result<(), InotifyError> {
        self.watched.insert(devpath.to_string());
        Ok(())
    }

    fn unwatch(&mut self, devpath: &str) {
        self.watched.remove(devpath);
    }

    async fn next(&mut self) -> Result<InotifyEvent, InotifyError> {
        match self.pending.pop_front() {
            Some(event) => Ok(event),
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
#[path = "inotify_bridge_tests.rs"]
mod tests;
