// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory devnode locking.
//!
//! Workers take a shared `flock` on the devnode before running rules so
//! that two workers never process the same devnode's rules concurrently —
//! mirrors the locking the rest of the udev ecosystem already expects on
//! `/dev/*` nodes, not a broker-internal invention.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("devnode {path} is already locked")]
    WouldBlock { path: PathBuf },
    #[error("lock operation failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held advisory lock on a devnode. Unlocking happens implicitly when this
/// is dropped, since `flock`s are released on file-descriptor close.
pub struct DevnodeLock {
    _file: File,
    path: PathBuf,
}

impl DevnodeLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Attempt to take a shared, non-blocking advisory lock on `devnode`.
///
/// Returns [`LockError::WouldBlock`] immediately rather than waiting — a
/// worker that can't get the lock re-queues its event behind whichever
/// other worker is holding it, instead of stalling its reactor loop.
pub fn try_lock_devnode(devnode: impl AsRef<Path>) -> Result<DevnodeLock, LockError> {
    let path = devnode.as_ref().to_path_buf();
    let file = OpenOptions::new()
        .read(true)
        .open(&path)
        .map_err(|source| LockError::Open {
            path: path.clone(),
            source,
        })?;
    match file.try_lock_shared() {
        Ok(()) => Ok(DevnodeLock { _file: file, path }),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            Err(LockError::WouldBlock { path })
        }
        Err(source) => Err(LockError::Io { path, source }),
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
