// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

#[test]
fn locks_an_existing_devnode() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"devnode").unwrap();
    let lock = try_lock_devnode(file.path()).unwrap();
    assert_eq!(lock.path(), file.path());
}

#[test]
fn missing_devnode_is_an_open_error() {
    let err = try_lock_devnode("/nonexistent/devnode/path").unwrap_err();
    assert!(matches!(err, LockError::Open { .. }));
}

#[test]
fn exclusive_holder_blocks_a_second_exclusive_attempt() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let held = File::open(file.path()).unwrap();
    held.lock_exclusive().unwrap();

    let err = try_lock_devnode(file.path()).unwrap_err();
    assert!(matches!(err, LockError::WouldBlock { .. }));
}
