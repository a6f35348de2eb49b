// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use udevbroker_core::{DevNum, EventAction};

fn ev(seqnum: u64, devpath: &str) -> Event {
    Event::new(seqnum, devpath, "block", EventAction::Add)
}

#[test]
fn independent_events_are_both_ready() {
    let mut queue = EventQueue::new();
    queue.insert(ev(10, "/devices/a"));
    queue.insert(ev(11, "/devices/b"));

    let ready = queue.scan_ready();
    assert_eq!(ready, vec![0, 1]);
}

#[test]
fn same_devpath_blocks_the_later_event() {
    let mut queue = EventQueue::new();
    queue.insert(ev(10, "/devices/pci/a"));
    queue.insert(ev(11, "/devices/pci/a"));

    let ready = queue.scan_ready();
    assert_eq!(ready, vec![0]);
    assert_eq!(queue.event_at(1).delaying_seqnum, 10);
}

#[test]
fn ancestor_descendant_blocks() {
    let mut queue = EventQueue::new();
    queue.insert(ev(10, "/devices/pci"));
    queue.insert(ev(11, "/devices/pci/a"));

    let ready = queue.scan_ready();
    assert_eq!(ready, vec![0]);
}

#[test]
fn rename_blocks_on_old_devpath() {
    let mut queue = EventQueue::new();
    queue.insert(ev(10, "/devices/x"));
    queue.insert(ev(11, "/devices/y").with_devpath_old("/devices/x"));

    let ready = queue.scan_ready();
    assert_eq!(ready, vec![0]);
}

#[test]
fn same_devnum_blocks_regardless_of_devpath() {
    let mut queue = EventQueue::new();
    queue.insert(ev(10, "/devices/a").with_devnum(DevNum::new(8, 1), true));
    queue.insert(ev(11, "/devices/b").with_devnum(DevNum::new(8, 1), true));

    let ready = queue.scan_ready();
    assert_eq!(ready, vec![0]);
}

#[test]
fn blocker_leaving_the_queue_unblocks_the_later_event() {
    let mut queue = EventQueue::new();
    queue.insert(ev(10, "/devices/pci/a"));
    queue.insert(ev(11, "/devices/pci/a"));

    assert_eq!(queue.scan_ready(), vec![0]);
    queue.mark_running(0, WorkerId::new(100), std::time::Instant::now());
    queue.take_by_worker(WorkerId::new(100));

    assert_eq!(queue.scan_ready(), vec![0]);
}

#[test]
fn cleanup_queued_only_removes_queued_events() {
    let mut queue = EventQueue::new();
    queue.insert(ev(10, "/devices/a"));
    queue.insert(ev(11, "/devices/b"));
    queue.mark_running(0, WorkerId::new(1), std::time::Instant::now());

    queue.cleanup(CleanupFilter::Queued);

    assert_eq!(queue.len(), 1);
    assert_eq!(queue.event_at(0).seqnum, 10);
}

#[test]
fn cleanup_all_empties_the_queue() {
    let mut queue = EventQueue::new();
    queue.insert(ev(10, "/devices/a"));
    queue.cleanup(CleanupFilter::All);
    assert!(queue.is_empty());
}

#[test]
fn is_empty_reflects_population() {
    let mut queue = EventQueue::new();
    assert!(queue.is_empty());
    queue.insert(ev(1, "/devices/a"));
    assert!(!queue.is_empty());
}
