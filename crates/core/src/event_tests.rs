// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn ev(seqnum: u64, devpath: &str) -> Event {
    Event::new(seqnum, devpath, "block", EventAction::Add)
}

#[test]
fn same_devpath_blocks() {
    let earlier = ev(10, "/devices/pci/a");
    let later = ev(11, "/devices/pci/a");
    assert!(earlier.blocks(&later));
}

#[test]
fn ancestor_blocks_descendant() {
    let earlier = ev(10, "/devices/pci");
    let later = ev(11, "/devices/pci/a");
    assert!(earlier.blocks(&later));
}

#[test]
fn descendant_blocks_ancestor_when_descendant_is_earlier() {
    let earlier = ev(10, "/devices/pci/a");
    let later = ev(11, "/devices/pci");
    assert!(earlier.blocks(&later));
}

#[test]
fn sibling_prefix_does_not_block() {
    // "/devices/pci" is a string-prefix of "/devices/pciehost" but not a
    // "/"-separated ancestor, so it must not block.
    let earlier = ev(10, "/devices/pci");
    let later = ev(11, "/devices/pciehost");
    assert!(!earlier.blocks(&later));
}

#[test]
fn rename_blocks_on_old_devpath() {
    let earlier = ev(10, "/devices/x");
    let later = ev(11, "/devices/y").with_devpath_old("/devices/x");
    assert!(earlier.blocks(&later));
}

#[test]
fn rename_does_not_block_unrelated_devpath() {
    let earlier = ev(10, "/devices/z");
    let later = ev(11, "/devices/y").with_devpath_old("/devices/x");
    assert!(!earlier.blocks(&later));
}

#[test]
fn same_devnum_same_block_flag_blocks() {
    let devnum = DevNum::new(8, 1);
    let earlier = ev(10, "/devices/a").with_devnum(devnum, true);
    let later = ev(11, "/devices/b").with_devnum(devnum, true);
    assert!(earlier.blocks(&later));
}

#[test]
fn same_devnum_different_block_flag_does_not_block() {
    let devnum = DevNum::new(8, 1);
    let earlier = ev(10, "/devices/a").with_devnum(devnum, true);
    let later = ev(11, "/devices/b").with_devnum(devnum, false);
    assert!(!earlier.blocks(&later));
}

#[test]
fn zero_devnum_never_blocks_on_devnum_alone() {
    let earlier = ev(10, "/devices/a").with_devnum(DevNum::NONE, true);
    let later = ev(11, "/devices/b").with_devnum(DevNum::NONE, true);
    assert!(!earlier.blocks(&later));
}

#[test]
fn same_ifindex_blocks() {
    let earlier = ev(10, "/devices/net/eth0").with_ifindex(3);
    let later = ev(11, "/devices/net/eth1").with_ifindex(3);
    assert!(earlier.blocks(&later));
}

#[test]
fn zero_ifindex_never_blocks() {
    let earlier = ev(10, "/devices/net/eth0").with_ifindex(0);
    let later = ev(11, "/devices/net/eth1").with_ifindex(0);
    assert!(!earlier.blocks(&later));
}

#[test]
fn independent_events_do_not_block() {
    let earlier = ev(10, "/devices/a");
    let later = ev(11, "/devices/b");
    assert!(!earlier.blocks(&later));
}

#[test]
fn action_parse_falls_back_to_other() {
    assert_eq!(EventAction::parse("add"), EventAction::Add);
    assert_eq!(
        EventAction::parse("frobnicate"),
        EventAction::Other("frobnicate".to_string())
    );
}

#[test]
fn action_display_matches_kernel_spelling() {
    assert_eq!(EventAction::Change.to_string(), "change");
    assert_eq!(EventAction::Other("xyz".to_string()).to_string(), "xyz");
}
