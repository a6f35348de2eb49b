// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-change event and the blocking relation between events.

use crate::devnum::DevNum;
use crate::worker::WorkerId;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Kernel action classification.
///
/// `Other` preserves forward-compatibility with actions the kernel defines
/// after this enum was last updated, the way a wire enum with an unknown-tag
/// fallback round-trips values it doesn't otherwise recognize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Add,
    Remove,
    Change,
    Move,
    Online,
    Offline,
    Bind,
    Unbind,
    Other(String),
}

impl EventAction {
    /// Parse a kernel `ACTION=` value, falling back to `Other` for any
    /// string this enum doesn't otherwise recognize.
    pub fn parse(s: &str) -> Self {
        match s {
            "add" => EventAction::Add,
            "remove" => EventAction::Remove,
            "change" => EventAction::Change,
            "move" => EventAction::Move,
            "online" => EventAction::Online,
            "offline" => EventAction::Offline,
            "bind" => EventAction::Bind,
            "unbind" => EventAction::Unbind,
            other => EventAction::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Add => write!(f, "add"),
            EventAction::Remove => write!(f, "remove"),
            EventAction::Change => write!(f, "change"),
            EventAction::Move => write!(f, "move"),
            EventAction::Online => write!(f, "online"),
            EventAction::Offline => write!(f, "offline"),
            EventAction::Bind => write!(f, "bind"),
            EventAction::Unbind => write!(f, "unbind"),
            EventAction::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Queue membership state of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Queued,
    Running,
}

/// A single pending device change, keyed for dependency analysis.
///
/// All fields are set at insertion time and are immutable thereafter except
/// `state`, `delaying_seqnum`, `worker`, `start_time`, and `warned` — see
/// the field docs below. `start_time` and `worker` are not serialized: they
/// are runtime-only bookkeeping the broker clears on every restart, since
/// the queue itself does not persist across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Kernel-assigned ordinal; unique per event, sole basis for order.
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

    pub state: EventState,
    /// Cache of "lowest-seqnum earlier event that currently blocks me";
    /// `0` when unknown. Always `<= seqnum`.
    pub delaying_seqnum: u64,
    /// The worker currently running this event, if `state == Running`.
    #[serde(skip)]
    pub worker: Option<WorkerId>,
    /// Monotonic dispatch timestamp, used for timeout sweeps.
    #[serde(skip)]
    pub start_time: Option<Instant>,
    /// Whether a "taking long" warning has already been emitted.
    #[serde(skip)]
    pub warned: bool,
}

impl Event {
    /// Construct a freshly-inserted event: `Queued`, no delaying seqnum
    /// known yet, no worker, never warned.
    pub fn new(
        seqnum: u64,
        devpath: impl Into<String>,
        subsystem: impl Into<String>,
        action: EventAction,
    ) -> Self {
        Self {
            seqnum,
            devpath: devpath.into(),
            devpath_old: None,
            devnum: DevNum::NONE,
            is_block: false,
            ifindex: 0,
            subsystem: subsystem.into(),
            action,
            devtype: String::new(),
            sysname: String::new(),
            state: EventState::Queued,
            delaying_seqnum: 0,
            worker: None,
            start_time: None,
            warned: false,
        }
    }

    pub fn with_devpath_old(mut self, devpath_old: impl Into<String>) -> Self {
        self.devpath_old = Some(devpath_old.into());
        self
    }

    pub fn with_devnum(mut self, devnum: DevNum, is_block: bool) -> Self {
        self.devnum = devnum;
        self.is_block = is_block;
        self
    }

    pub fn with_ifindex(mut self, ifindex: u32) -> Self {
        self.ifindex = ifindex;
        self
    }

    /// Does the earlier event `self` block the later event `other`?
    ///
    /// `self` must have a strictly lower seqnum than `other`; callers (the
    /// queue scan) are responsible for only ever comparing against earlier
    /// events — this method does not itself check seqnum ordering, since
    /// the queue already walks in seqnum order and re-checking here would
    /// be redundant on every call.
    ///
    /// Implements conditions 1-6 of the blocking relation: same devnode,
    /// same network interface, rename source/target, same devpath, and
    /// devpath ancestor/descendant in either direction.
    pub fn blocks(&self, other: &Event) -> bool {
        // 1. same device node (devnum + block/char disambiguation)
        if !self.devnum.is_none() && self.devnum == other.devnum && self.is_block == other.is_block
        {
            return true;
        }
        // 2. same network interface
        if self.ifindex != 0 && self.ifindex == other.ifindex {
            return true;
        }
        // 3. other is a rename whose previous name is self's devpath
        if other.devpath_old.as_deref() == Some(self.devpath.as_str()) {
            return true;
        }
        // 4. same devpath
        if self.devpath == other.devpath {
            return true;
        }
        // 5. self is an ancestor of other (self.devpath is a proper "/"-separated
        //    prefix of other.devpath)
        if is_path_ancestor(&self.devpath, &other.devpath) {
            return true;
        }
        // 6. self is a descendant of other
        if is_path_ancestor(&other.devpath, &self.devpath) {
            return true;
        }
        false
    }
}

/// True if `ancestor` is a proper prefix of `descendant`, separated by `/`.
///
/// `"/devices/pci"` is an ancestor of `"/devices/pci/a"` but not of
/// `"/devices/pciehost"` — the prefix must end exactly at a path separator.
fn is_path_ancestor(ancestor: &str, descendant: &str) -> bool {
    if ancestor.len() >= descendant.len() {
        return false;
    }
    descendant.starts_with(ancestor) && descendant.as_bytes()[ancestor.len()] == b'/'
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
