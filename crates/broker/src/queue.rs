// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event queue: ordered pending-device list and the blocking-relation
//! scan that decides which queued events are eligible for dispatch.

use std::collections::VecDeque;
use udevbroker_core::{Event, EventState, WorkerId};

/// Which events `cleanup` should drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupFilter {
    /// Only events still waiting for a worker.
    Queued,
    /// Every event, regardless of state.
    All,
}

/// Ordered list of pending device changes.
///
/// Storage is insertion-ordered (`VecDeque`), which is also seqnum order:
/// events are only ever appended at the tail and removed by value, never
/// reordered, so a lower index always means a lower seqnum.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. No duplicate-seqnum filtering — a repeated
    /// seqnum is a kernel bug, not something this queue guards against.
    pub fn insert(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Look up a running event by the worker holding it.
    pub fn find_by_worker(&self, worker: WorkerId) -> Option<&Event> {
        self.events.iter().find(|e| e.worker == Some(worker))
    }

    /// Remove and return the event attached to `worker`, if any.
    pub fn take_by_worker(&mut self, worker: WorkerId) -> Option<Event> {
        let index = self.events.iter().position(|e| e.worker == Some(worker))?;
        self.events.remove(index)
    }

    /// Mark the event attached to `worker` as idle-returned: clears its
    /// worker and start time, removes it from the queue since rule
    /// execution is done.
    pub fn remove_completed(&mut self, worker: WorkerId) -> Option<Event> {
        self.take_by_worker(worker)
    }

    /// Drop events matching `filter`.
    pub fn cleanup(&mut self, filter: CleanupFilter) {
        match filter {
            CleanupFilter::Queued => self.events.retain(|e| e.state != EventState::Queued),
            CleanupFilter::All => self.events.clear(),
        }
    }

    /// Scan seqnum order and return the index of every `Queued`,
    /// non-blocked event — a blocked event never halts
    /// consideration of later independent ones. Updates the memoized
    /// `delaying_seqnum` cache on every event it inspects.
    ///
    /// Dispatch itself is the caller's job (it may need to spawn a worker
    /// process, which is async); call [`EventQueue::mark_running`] after a
    /// successful dispatch for an index this returned.
    pub fn scan_ready(&mut self) -> Vec<usize> {
        let mut ready = Vec::new();
        for i in 0..self.events.len() {
            if self.events[i].state != EventState::Queued {
                continue;
            }
            if !self.is_blocked_at(i) {
                ready.push(i);
            }
        }
        ready
    }

    /// The event at an index [`EventQueue::scan_ready`] returned.
    pub fn event_at(&self, index: usize) -> &Event {
        &self.events[index]
    }

    /// Record a successful dispatch: `Queued → Running`, attach `worker`.
    pub fn mark_running(&mut self, index: usize, worker: WorkerId, start_time: std::time::Instant) {
        let event = &mut self.events[index];
        event.state = EventState::Running;
        event.worker = Some(worker);
        event.start_time = Some(start_time);
    }

    /// Memoized scan: is the event at `i` blocked by an earlier one?
    fn is_blocked_at(&mut self, i: usize) -> bool {
        let seqnum = self.events[i].seqnum;
        let delaying = self.events[i].delaying_seqnum;

        if delaying != 0 && self.events.iter().any(|e| e.seqnum == delaying) {
            return true;
        }

        for j in 0..i {
            let earlier_seqnum = self.events[j].seqnum;
            if earlier_seqnum < delaying {
                continue;
            }
            if earlier_seqnum >= seqnum {
                break;
            }
            if self.events[j].blocks(&self.events[i]) {
                self.events[i].delaying_seqnum = earlier_seqnum;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
