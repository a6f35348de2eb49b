// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The event broker: the queue, worker pool, and control-plane flags tied
//! together into a single value owned outright by the daemon's reactor
//! task — never behind a `Mutex`, never shared across tasks.

pub mod control;
pub mod error;
pub mod queue;
pub mod worker_pool;

pub use control::ControlCommand;
pub use error::BrokerError;
pub use queue::{CleanupFilter, EventQueue};
pub use worker_pool::{default_children_max, WorkerPool, WorkerReport, WorkerSpawner};

use std::time::Duration;
use udevbroker_core::{Clock, Event, PropertiesSet, WorkerId};

/// The broker's mutable state: queue, worker pool, properties, and the
/// four control-plane flags, modeled as a single value passed to every
/// handler and owned outright by the reactor.
pub struct Broker<S: WorkerSpawner, C: Clock> {
    pub queue: EventQueue,
    pub pool: WorkerPool<S, C>,
    pub properties: PropertiesSet,
    clock: C,
    stop_exec_queue: bool,
    reload: bool,
    exiting: bool,
}

impl<S: WorkerSpawner, C: Clock> Broker<S, C> {
    pub fn new(spawner: S, clock: C, children_max: usize) -> Self {
        Self {
            queue: EventQueue::new(),
            pool: WorkerPool::new(spawner, clock.clone(), children_max),
            properties: PropertiesSet::new(),
            clock,
            stop_exec_queue: false,
            reload: false,
            exiting: false,
        }
    }

    /// True when neither the queue nor the worker pool holds anything —
    /// the condition that governs the `/run/udev/queue` busy marker.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.pool.is_empty()
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting
    }

    pub fn stop_exec_queue(&self) -> bool {
        self.stop_exec_queue
    }

    /// Consume the pending reload flag, if set.
    pub fn take_reload(&mut self) -> bool {
        std::mem::replace(&mut self.reload, false)
    }

    pub fn insert_event(&mut self, event: Event) {
        self.queue.insert(event);
    }

    /// Dispatch every event the queue currently considers ready, called
    /// from the reactor after draining worker-results and uevents, unless
    /// `stop_exec_queue` or exiting.
    pub async fn dispatch_pass(&mut self) {
        if self.stop_exec_queue || self.exiting {
            return;
        }
        let ready = self.queue.scan_ready();
        for index in ready {
            let event = self.queue.event_at(index).clone();
            if let Some(worker) = self.pool.dispatch(&event, &self.properties).await {
                self.queue.mark_running(index, worker, self.clock.now());
            }
        }
    }

    pub fn timeout_sweep(&mut self, warn: Duration, fatal: Duration) {
        self.pool.timeout_sweep(warn, fatal);
    }

    /// Invoked by the supervisor once the queue goes empty, to bound the
    /// idle process count.
    pub fn kill_idle(&mut self) {
        self.pool.kill_idle();
    }

    /// Frees the worker and removes its finished event from the queue.
    pub fn on_completion(&mut self, worker: WorkerId) {
        if self.pool.on_completion(worker).is_some() {
            self.queue.take_by_worker(worker);
        }
    }

    /// Frees the worker; returns the event it was holding, if any, for the
    /// caller to re-forward unprocessed and delete its persistence record
    /// (the broker itself has no sink or persistence handle — those are
    /// the daemon's adapters to invoke).
    pub fn on_child_exit(&mut self, worker: WorkerId) -> Option<Event> {
        let seqnum = self.pool.on_child_exit(worker)?;
        self.queue
            .take_by_worker(worker)
            .filter(|e| e.seqnum == seqnum)
    }

    /// Apply an administrative command.
    pub fn apply_control(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::SetLogLevel { level } => {
                tracing::info!(level, "log level change requested, killing workers to re-inherit it");
                self.pool.kill_all();
            }
            ControlCommand::StopExecQueue => {
                self.stop_exec_queue = true;
            }
            ControlCommand::StartExecQueue => {
                self.stop_exec_queue = false;
            }
            ControlCommand::Reload => {
                self.reload = true;
                self.pool.kill_all();
            }
            ControlCommand::SetEnv { assignment } => {
                if self.properties.apply_assignment(&assignment).is_none() {
                    tracing::warn!(assignment, "malformed SET_ENV assignment, ignored");
                    return;
                }
                self.pool.kill_all();
            }
            ControlCommand::SetMaxChildren { max } => {
                self.pool.set_children_max(max);
            }
            ControlCommand::Ping => {
                // Observability only; the caller answers via socket
                // liveness once prior uevents/inotify work has drained.
            }
            ControlCommand::Exit => {
                self.exiting = true;
            }
        }
    }

    /// `Running -> Draining`: purge queued events and kill all workers.
    pub fn begin_drain(&mut self) {
        self.exiting = true;
        self.queue.cleanup(CleanupFilter::Queued);
        self.pool.kill_all();
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
