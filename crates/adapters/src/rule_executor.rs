// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule execution: applies the compiled rule set to a device and runs any
//! `RUN+=` programs it named.
//!
//! The rule language and interpreter are external collaborators — this
//! crate does not compile or evaluate rules. `ProcessRuleExecutor` hands the
//! device off to an out-of-process rule engine (configured by path) and
//! interprets its exit status and stdout contract; that external program is
//! what actually understands rule syntax.

use crate::subprocess::run_with_timeout;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use udevbroker_core::{Event, PropertiesSet};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule engine invocation failed: {0}")]
    Spawn(String),
    #[error("rule engine timed out after {0:?}")]
    Timeout(Duration),
    #[error("rule engine exited with status {0}")]
    NonZeroExit(i32),
}

/// Result of applying the rule set to one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Rules requested a persistent inotify watch on the devnode.
    pub watch_requested: bool,
    /// Property overlay produced by `ENV{...}+=` rule assignments.
    pub properties: Vec<(String, String)>,
}

/// Applies rules to devices and runs rule-requested programs.
///
/// Invoked once per event from inside the worker subprocess: first
/// `apply`, to evaluate matching rules against the device and
/// the current [`PropertiesSet`] snapshot, then `run_programs`, to execute
/// any `RUN+=` commands the matched rules named.
#[async_trait]
pub trait RuleExecutor: Clone + Send + Sync + 'static {
    async fn apply(
        &self,
        device: &Event,
        properties: &PropertiesSet,
    ) -> Result<RuleOutcome, RuleError>;

    async fn run_programs(&self, device: &Event, outcome: &RuleOutcome) -> Result<(), RuleError>;
}

/// Default per-event rule-engine timeout; bounded separately from the
/// worker-level fatal timeout so a hung rule program is diagnosable
/// without waiting for the full per-event kill.
pub const RULE_ENGINE_TIMEOUT: Duration = Duration::from_secs(60);

/// Production executor: delegates to an external rule-engine binary.
///
/// Serializes the device as `KEY=value\n` lines on the child's stdin and
/// reads a JSON [`RuleOutcome`] from its stdout — the wire contract between
/// this broker and the out-of-process rule interpreter it does not itself
/// implement.
#[derive(Clone)]
pub struct ProcessRuleExecutor {
    engine_path: PathBuf,
}

impl ProcessRuleExecutor {
    pub fn new(engine_path: impl Into<PathBuf>) -> Self {
        Self {
            engine_path: engine_path.into(),
        }
    }

    fn stdin_payload(device: &Event, properties: &PropertiesSet) -> Vec<u8> {
        let mut buf = String::new();
        buf.push_str(&format!("SEQNUM={}\n", device.seqnum));
        buf.push_str(&format!("DEVPATH={}\n", device.devpath));
        buf.push_str(&format!("SUBSYSTEM={}\n", device.subsystem));
        buf.push_str(&format!("ACTION={}\n", device.action));
        for (key, value) in properties.iter() {
            match value {
                Some(v) => buf.push_str(&format!("{key}={v}\n")),
                None => buf.push_str(&format!("{key}=\n")),
            }
        }
        buf.into_bytes()
    }
}

#[async_trait]
impl RuleExecutor for ProcessRuleExecutor {
    async fn apply(
        &self,
        device: &Event,
        properties: &PropertiesSet,
    ) -> Result<RuleOutcome, RuleError> {
        use std::process::Stdio;
        use tokio::io::AsyncWriteExt;

        let mut child = Command::new(&self.engine_path)
            .arg("apply")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| RuleError::Spawn(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = Self::stdin_payload(device, properties);
            let _ = stdin.write_all(&payload).await;
        }

        let output = tokio::time::timeout(RULE_ENGINE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| RuleError::Timeout(RULE_ENGINE_TIMEOUT))?
            .map_err(|e| RuleError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(RuleError::NonZeroExit(output.status.code().unwrap_or(-1)));
        }

        let outcome: RuleOutcome = serde_json::from_slice::<Wire>(&output.stdout)
            .map(Into::into)
            .unwrap_or_default();
        Ok(outcome)
    }

    async fn run_programs(&self, device: &Event, outcome: &RuleOutcome) -> Result<(), RuleError> {
        if outcome.properties.is_empty() && !outcome.watch_requested {
            return Ok(());
        }
        let mut cmd = Command::new(&self.engine_path);
        cmd.arg("run-programs").arg(&device.devpath);
        let output = run_with_timeout(cmd, RULE_ENGINE_TIMEOUT, "rule run_programs")
            .await
            .map_err(RuleError::Spawn)?;
        if !output.status.success() {
            return Err(RuleError::NonZeroExit(output.status.code().unwrap_or(-1)));
        }
        Ok(())
    }
}

#[derive(serde::Deserialize, Default)]
struct Wire {
    #[serde(default)]
    watch_requested: bool,
    #[serde(default)]
    properties: Vec<(String, String)>,
}

impl From<Wire> for RuleOutcome {
    fn from(wire: Wire) -> Self {
        RuleOutcome {
            watch_requested: wire.watch_requested,
            properties: wire.properties,
        }
    }
}

/// Recorded call to a [`FakeRuleExecutor`], for test assertions.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub enum RuleCall {
    Apply { seqnum: u64 },
    RunPrograms { seqnum: u64 },
}

/// Test double returning a configured [`RuleOutcome`] and recording calls.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeRuleExecutor {
    outcome: RuleOutcome,
    fail_apply: bool,
    calls: std::sync::Arc<parking_lot::Mutex<Vec<RuleCall>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeRuleExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, outcome: RuleOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_apply = true;
        self
    }

    pub fn calls(&self) -> Vec<RuleCall> {
        self.calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl RuleExecutor for FakeRuleExecutor {
    async fn apply(
        &self,
        device: &Event,
        _properties: &PropertiesSet,
    ) -> Result<RuleOutcome, RuleError> {
        self.calls.lock().push(RuleCall::Apply {
            seqnum: device.seqnum,
        });
        if self.fail_apply {
            return Err(RuleError::NonZeroExit(1));
        }
        Ok(self.outcome.clone())
    }

    async fn run_programs(&self, device: &Event, _outcome: &RuleOutcome) -> Result<(), RuleError> {
        self.calls.lock().push(RuleCall::RunPrograms {
            seqnum: device.seqnum,
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "rule_executor_tests.rs"]
mod tests;
