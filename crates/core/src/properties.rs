// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker-owned environment overlay delivered to workers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mapping from environment key to optional value.
///
/// A `None` value means "explicit unset": the worker should remove the key
/// from its rule-execution environment rather than inherit whatever the
/// parent process had. Mutated only by the control plane (`SET_ENV`);
/// delivered as a snapshot to each worker at spawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertiesSet {
    entries: HashMap<String, Option<String>>,
}

impl PropertiesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a key. `value = None` records an explicit unset.
    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        self.entries.insert(key.into(), value);
    }

    /// Parse a `SET_ENV` payload of the form `"k=v"` or `"k="` (unset).
    pub fn apply_assignment(&mut self, assignment: &str) -> Option<()> {
        let (key, value) = assignment.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        if value.is_empty() {
            self.set(key, None);
        } else {
            self.set(key, Some(value.to_string()));
        }
        Some(())
    }

    pub fn get(&self, key: &str) -> Option<&Option<String>> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Option<String>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_env_upsert() {
        let mut props = PropertiesSet::new();
        assert!(props.apply_assignment("FOO=bar").is_some());
        assert_eq!(props.get("FOO"), Some(&Some("bar".to_string())));
    }

    #[test]
    fn set_env_unset_on_empty_value() {
        let mut props = PropertiesSet::new();
        props.set("FOO", Some("bar".to_string()));
        assert!(props.apply_assignment("FOO=").is_some());
        assert_eq!(props.get("FOO"), Some(&None));
    }

    #[test]
    fn set_env_rejects_missing_equals() {
        let mut props = PropertiesSet::new();
        assert!(props.apply_assignment("FOO").is_none());
        assert!(props.is_empty());
    }

    #[test]
    fn set_env_rejects_empty_key() {
        let mut props = PropertiesSet::new();
        assert!(props.apply_assignment("=bar").is_none());
        assert!(props.is_empty());
    }
}
