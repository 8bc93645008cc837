//! Compare-and-swap transactions against the agency.
//!
//! A transaction is written as `[operations, preconditions]`, both objects
//! keyed by absolute agency paths. The write only applies if every
//! precondition still holds, so a repair computed from a stale snapshot is
//! rejected instead of clobbering newer state.

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

const ROOT: &str = "/arango";

/// Builds an absolute agency path from its segments.
pub fn agency_path(segments: &[&str]) -> String {
    let mut path = String::from(ROOT);
    for segment in segments {
        path.push('/');
        path.push_str(segment);
    }
    path
}

pub fn plan_path(segments: &[&str]) -> String {
    let mut all = vec!["Plan"];
    all.extend_from_slice(segments);
    agency_path(&all)
}

pub fn current_path(segments: &[&str]) -> String {
    let mut all = vec!["Current"];
    all.extend_from_slice(segments);
    agency_path(&all)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgencyTransaction {
    pub operations: BTreeMap<String, Value>,
    pub preconditions: BTreeMap<String, Value>,
}

impl AgencyTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` at `path`. Writes below `Plan` or `Current` also bump
    /// that subtree's `Version` so servers pick up the change.
    pub fn set(mut self, path: String, value: Value) -> Self {
        self.bump_version_for(&path);
        self.operations
            .insert(path, json!({"op": "set", "new": value}));
        self
    }

    pub fn delete(mut self, path: String) -> Self {
        self.bump_version_for(&path);
        self.operations.insert(path, json!({"op": "delete"}));
        self
    }

    /// Requires `path` to still hold exactly `value`.
    pub fn expect_old(mut self, path: String, value: Value) -> Self {
        self.preconditions.insert(path, json!({"old": value}));
        self
    }

    /// Requires `path` to be absent (`true`) or present (`false`).
    pub fn expect_empty(mut self, path: String, empty: bool) -> Self {
        self.preconditions.insert(path, json!({"oldEmpty": empty}));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn bump_version_for(&mut self, path: &str) {
        for subtree in ["Plan", "Current"] {
            let prefix = agency_path(&[subtree]);
            if path.starts_with(&format!("{}/", prefix)) {
                self.operations.insert(
                    agency_path(&[subtree, "Version"]),
                    json!({"op": "increment"}),
                );
            }
        }
    }
}

impl Serialize for AgencyTransaction {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(2))?;
        seq.serialize_element(&self.operations)?;
        seq.serialize_element(&self.preconditions)?;
        seq.end()
    }
}

/// An issue that knows how to repair itself.
pub trait Remediation {
    /// The transaction fixing this issue, or `None` when the issue is
    /// reported only and needs an operator decision.
    fn transaction(&self) -> Option<AgencyTransaction> {
        None
    }
}
