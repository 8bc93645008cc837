//! Boundary parsing of agency dumps.
//!
//! Accepted shapes, detected automatically:
//! - `[ {"arango": {...}} ]`, the response of a read-all agency request
//! - `{"agency": {"arango": {...}}}` or `{"agency": [ {...} ]}`, as written by
//!   the cluster debug dump
//! - `{"arango": {...}}`
//! - the `arango` subtree itself (an object with a `Plan` key)

use super::Snapshot;
use crate::core::{AnalyzerError, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

const ROOT_KEY: &str = "arango";
const MAX_WRAPPING: usize = 4;

/// Strips the wrappers around the `arango` subtree.
pub fn locate_root(value: Value) -> Result<Value> {
    let mut current = value;
    for _ in 0..MAX_WRAPPING {
        current = match current {
            Value::Array(mut items) => {
                if items.is_empty() {
                    return Err(AnalyzerError::InvalidSnapshot(
                        "top-level array is empty".to_string(),
                    ));
                }
                items.swap_remove(0)
            }
            Value::Object(mut map) => {
                if let Some(inner) = map.remove("agency") {
                    inner
                } else if let Some(root) = map.remove(ROOT_KEY) {
                    return ensure_plan(root);
                } else if map.contains_key("Plan") {
                    return Ok(Value::Object(map));
                } else {
                    return Err(AnalyzerError::InvalidSnapshot(
                        "expected an 'agency' or 'arango' key".to_string(),
                    ));
                }
            }
            other => {
                return Err(AnalyzerError::InvalidSnapshot(format!(
                    "unexpected top-level JSON {}",
                    kind(&other)
                )));
            }
        };
    }
    Err(AnalyzerError::InvalidSnapshot(
        "snapshot is nested too deeply".to_string(),
    ))
}

fn ensure_plan(root: Value) -> Result<Value> {
    match &root {
        Value::Object(map) if map.contains_key("Plan") => Ok(root),
        Value::Object(_) => Err(AnalyzerError::InvalidSnapshot(
            "'arango' subtree has no Plan".to_string(),
        )),
        other => Err(AnalyzerError::InvalidSnapshot(format!(
            "'arango' subtree is {}, expected an object",
            kind(other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn snapshot_from_value(value: Value) -> Result<Snapshot> {
    let root = locate_root(value)?;
    let snapshot: Snapshot = serde_json::from_value(root)?;
    debug!(
        databases = snapshot.plan.databases.len(),
        servers = snapshot.supervision.health.len(),
        "snapshot parsed"
    );
    Ok(snapshot)
}

pub fn snapshot_from_str(raw: &str) -> Result<Snapshot> {
    let value: Value = serde_json::from_str(raw)?;
    snapshot_from_value(value)
}

pub fn load_file(path: &Path) -> Result<Snapshot> {
    let raw = fs::read_to_string(path)?;
    snapshot_from_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arango() -> Value {
        json!({"Plan": {"Databases": {"_system": {}}}})
    }

    #[test]
    fn detects_read_response() {
        let snapshot = snapshot_from_value(json!([{"arango": arango()}])).unwrap();
        assert!(snapshot.plan.databases.contains_key("_system"));
    }

    #[test]
    fn detects_agency_key() {
        let snapshot = snapshot_from_value(json!({"agency": {"arango": arango()}})).unwrap();
        assert!(snapshot.plan.databases.contains_key("_system"));

        let snapshot = snapshot_from_value(json!({"agency": [{"arango": arango()}]})).unwrap();
        assert!(snapshot.plan.databases.contains_key("_system"));
    }

    #[test]
    fn accepts_bare_subtree() {
        let snapshot = snapshot_from_value(arango()).unwrap();
        assert!(snapshot.plan.databases.contains_key("_system"));
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(matches!(
            snapshot_from_value(json!([])),
            Err(AnalyzerError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            snapshot_from_value(json!({"foo": 1})),
            Err(AnalyzerError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            snapshot_from_value(json!({"arango": {"Current": {}}})),
            Err(AnalyzerError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            snapshot_from_value(json!("text")),
            Err(AnalyzerError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            snapshot_from_str("{not json"),
            Err(AnalyzerError::Json(_))
        ));
    }
}
