//! Edge collections planned with the legacy combined `_from`/`_to` index.
//!
//! Old versions stored both edge attributes in a single index with id `1`.
//! Current servers expect two single-field edge indexes, `1` on `_from` and
//! `2` on `_to`.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::repair::{AgencyTransaction, Remediation, plan_path};
use crate::snapshot::IndexDefinition;
use serde::Serialize;
use serde_json::{Value, json};

const EDGE_INDEX: &str = "edge";
const FROM: &str = "_from";
const TO: &str = "_to";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokenEdgeIndex {
    pub database: String,
    pub cid: String,
    pub collection: String,
    /// The stored index list, verbatim.
    pub indexes: Value,
    pub fixed: Vec<Value>,
}

impl Remediation for BrokenEdgeIndex {
    fn transaction(&self) -> Option<AgencyTransaction> {
        let key = plan_path(&["Collections", self.database.as_str(), self.cid.as_str(), "indexes"]);
        Some(
            AgencyTransaction::new()
                .set(key.clone(), json!(self.fixed))
                .expect_old(key, self.indexes.clone()),
        )
    }
}

fn is_combined_edge_index(index: &IndexDefinition) -> bool {
    index.id.as_deref() == Some("1")
        && index.index_type.as_deref() == Some(EDGE_INDEX)
        && index.fields.iter().any(|f| f == FROM)
        && index.fields.iter().any(|f| f == TO)
}

/// Copy of the combined index narrowed to one attribute. Other attributes of
/// the definition are kept.
fn single_edge_index(combined: &Value, id: &str, field: &str) -> Value {
    let mut index = combined.clone();
    if let Value::Object(map) = &mut index {
        map.insert("id".to_string(), json!(id));
        map.insert("fields".to_string(), json!([field]));
    }
    index
}

/// Replaces the combined index by the `_from`/`_to` pair at its position and
/// drops whatever held id `2` before. All other definitions pass through
/// untouched.
pub fn split_edge_index(indexes: &[&Value]) -> Option<Vec<Value>> {
    let parsed: Vec<IndexDefinition> = indexes.iter().map(|i| IndexDefinition::of(i)).collect();
    if !parsed.iter().any(is_combined_edge_index) {
        return None;
    }
    let mut fixed = Vec::with_capacity(indexes.len() + 1);
    for (raw, index) in indexes.iter().zip(&parsed) {
        if is_combined_edge_index(index) {
            fixed.push(single_edge_index(raw, "1", FROM));
            fixed.push(single_edge_index(raw, "2", TO));
        } else if index.id.as_deref() != Some("2") {
            fixed.push((*raw).clone());
        }
    }
    Some(fixed)
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Vec<BrokenEdgeIndex> {
    let mut found = Vec::new();
    for (database, entry) in &ctx.databases.databases {
        let Some(records) = ctx.snapshot.plan.collections.get(database) else {
            continue;
        };
        for collection in &entry.collections {
            let Some(record) = records.get(&collection.cid).filter(|r| r.is_edge()) else {
                continue;
            };
            let (Some(stored), Some(fixed)) =
                (record.indexes.as_ref(), split_edge_index(&record.index_entries()))
            else {
                continue;
            };
            found.push(BrokenEdgeIndex {
                database: database.clone(),
                cid: collection.cid.clone(),
                collection: collection.name.clone(),
                indexes: stored.clone(),
                fixed,
            });
        }
    }
    found
}

pub fn outcome(ctx: &AnalysisContext<'_>) -> Result<CheckOutcome> {
    CheckOutcome::from_issues(Check::BrokenEdgeIndexes, &detect(ctx))
}
