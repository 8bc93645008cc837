//! Typed model of an agency snapshot.
//!
//! A [`Snapshot`] is the `arango` subtree of the coordination store, parsed
//! once at the boundary (see [`loader`]). All analysis passes borrow it
//! immutably; nothing writes back into it.
//!
//! Every subtree is read through the tolerant readers in `lenient`, so a
//! record of the wrong shape is kept as an empty record rather than
//! rejecting the whole snapshot.

mod lenient;
pub mod loader;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub use loader::{load_file, locate_root, snapshot_from_str, snapshot_from_value};

/// Collection type of edge collections (`2` is a document collection).
pub const EDGE_COLLECTION_TYPE: u64 = 3;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Snapshot {
    #[serde(default, deserialize_with = "lenient::section")]
    pub plan: Plan,
    #[serde(default, deserialize_with = "lenient::section")]
    pub current: Current,
    #[serde(default, deserialize_with = "lenient::section")]
    pub supervision: Supervision,
    #[serde(default, deserialize_with = "lenient::section")]
    pub target: Target,
}

/// Desired state.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Plan {
    #[serde(default, deserialize_with = "lenient::records")]
    pub databases: BTreeMap<String, PlanDatabase>,
    /// database name -> collection id -> record
    #[serde(default, deserialize_with = "lenient::nested_records")]
    pub collections: BTreeMap<String, BTreeMap<String, PlanCollection>>,
    #[serde(default, deserialize_with = "lenient::raw_map")]
    pub coordinators: BTreeMap<String, Value>,
    #[serde(default, rename = "DBServers", deserialize_with = "lenient::raw_map")]
    pub db_servers: BTreeMap<String, Value>,
    /// database name -> analyzer revision record, kept verbatim since it is
    /// the precondition of any repair.
    #[serde(default, deserialize_with = "lenient::raw_map")]
    pub analyzers: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub version: Option<u64>,
}

/// Observed state, as last reported by each server.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Current {
    /// database name -> collection id -> shard name -> shard state
    #[serde(default, deserialize_with = "lenient::nested_records3")]
    pub collections: BTreeMap<String, BTreeMap<String, BTreeMap<String, CurrentShard>>>,
    /// database name -> server id -> registration record
    #[serde(default, deserialize_with = "lenient::nested_raw_map")]
    pub databases: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default, deserialize_with = "lenient::raw_map")]
    pub coordinators: BTreeMap<String, Value>,
    #[serde(default, rename = "DBServers", deserialize_with = "lenient::raw_map")]
    pub db_servers: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub version: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Supervision {
    #[serde(default, deserialize_with = "lenient::records")]
    pub health: BTreeMap<String, ServerHealth>,
    #[serde(default, deserialize_with = "lenient::opt_record")]
    pub state: Option<SupervisionState>,
    #[serde(default)]
    pub maintenance: Option<Value>,
}

impl Supervision {
    /// Maintenance mode is on while the key holds anything but `false`/`null`.
    pub fn in_maintenance(&self) -> bool {
        !matches!(self.maintenance, None | Some(Value::Null) | Some(Value::Bool(false)))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SupervisionState {
    #[serde(default, deserialize_with = "lenient::string")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Target {
    #[serde(default, deserialize_with = "lenient::server_set")]
    pub failed_servers: BTreeSet<String>,
    #[serde(default, deserialize_with = "lenient::server_set")]
    pub cleaned_servers: BTreeSet<String>,
    #[serde(default, rename = "ToDo", deserialize_with = "lenient::raw_map")]
    pub to_do: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient::raw_map")]
    pub pending: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "lenient::raw_map")]
    pub failed: BTreeMap<String, Value>,
    #[serde(default)]
    pub hot_backup: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanDatabase {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    /// `"single"` for one-shard databases, `"flexible"` or absent otherwise.
    #[serde(default, deserialize_with = "lenient::string")]
    pub sharding: Option<String>,
    #[serde(default, deserialize_with = "replication_factor")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub write_concern: Option<u64>,
}

impl PlanDatabase {
    pub fn is_one_shard(&self) -> bool {
        self.sharding.as_deref() == Some("single")
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanCollection {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub number_of_shards: Option<u64>,
    #[serde(default, deserialize_with = "replication_factor")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub write_concern: Option<u64>,
    /// Name of `writeConcern` before 3.6; older records only carry this one.
    #[serde(default, deserialize_with = "lenient::number")]
    pub min_replication_factor: Option<u64>,
    #[serde(default, deserialize_with = "lenient::non_empty_string")]
    pub distribute_shards_like: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_smart: bool,
    #[serde(default, rename = "type", deserialize_with = "lenient::number")]
    pub collection_type: Option<u64>,
    #[serde(default, deserialize_with = "lenient::shard_map")]
    pub shards: Option<BTreeMap<String, Vec<String>>>,
    /// Index list exactly as stored, so a rewrite can use it as precondition.
    #[serde(default)]
    pub indexes: Option<Value>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sharding_strategy: Option<String>,
}

impl PlanCollection {
    pub fn effective_write_concern(&self) -> Option<u64> {
        self.write_concern.or(self.min_replication_factor)
    }

    pub fn is_edge(&self) -> bool {
        self.collection_type == Some(EDGE_COLLECTION_TYPE)
    }

    /// Stored index definitions; an object keyed by index id yields its values.
    pub fn index_entries(&self) -> Vec<&Value> {
        match &self.indexes {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Object(map)) => map.values().collect(),
            _ => Vec::new(),
        }
    }
}

/// The parts of an index definition the analyzer looks at. Everything else
/// stays in the stored JSON.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct IndexDefinition {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub index_type: Option<String>,
    /// String fields only; object fields (inverted indexes) are skipped.
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub fields: Vec<String>,
}

impl IndexDefinition {
    pub fn of(raw: &Value) -> Self {
        lenient::record(raw.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentShard {
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub servers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_string_list")]
    pub failover_candidates: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ServerStatus {
    #[serde(rename = "GOOD")]
    Good,
    #[serde(rename = "BAD")]
    Bad,
    #[serde(rename = "FAILED")]
    Failed,
    #[default]
    #[serde(other, rename = "UNKNOWN")]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ServerHealth {
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default, deserialize_with = "lenient::string")]
    pub short_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub endpoint: Option<String>,
}

impl ServerHealth {
    pub fn is_good(&self) -> bool {
        self.status == ServerStatus::Good
    }
}

/// `replicationFactor` is a count, or `"satellite"` for collections that are
/// replicated to every server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationFactor {
    Count(u64),
    Satellite,
}

impl Serialize for ReplicationFactor {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            ReplicationFactor::Count(n) => s.serialize_u64(*n),
            ReplicationFactor::Satellite => s.serialize_str("satellite"),
        }
    }
}

fn replication_factor<'de, D>(d: D) -> Result<Option<ReplicationFactor>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_u64().map(ReplicationFactor::Count),
        Some(Value::String(s)) if s == "satellite" => Some(ReplicationFactor::Satellite),
        Some(Value::String(s)) => s.parse().ok().map(ReplicationFactor::Count),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Snapshot {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn reads_plan_collection_fields() {
        let snapshot = parse(json!({
            "Plan": {"Collections": {"db": {"100": {
                "name": "edges", "id": 100, "type": 3, "isSmart": false,
                "numberOfShards": 2, "replicationFactor": "satellite",
                "distributeShardsLike": "",
                "shards": {"s1": ["PRMR-a", "PRMR-b"], "s2": ["PRMR-b"]},
                "indexes": [{"id": "0", "type": "primary", "fields": ["_key"], "unique": true}]
            }}}}
        }));
        let col = &snapshot.plan.collections["db"]["100"];
        assert_eq!(col.id.as_deref(), Some("100"));
        assert!(col.is_edge());
        assert_eq!(col.replication_factor, Some(ReplicationFactor::Satellite));
        assert_eq!(col.distribute_shards_like, None);
        assert_eq!(col.shards.as_ref().unwrap()["s1"], vec!["PRMR-a", "PRMR-b"]);
        let entries = col.index_entries();
        assert_eq!(entries[0]["unique"], json!(true));
        assert_eq!(IndexDefinition::of(entries[0]).id.as_deref(), Some("0"));
    }

    #[test]
    fn malformed_records_degrade_to_empty() {
        let snapshot = parse(json!({
            "Plan": {"Collections": {"db": {"100": null, "101": {"name": "x", "shards": []}}}},
            "Supervision": {"Health": {"PRMR-a": {"Status": "WEIRD"}}}
        }));
        let cols = &snapshot.plan.collections["db"];
        assert_eq!(cols["100"], PlanCollection::default());
        assert_eq!(cols["101"].shards, None);
        assert_eq!(snapshot.supervision.health["PRMR-a"].status, ServerStatus::Unknown);
    }

    #[test]
    fn failed_servers_accept_object_or_array() {
        let snapshot = parse(json!({
            "Target": {"FailedServers": {"PRMR-x": ["s1"]}, "CleanedServers": ["PRMR-y"]}
        }));
        assert!(snapshot.target.failed_servers.contains("PRMR-x"));
        assert!(snapshot.target.cleaned_servers.contains("PRMR-y"));
    }

    #[test]
    fn maintenance_flag() {
        let mut supervision = Supervision::default();
        assert!(!supervision.in_maintenance());
        supervision.maintenance = Some(json!("2024-01-01T00:00:00Z"));
        assert!(supervision.in_maintenance());
    }
}
