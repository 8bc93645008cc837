//! Database-level checks: dead primaries registered in `Current/Databases`,
//! databases without any collection, and databases missing system
//! collections.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::core::names::{GRAPHS_COLLECTION, SYSTEM_DATABASE, is_primary};
use crate::repair::{AgencyTransaction, Remediation, current_path, plan_path};
use crate::snapshot::ReplicationFactor;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentDeadPrimary {
    pub database: String,
    pub server: String,
    pub registration: Value,
}

impl Remediation for CurrentDeadPrimary {
    fn transaction(&self) -> Option<AgencyTransaction> {
        let key = current_path(&["Databases", self.database.as_str(), self.server.as_str()]);
        Some(
            AgencyTransaction::new()
                .delete(key.clone())
                .expect_old(key, self.registration.clone()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkeletonDatabase {
    pub database: String,
}

impl Remediation for SkeletonDatabase {
    /// Drops the database entry, unless collections were planned for it in
    /// the meantime. `_system` is never dropped.
    fn transaction(&self) -> Option<AgencyTransaction> {
        let db = self.database.as_str();
        if db == SYSTEM_DATABASE {
            return None;
        }
        Some(
            AgencyTransaction::new()
                .delete(plan_path(&["Databases", db]))
                .expect_empty(plan_path(&["Collections", db]), true),
        )
    }
}

/// Body of a collection-creation request, as accepted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionCreation {
    pub name: String,
    pub is_system: bool,
    #[serde(rename = "type")]
    pub collection_type: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribute_shards_like: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<ReplicationFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_concern: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingSystemCollections {
    pub database: String,
    pub missing: Vec<String>,
    /// Cid of the existing `_graphs` prototype, if there is one.
    pub graphs_cid: Option<String>,
    /// Creation order; never places anything ahead of `_graphs`.
    pub plan: Vec<CollectionCreation>,
}

/// New collection ids are allocated by the cluster, so creation goes through
/// the coordinator API rather than an agency write.
impl Remediation for MissingSystemCollections {}

pub fn current_dead_primaries(ctx: &AnalysisContext<'_>) -> Vec<CurrentDeadPrimary> {
    let mut found = Vec::new();
    for (database, servers) in &ctx.snapshot.current.databases {
        for (server, registration) in servers {
            if is_primary(server) && !ctx.health.is_alive(server) {
                found.push(CurrentDeadPrimary {
                    database: database.clone(),
                    server: server.clone(),
                    registration: registration.clone(),
                });
            }
        }
    }
    found
}

pub fn skeleton_databases(ctx: &AnalysisContext<'_>) -> Vec<SkeletonDatabase> {
    ctx.databases
        .databases
        .values()
        .filter(|entry| ctx.snapshot.plan.databases.contains_key(&entry.name))
        .filter(|entry| entry.collections.is_empty() && entry.shards.is_empty())
        .map(|entry| SkeletonDatabase {
            database: entry.name.clone(),
        })
        .collect()
}

pub fn missing_system_collections(ctx: &AnalysisContext<'_>) -> Vec<MissingSystemCollections> {
    let required = &ctx.options.system_collections;
    let mut found = Vec::new();

    for (database, entry) in &ctx.databases.databases {
        // Skeletons are reported on their own.
        if entry.collections.is_empty() {
            continue;
        }
        let Some(settings) = ctx.snapshot.plan.databases.get(database) else {
            continue;
        };
        let present = entry.collection_names();
        let mut missing: Vec<String> = required
            .iter()
            .filter(|name| !present.contains(name.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            continue;
        }
        missing.sort_by_key(|name| name != GRAPHS_COLLECTION);

        let plan = missing
            .iter()
            .map(|name| {
                let prototype = name == GRAPHS_COLLECTION;
                CollectionCreation {
                    name: name.clone(),
                    is_system: true,
                    collection_type: 2,
                    distribute_shards_like: (!prototype).then(|| GRAPHS_COLLECTION.to_string()),
                    replication_factor: settings.replication_factor.filter(|_| prototype),
                    write_concern: settings.write_concern.filter(|_| prototype),
                }
            })
            .collect();

        found.push(MissingSystemCollections {
            database: database.clone(),
            missing,
            graphs_cid: entry
                .collection_by_name(GRAPHS_COLLECTION)
                .map(|c| c.cid.clone()),
            plan,
        });
    }
    found
}

pub fn outcomes(ctx: &AnalysisContext<'_>) -> Result<Vec<CheckOutcome>> {
    Ok(vec![
        CheckOutcome::from_issues(Check::CurrentDeadPrimaries, &current_dead_primaries(ctx))?,
        CheckOutcome::from_issues(Check::SkeletonDatabases, &skeleton_databases(ctx))?,
        CheckOutcome::from_issues(
            Check::MissingSystemCollections,
            &missing_system_collections(ctx),
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AnalyzerOptions;
    use crate::snapshot::{Snapshot, snapshot_from_value};
    use serde_json::json;

    fn snapshot() -> Snapshot {
        snapshot_from_value(json!({"arango": {
            "Plan": {
                "Databases": {"full": {}, "partial": {"replicationFactor": 2}, "empty": {}, "_system": {}},
                "Collections": {
                    "full": {
                        "1": {"name": "_graphs", "id": "1", "shards": {"s1": ["PRMR-a"]}},
                        "2": {"name": "_apps", "id": "2", "shards": {"s2": ["PRMR-a"]}},
                        "3": {"name": "_appbundles", "id": "3", "shards": {"s3": ["PRMR-a"]}},
                        "4": {"name": "_aqlfunctions", "id": "4", "shards": {"s4": ["PRMR-a"]}},
                        "5": {"name": "_jobs", "id": "5", "shards": {"s5": ["PRMR-a"]}},
                        "6": {"name": "_queues", "id": "6", "shards": {"s6": ["PRMR-a"]}}
                    },
                    "partial": {
                        "7": {"name": "users", "id": "7", "shards": {"s7": ["PRMR-a"]}},
                        "8": {"name": "_apps", "id": "8", "shards": {"s8": ["PRMR-a"]}}
                    },
                    "dropped": {
                        "9": {"name": "leftover", "id": "9", "shards": {"s9": ["PRMR-a"]}}
                    }
                }
            },
            "Current": {"Databases": {"full": {
                "PRMR-a": {"name": "full"},
                "PRMR-dead": {"name": "full"},
                "CRDN-x": {"name": "full"}
            }}},
            "Supervision": {"Health": {"PRMR-a": {"Status": "GOOD"}}}
        }}))
        .unwrap()
    }

    #[test]
    fn dead_primary_in_current_databases() {
        let snapshot = snapshot();
        let options = AnalyzerOptions::default();
        let ctx = AnalysisContext::build(&snapshot, &options);

        let found = current_dead_primaries(&ctx);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].server, "PRMR-dead");
        let trx = found[0].transaction().unwrap();
        assert_eq!(
            trx.preconditions["/arango/Current/Databases/full/PRMR-dead"],
            json!({"old": {"name": "full"}})
        );
    }

    #[test]
    fn empty_database_is_a_skeleton_only() {
        let snapshot = snapshot();
        let options = AnalyzerOptions::default();
        let ctx = AnalysisContext::build(&snapshot, &options);

        let skeletons = skeleton_databases(&ctx);
        assert_eq!(
            skeletons,
            vec![
                SkeletonDatabase { database: "_system".into() },
                SkeletonDatabase { database: "empty".into() }
            ]
        );
        assert!(skeletons[0].transaction().is_none());
        let trx = skeletons[1].transaction().unwrap();
        assert_eq!(
            trx.preconditions["/arango/Plan/Collections/empty"],
            json!({"oldEmpty": true})
        );

        let missing = missing_system_collections(&ctx);
        assert!(missing.iter().all(|m| m.database != "empty"));
    }

    #[test]
    fn graphs_is_created_first() {
        let snapshot = snapshot();
        let options = AnalyzerOptions::default();
        let ctx = AnalysisContext::build(&snapshot, &options);

        // `dropped` only exists under Plan/Collections.
        let missing = missing_system_collections(&ctx);
        assert_eq!(missing.len(), 1);
        let partial = &missing[0];
        assert_eq!(partial.database, "partial");
        assert_eq!(
            partial.missing,
            vec!["_graphs", "_appbundles", "_aqlfunctions", "_jobs", "_queues"]
        );
        assert_eq!(partial.graphs_cid, None);
        assert_eq!(partial.plan[0].name, "_graphs");
        assert_eq!(partial.plan[0].replication_factor, Some(ReplicationFactor::Count(2)));
        assert!(
            partial.plan[1..]
                .iter()
                .all(|c| c.distribute_shards_like.as_deref() == Some("_graphs"))
        );
    }
}
