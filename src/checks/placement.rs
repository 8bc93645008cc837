//! Planned shards placed on primaries that are not alive.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::repair::{AgencyTransaction, Remediation, current_path, plan_path};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardPosition {
    Leader,
    Follower,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadPrimary {
    pub database: String,
    pub cid: String,
    pub collection: String,
    pub shard: String,
    pub server: String,
    pub position: ShardPosition,
    /// Planned servers as seen in the snapshot (precondition of the repair).
    pub planned: Vec<String>,
    /// Current servers, when the shard is already reported.
    pub current: Option<Vec<String>>,
}

impl Remediation for DeadPrimary {
    /// Drops a dead follower from Plan and Current. A dead leader needs a
    /// failover decision and gets no transaction.
    fn transaction(&self) -> Option<AgencyTransaction> {
        if self.position == ShardPosition::Leader {
            return None;
        }
        let (db, cid, shard) = (self.database.as_str(), self.cid.as_str(), self.shard.as_str());
        let plan_key = plan_path(&["Collections", db, cid, "shards", shard]);
        let without = |servers: &[String]| -> Vec<String> {
            servers.iter().filter(|s| **s != self.server).cloned().collect()
        };

        let mut trx = AgencyTransaction::new()
            .set(plan_key.clone(), json!(without(&self.planned)))
            .expect_old(plan_key, json!(self.planned));

        if let Some(current) = self.current.as_ref().filter(|c| c.contains(&self.server)) {
            let current_key = current_path(&["Collections", db, cid, shard, "servers"]);
            trx = trx
                .set(current_key.clone(), json!(without(current)))
                .expect_old(current_key, json!(current));
        }
        Some(trx)
    }
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Vec<DeadPrimary> {
    let mut found = Vec::new();
    for (database, entry) in &ctx.databases.databases {
        let current_db = ctx.snapshot.current.collections.get(database);
        for collection in &entry.collections {
            for shard in &collection.shards {
                for (pos, server) in shard.servers.iter().enumerate() {
                    if ctx.health.is_alive(server) {
                        continue;
                    }
                    let current = current_db
                        .and_then(|db| db.get(&collection.cid))
                        .and_then(|col| col.get(&shard.name))
                        .map(|s| s.servers.clone());
                    found.push(DeadPrimary {
                        database: database.clone(),
                        cid: collection.cid.clone(),
                        collection: collection.name.clone(),
                        shard: shard.name.clone(),
                        server: server.clone(),
                        position: if pos == 0 {
                            ShardPosition::Leader
                        } else {
                            ShardPosition::Follower
                        },
                        planned: shard.servers.clone(),
                        current,
                    });
                }
            }
        }
    }
    found
}

pub fn outcome(ctx: &AnalysisContext<'_>) -> Result<CheckOutcome> {
    CheckOutcome::from_issues(Check::DeadPrimaries, &detect(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AnalysisContext, AnalyzerOptions};
    use crate::snapshot::snapshot_from_value;

    #[test]
    fn dead_leader_and_follower() {
        let snapshot = snapshot_from_value(json!({"arango": {
            "Plan": {"Databases": {"db": {}}, "Collections": {"db": {
                "1": {"name": "c", "id": "1", "shards": {
                    "s1": ["PRMR-dead", "PRMR-ok"],
                    "s2": ["PRMR-ok", "PRMR-dead"]
                }}
            }}},
            "Current": {"Collections": {"db": {"1": {
                "s2": {"servers": ["PRMR-ok", "PRMR-dead"]}
            }}}},
            "Supervision": {"Health": {
                "PRMR-ok": {"Status": "GOOD"},
                "PRMR-dead": {"Status": "FAILED"}
            }}
        }}))
        .unwrap();
        let options = AnalyzerOptions::default();
        let ctx = AnalysisContext::build(&snapshot, &options);

        let found = detect(&ctx);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].position, ShardPosition::Leader);
        assert!(found[0].transaction().is_none());

        let follower = &found[1];
        assert_eq!(follower.shard, "s2");
        let trx = follower.transaction().unwrap();
        assert_eq!(
            trx.operations["/arango/Plan/Collections/db/1/shards/s2"],
            json!({"op": "set", "new": ["PRMR-ok"]})
        );
        assert_eq!(
            trx.operations["/arango/Current/Collections/db/1/s2/servers"],
            json!({"op": "set", "new": ["PRMR-ok"]})
        );
        assert_eq!(
            trx.preconditions["/arango/Plan/Collections/db/1/shards/s2"],
            json!({"old": ["PRMR-ok", "PRMR-dead"]})
        );
    }
}
