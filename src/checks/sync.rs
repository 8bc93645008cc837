//! Planned followers that have not caught up with their leader.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::repair::Remediation;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutOfSyncShard {
    pub database: String,
    pub cid: String,
    pub collection: String,
    pub shard: String,
    pub leader: String,
    pub leader_mismatch: bool,
    /// Planned followers not listed in `Current`.
    pub missing_followers: Vec<String>,
    pub planned: Vec<String>,
    pub current: Vec<String>,
}

/// Catching up is the job of the servers themselves.
impl Remediation for OutOfSyncShard {}

/// In sync means the leaders agree and every planned follower is reported
/// in `Current`, in any order.
pub fn detect(ctx: &AnalysisContext<'_>) -> Vec<OutOfSyncShard> {
    let mut found = Vec::new();
    for (database, entry) in &ctx.databases.databases {
        let Some(current_db) = ctx.snapshot.current.collections.get(database) else {
            continue;
        };
        for collection in &entry.collections {
            let Some(current_col) = current_db.get(&collection.cid) else {
                continue;
            };
            for shard in &collection.shards {
                let (Some(leader), Some(current)) = (shard.leader(), current_col.get(&shard.name))
                else {
                    continue;
                };
                let leader_mismatch = current.servers.first().map(String::as_str) != Some(leader);
                let missing_followers: Vec<String> = shard
                    .followers()
                    .iter()
                    .filter(|f| !current.servers.contains(*f))
                    .cloned()
                    .collect();
                if !leader_mismatch && missing_followers.is_empty() {
                    continue;
                }
                found.push(OutOfSyncShard {
                    database: database.clone(),
                    cid: collection.cid.clone(),
                    collection: collection.name.clone(),
                    shard: shard.name.clone(),
                    leader: leader.to_string(),
                    leader_mismatch,
                    missing_followers,
                    planned: shard.servers.clone(),
                    current: current.servers.clone(),
                });
            }
        }
    }
    found
}

/// Out-of-sync shards per planned leader.
pub fn per_leader(shards: &[OutOfSyncShard]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for shard in shards {
        *counts.entry(shard.leader.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn outcome(ctx: &AnalysisContext<'_>) -> Result<CheckOutcome> {
    let shards = detect(ctx);
    let outcome = CheckOutcome::from_issues(Check::OutOfSyncFollowers, &shards)?;
    Ok(outcome.with_summary(json!({ "perLeader": per_leader(&shards) })))
}
