//! Collections whose shard layout cannot be derived: a missing
//! `distributeShardsLike` prototype, or no shards at all.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::repair::Remediation;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingPrototype {
    pub database: String,
    pub cid: String,
    pub name: String,
    pub distribute_shards_like: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardlessCollection {
    pub database: String,
    pub cid: String,
    pub name: String,
    pub number_of_shards: Option<u64>,
}

impl Remediation for MissingPrototype {}
impl Remediation for ShardlessCollection {}

pub fn missing_prototypes(ctx: &AnalysisContext<'_>) -> Vec<MissingPrototype> {
    let mut found = Vec::new();
    for (database, entry) in &ctx.databases.databases {
        for collection in &entry.collections {
            let Some(prototype) = collection.distribute_shards_like.as_deref() else {
                continue;
            };
            if entry.collection(prototype).is_none() {
                found.push(MissingPrototype {
                    database: database.clone(),
                    cid: collection.cid.clone(),
                    name: collection.name.clone(),
                    distribute_shards_like: prototype.to_string(),
                });
            }
        }
    }
    found
}

/// Smart collections keep their data in hidden shadow collections and may
/// legitimately have no shards of their own.
pub fn shardless_collections(ctx: &AnalysisContext<'_>) -> Vec<ShardlessCollection> {
    ctx.databases
        .databases
        .iter()
        .flat_map(|(database, entry)| {
            entry
                .collections
                .iter()
                .filter(|c| !c.is_smart && c.shards.is_empty())
                .map(move |c| ShardlessCollection {
                    database: database.clone(),
                    cid: c.cid.clone(),
                    name: c.name.clone(),
                    number_of_shards: c.number_of_shards,
                })
        })
        .collect()
}

pub fn outcomes(ctx: &AnalysisContext<'_>) -> Result<Vec<CheckOutcome>> {
    Ok(vec![
        CheckOutcome::from_issues(Check::RealLeaderMissing, &missing_prototypes(ctx))?,
        CheckOutcome::from_issues(Check::NoShardCollections, &shardless_collections(ctx))?,
    ])
}
