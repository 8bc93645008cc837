//! Shard distribution grouper.
//!
//! Collections sharing a `distributeShardsLike` prototype form a shard group.
//! The i-th shard of every member must be placed on the same servers as the
//! i-th shard of the prototype, so shards are matched by position, never by
//! name. Each planned shard is also compared with its `Current` entry to
//! classify its sync state.
//!
//! All defect sets are ordered sets of value-comparable records; reporting
//! the same shard twice is impossible by construction.

use crate::extract::{CollectionEntry, DatabaseIndex};
use crate::health::HealthIndex;
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Shard groups are scoped per database: cids are only unique within one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    pub database: String,
    pub search_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardGroup {
    pub key: GroupKey,
    /// Prototype first (when planned), then the followers in cid order.
    pub members: Vec<GroupMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMember {
    pub cid: String,
    pub name: String,
    pub planned: Vec<ShardLayout>,
    /// Only shards that already have a `Current` entry.
    pub current: Vec<ShardLayout>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardLayout {
    pub shard: String,
    pub servers: Vec<String>,
}

/// One shard whose observed state disagrees with its plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardIssue {
    pub database: String,
    pub cid: String,
    pub collection: String,
    pub shard: String,
    pub shard_index: usize,
    pub planned: Vec<String>,
    pub current: Vec<String>,
}

/// A group member whose i-th shard is not placed like the reference member's.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionViolation {
    pub database: String,
    pub search_key: String,
    pub reference_cid: String,
    pub cid: String,
    pub collection: String,
    pub shard_index: usize,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardGroups {
    #[serde(skip)]
    pub groups: BTreeMap<GroupKey, ShardGroup>,
    pub unplanned_leader: BTreeSet<ShardIssue>,
    pub no_insync_follower: BTreeSet<ShardIssue>,
    pub no_insync_and_dead_leader: BTreeSet<ShardIssue>,
    pub violated_distribute_shards_like: BTreeSet<DistributionViolation>,
}

impl ShardGroups {
    /// Keys of all groups with at least one placement violation.
    pub fn violated_groups(&self) -> BTreeSet<GroupKey> {
        self.violated_distribute_shards_like
            .iter()
            .map(|v| GroupKey {
                database: v.database.clone(),
                search_key: v.search_key.clone(),
            })
            .collect()
    }
}

pub fn group_shards(snapshot: &Snapshot, index: &DatabaseIndex, health: &HealthIndex) -> ShardGroups {
    let mut result = ShardGroups::default();

    for (database, entry) in &index.databases {
        let mut members: BTreeMap<&str, Vec<&CollectionEntry>> = BTreeMap::new();
        for collection in entry.collections.iter().filter(|c| !c.shards.is_empty()) {
            members.entry(collection.search_key()).or_default().push(collection);
        }

        for (search_key, mut collections) in members {
            // Stable sort keeps cid order among followers.
            collections.sort_by_key(|c| c.cid != search_key);
            let key = GroupKey {
                database: database.clone(),
                search_key: search_key.to_string(),
            };
            let group = build_group(snapshot, key, &collections, health, &mut result);
            check_colocation(&group, &mut result);
            result.groups.insert(group.key.clone(), group);
        }
    }

    debug!(
        groups = result.groups.len(),
        unplanned_leader = result.unplanned_leader.len(),
        no_insync_follower = result.no_insync_follower.len(),
        violated = result.violated_distribute_shards_like.len(),
        "grouped shards"
    );
    result
}

fn build_group(
    snapshot: &Snapshot,
    key: GroupKey,
    collections: &[&CollectionEntry],
    health: &HealthIndex,
    result: &mut ShardGroups,
) -> ShardGroup {
    let current_db = snapshot.current.collections.get(&key.database);
    let mut members = Vec::with_capacity(collections.len());

    for collection in collections {
        let current_col = current_db.and_then(|db| db.get(&collection.cid));
        let mut member = GroupMember {
            cid: collection.cid.clone(),
            name: collection.name.clone(),
            planned: Vec::with_capacity(collection.shards.len()),
            current: Vec::new(),
        };

        for (shard_index, shard) in collection.shards.iter().enumerate() {
            member.planned.push(ShardLayout {
                shard: shard.name.clone(),
                servers: shard.servers.clone(),
            });

            let Some(current) = current_col.and_then(|c| c.get(&shard.name)) else {
                debug!(
                    database = %key.database,
                    collection = %collection.name,
                    shard = %shard.name,
                    "shard has no Current entry yet, skipping sync comparison"
                );
                continue;
            };
            member.current.push(ShardLayout {
                shard: shard.name.clone(),
                servers: current.servers.clone(),
            });

            if shard.servers.is_empty() {
                continue;
            }
            let issue = || ShardIssue {
                database: key.database.clone(),
                cid: collection.cid.clone(),
                collection: collection.name.clone(),
                shard: shard.name.clone(),
                shard_index,
                planned: shard.servers.clone(),
                current: current.servers.clone(),
            };

            let current_leader = current.servers.first();
            if current_leader != shard.servers.first() {
                result.unplanned_leader.insert(issue());
            }
            if shard.servers.len() > 1 && current.servers.len() <= 1 {
                result.no_insync_follower.insert(issue());
                let leader_alive = current_leader.is_some_and(|l| health.is_alive(l));
                if !leader_alive {
                    result.no_insync_and_dead_leader.insert(issue());
                }
            }
        }
        members.push(member);
    }

    ShardGroup { key, members }
}

fn check_colocation(group: &ShardGroup, result: &mut ShardGroups) {
    let Some((reference, others)) = group.members.split_first() else {
        return;
    };

    for member in others {
        let width = reference.planned.len().max(member.planned.len());
        for shard_index in 0..width {
            let expected = reference.planned.get(shard_index).map(|l| &l.servers);
            let actual = member.planned.get(shard_index).map(|l| &l.servers);
            if expected == actual {
                continue;
            }
            result
                .violated_distribute_shards_like
                .insert(DistributionViolation {
                    database: group.key.database.clone(),
                    search_key: group.key.search_key.clone(),
                    reference_cid: reference.cid.clone(),
                    cid: member.cid.clone(),
                    collection: member.name.clone(),
                    shard_index,
                    expected: expected.cloned().unwrap_or_default(),
                    actual: actual.cloned().unwrap_or_default(),
                });
        }
    }
}
