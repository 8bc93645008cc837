//! Database & collection extractor.
//!
//! Walks `Plan/Databases` and `Plan/Collections` once and builds a
//! normalized [`DatabaseIndex`]: per-database collection entries with their
//! shards in shard order, leader/follower roles, the per-server shard ledger
//! and every structurally malformed record found on the way. Extraction
//! never fails; malformed records are findings, not errors.

use crate::core::names::{compare_cids, compare_shard_names, is_system_name};
use crate::snapshot::{PlanCollection, ReplicationFactor, Snapshot};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseIndex {
    pub databases: BTreeMap<String, DatabaseEntry>,
    pub zombies: Vec<ZombieCollection>,
    pub broken: Vec<BrokenCollection>,
    pub obsolete: Vec<ObsoleteCollection>,
    pub no_plan_databases: Vec<NoPlanDatabase>,
    /// server id -> shard role counts
    pub ledger: BTreeMap<String, ShardLedger>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseEntry {
    pub name: String,
    pub is_system: bool,
    pub collections: Vec<CollectionEntry>,
    pub shards: Vec<String>,
    pub leaders: Vec<String>,
    pub followers: Vec<String>,
    pub real_leaders: Vec<String>,
}

impl DatabaseEntry {
    pub fn collection_names(&self) -> BTreeSet<&str> {
        self.collections.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn collection(&self, cid: &str) -> Option<&CollectionEntry> {
        self.collections.iter().find(|c| c.cid == cid)
    }

    pub fn collection_by_name(&self, name: &str) -> Option<&CollectionEntry> {
        self.collections.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    pub cid: String,
    pub id: String,
    pub name: String,
    pub number_of_shards: Option<u64>,
    pub replication_factor: Option<ReplicationFactor>,
    pub write_concern: Option<u64>,
    pub distribute_shards_like: Option<String>,
    pub is_smart: bool,
    #[serde(rename = "type")]
    pub collection_type: Option<u64>,
    /// Planned shards in shard order; empty when the record has no usable shard map.
    pub shards: Vec<ShardEntry>,
}

impl CollectionEntry {
    /// Key of the shard group this collection belongs to.
    pub fn search_key(&self) -> &str {
        self.distribute_shards_like.as_deref().unwrap_or(&self.cid)
    }

    pub fn is_system(&self) -> bool {
        is_system_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardEntry {
    pub name: String,
    /// Planned servers, leader first.
    pub servers: Vec<String>,
}

impl ShardEntry {
    pub fn leader(&self) -> Option<&str> {
        self.servers.first().map(String::as_str)
    }

    pub fn followers(&self) -> &[String] {
        self.servers.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardLedger {
    pub leaders: usize,
    pub followers: usize,
    pub real_leaders: usize,
}

/// Plan record with neither `name` nor `id`: residue of a deletion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ZombieCollection {
    pub database: String,
    pub cid: String,
}

/// Plan record with exactly one of `name` / `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenCollection {
    pub database: String,
    pub cid: String,
    pub name: Option<String>,
    pub id: Option<String>,
}

/// Several cids planned under one collection name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsoleteCollection {
    pub database: String,
    pub name: String,
    /// Lowest cid: the oldest record, treated as authoritative.
    pub canonical_cid: String,
    pub obsolete_cids: Vec<String>,
}

/// Database with collections in `Plan/Collections` but no `Plan/Databases` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoPlanDatabase {
    pub database: String,
    pub collections: usize,
}

pub fn extract_databases(snapshot: &Snapshot) -> DatabaseIndex {
    let mut index = DatabaseIndex::default();
    let plan = &snapshot.plan;

    for name in plan.databases.keys() {
        index
            .databases
            .insert(name.clone(), DatabaseEntry::named(name));
    }

    for (database, collections) in &plan.collections {
        if !plan.databases.contains_key(database) {
            index.no_plan_databases.push(NoPlanDatabase {
                database: database.clone(),
                collections: collections.len(),
            });
        }

        let mut cids: Vec<&String> = collections.keys().collect();
        cids.sort_by(|a, b| compare_cids(a, b));

        let mut entries = Vec::with_capacity(cids.len());
        for cid in cids {
            let record = &collections[cid];
            match (&record.name, &record.id) {
                (None, None) => index.zombies.push(ZombieCollection {
                    database: database.clone(),
                    cid: cid.clone(),
                }),
                (Some(name), Some(id)) => {
                    entries.push(collection_entry(cid, name, id, record));
                }
                (name, id) => index.broken.push(BrokenCollection {
                    database: database.clone(),
                    cid: cid.clone(),
                    name: name.clone(),
                    id: id.clone(),
                }),
            }
        }

        index
            .obsolete
            .extend(find_obsolete(database, &entries));

        let entry = index
            .databases
            .entry(database.clone())
            .or_insert_with(|| DatabaseEntry::named(database));
        for collection in entries {
            entry.absorb(&collection, &mut index.ledger);
            entry.collections.push(collection);
        }
    }

    debug!(
        databases = index.databases.len(),
        zombies = index.zombies.len(),
        broken = index.broken.len(),
        "extracted plan databases"
    );
    index
}

impl DatabaseEntry {
    fn named(name: &str) -> Self {
        DatabaseEntry {
            name: name.to_string(),
            is_system: is_system_name(name),
            ..DatabaseEntry::default()
        }
    }

    fn absorb(&mut self, collection: &CollectionEntry, ledger: &mut BTreeMap<String, ShardLedger>) {
        let independent = collection.distribute_shards_like.is_none();
        for shard in &collection.shards {
            self.shards.push(shard.name.clone());
            let Some(leader) = shard.leader() else {
                continue;
            };
            self.leaders.push(leader.to_string());
            let slot = ledger.entry(leader.to_string()).or_default();
            slot.leaders += 1;
            if independent {
                self.real_leaders.push(leader.to_string());
                slot.real_leaders += 1;
            }
            for follower in shard.followers() {
                self.followers.push(follower.clone());
                ledger.entry(follower.clone()).or_default().followers += 1;
            }
        }
    }
}

fn collection_entry(cid: &str, name: &str, id: &str, record: &PlanCollection) -> CollectionEntry {
    let mut shards: Vec<ShardEntry> = record
        .shards
        .iter()
        .flatten()
        .map(|(shard, servers)| ShardEntry {
            name: shard.clone(),
            servers: servers.clone(),
        })
        .collect();
    shards.sort_by(|a, b| compare_shard_names(&a.name, &b.name));

    CollectionEntry {
        cid: cid.to_string(),
        id: id.to_string(),
        name: name.to_string(),
        number_of_shards: record.number_of_shards,
        replication_factor: record.replication_factor,
        write_concern: record.effective_write_concern(),
        distribute_shards_like: record.distribute_shards_like.clone(),
        is_smart: record.is_smart,
        collection_type: record.collection_type,
        shards,
    }
}

fn find_obsolete(database: &str, entries: &[CollectionEntry]) -> Vec<ObsoleteCollection> {
    let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entry in entries {
        by_name.entry(&entry.name).or_default().push(&entry.cid);
    }

    by_name
        .into_iter()
        .filter(|(_, cids)| cids.len() > 1)
        .map(|(name, mut cids)| {
            cids.sort_by(|a, b| compare_cids(a, b));
            ObsoleteCollection {
                database: database.to_string(),
                name: name.to_string(),
                canonical_cid: cids[0].to_string(),
                obsolete_cids: cids[1..].iter().map(|c| c.to_string()).collect(),
            }
        })
        .collect()
}
