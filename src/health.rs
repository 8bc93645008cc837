//! Liveness oracle over `Supervision/Health`.

use crate::core::names::ServerRole;
use crate::snapshot::{ServerHealth, Snapshot};
use std::collections::BTreeMap;

/// Health records split by role and status.
///
/// A primary missing from `alive_primaries` is treated as dead by every
/// placement check, whether its status is BAD, FAILED or it has no record
/// at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthIndex {
    pub all_primaries: BTreeMap<String, ServerHealth>,
    pub alive_primaries: BTreeMap<String, ServerHealth>,
    pub alive_coordinators: BTreeMap<String, ServerHealth>,
}

impl HealthIndex {
    pub fn compute(snapshot: &Snapshot) -> Self {
        let mut index = HealthIndex::default();
        for (id, record) in &snapshot.supervision.health {
            match ServerRole::of(id) {
                ServerRole::Primary => {
                    index.all_primaries.insert(id.clone(), record.clone());
                    if record.is_good() {
                        index.alive_primaries.insert(id.clone(), record.clone());
                    }
                }
                ServerRole::Coordinator if record.is_good() => {
                    index.alive_coordinators.insert(id.clone(), record.clone());
                }
                _ => {}
            }
        }
        index
    }

    pub fn is_alive(&self, server_id: &str) -> bool {
        self.alive_primaries.contains_key(server_id)
    }

    pub fn is_known_primary(&self, server_id: &str) -> bool {
        self.all_primaries.contains_key(server_id)
    }

    /// Alive primaries then alive coordinators, each in id order.
    pub fn alive_servers(&self) -> impl Iterator<Item = (&String, &ServerHealth)> {
        self.alive_primaries.iter().chain(self.alive_coordinators.iter())
    }

    /// Short name (`DBServer0001`) for display, or the id when unknown.
    pub fn display_name<'a>(&'a self, server_id: &'a str) -> &'a str {
        self.all_primaries
            .get(server_id)
            .or_else(|| self.alive_coordinators.get(server_id))
            .and_then(|h| h.short_name.as_deref())
            .unwrap_or(server_id)
    }
}

/// `(all primaries, alive primaries)` of a snapshot.
pub fn compute_health(
    snapshot: &Snapshot,
) -> (BTreeMap<String, ServerHealth>, BTreeMap<String, ServerHealth>) {
    let index = HealthIndex::compute(snapshot);
    (index.all_primaries, index.alive_primaries)
}
