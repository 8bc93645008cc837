//! Collections created before sharding strategies were recorded.

use super::{Check, CheckOutcome};
use crate::context::{AnalysisContext, Edition};
use crate::core::Result;
use crate::repair::{AgencyTransaction, Remediation, plan_path};
use crate::snapshot::PlanCollection;
use serde::Serialize;
use serde_json::json;

pub const COMMUNITY_COMPAT: &str = "community-compat";
pub const ENTERPRISE_COMPAT: &str = "enterprise-compat";
pub const ENTERPRISE_SMART_EDGE_COMPAT: &str = "enterprise-smart-edge-compat";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingShardingStrategy {
    pub database: String,
    pub cid: String,
    pub collection: String,
    pub sharding_strategy: &'static str,
}

impl Remediation for MissingShardingStrategy {
    fn transaction(&self) -> Option<AgencyTransaction> {
        let key = plan_path(&[
            "Collections",
            self.database.as_str(),
            self.cid.as_str(),
            "shardingStrategy",
        ]);
        Some(
            AgencyTransaction::new()
                .set(key.clone(), json!(self.sharding_strategy))
                .expect_empty(key, true),
        )
    }
}

/// Strategy a collection without one was implicitly sharded with.
pub fn infer_strategy(edition: Edition, record: &PlanCollection) -> &'static str {
    match edition {
        Edition::Community => COMMUNITY_COMPAT,
        Edition::Enterprise if record.is_smart && record.is_edge() => ENTERPRISE_SMART_EDGE_COMPAT,
        Edition::Enterprise => ENTERPRISE_COMPAT,
    }
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Vec<MissingShardingStrategy> {
    let mut found = Vec::new();
    for (database, entry) in &ctx.databases.databases {
        let Some(records) = ctx.snapshot.plan.collections.get(database) else {
            continue;
        };
        for collection in &entry.collections {
            let Some(record) = records.get(&collection.cid) else {
                continue;
            };
            if record.sharding_strategy.is_none() {
                found.push(MissingShardingStrategy {
                    database: database.clone(),
                    cid: collection.cid.clone(),
                    collection: collection.name.clone(),
                    sharding_strategy: infer_strategy(ctx.options.edition, record),
                });
            }
        }
    }
    found
}

pub fn outcome(ctx: &AnalysisContext<'_>) -> Result<CheckOutcome> {
    CheckOutcome::from_issues(Check::MissingShardingStrategy, &detect(ctx))
}
