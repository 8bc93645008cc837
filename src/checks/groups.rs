//! Families produced by the shard distribution grouper. None of them is
//! repaired automatically: leader changes and shard moves belong to the
//! cluster's supervision, and a forced failover loses data.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::distribution::{DistributionViolation, ShardIssue};
use crate::repair::Remediation;
use serde_json::json;

impl Remediation for ShardIssue {}
impl Remediation for DistributionViolation {}

pub fn outcomes(ctx: &AnalysisContext<'_>) -> Result<Vec<CheckOutcome>> {
    let groups = &ctx.groups;
    let violated: Vec<_> = groups.violated_groups().into_iter().collect();
    Ok(vec![
        CheckOutcome::from_issues(Check::UnplannedLeader, &groups.unplanned_leader)?,
        CheckOutcome::from_issues(Check::NoInsyncFollower, &groups.no_insync_follower)?,
        CheckOutcome::from_issues(
            Check::NoInsyncAndDeadLeader,
            &groups.no_insync_and_dead_leader,
        )?,
        CheckOutcome::from_issues(
            Check::ViolatedDistributeShardsLike,
            &groups.violated_distribute_shards_like,
        )?
        .with_summary(json!({ "groups": violated })),
    ])
}
