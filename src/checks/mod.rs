//! Integrity checks.
//!
//! Each check is a pure function of the [`AnalysisContext`](crate::context::AnalysisContext)
//! returning typed issue records. [`CheckOutcome`] erases the record type so
//! the report can hold every family side by side.

pub mod analyzers;
pub mod coordinators;
pub mod databases;
pub mod failover;
pub mod groups;
pub mod indexes;
pub mod one_shard;
pub mod placement;
pub mod prototypes;
pub mod strategy;
pub mod structure;
pub mod sync;

use crate::context::AnalysisContext;
use crate::core::Result;
use crate::repair::{AgencyTransaction, Remediation};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Every issue family the analyzer can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Check {
    Zombies,
    BrokenCollections,
    ObsoleteCollections,
    NoPlanDatabases,
    DeadPrimaries,
    RealLeaderMissing,
    NoShardCollections,
    UnplannedLeader,
    NoInsyncFollower,
    NoInsyncAndDeadLeader,
    ViolatedDistributeShardsLike,
    ZombieCoordinators,
    ZombieAnalyzerRevisions,
    CurrentDeadPrimaries,
    SkeletonDatabases,
    MissingSystemCollections,
    OutOfSyncFollowers,
    BrokenEdgeIndexes,
    MissingShardingStrategy,
    UnplannedFailoverCandidates,
    CleanedServerResidue,
    OneShardMismatch,
}

impl Check {
    pub const ALL: [Check; 22] = [
        Check::Zombies,
        Check::BrokenCollections,
        Check::ObsoleteCollections,
        Check::NoPlanDatabases,
        Check::DeadPrimaries,
        Check::RealLeaderMissing,
        Check::NoShardCollections,
        Check::UnplannedLeader,
        Check::NoInsyncFollower,
        Check::NoInsyncAndDeadLeader,
        Check::ViolatedDistributeShardsLike,
        Check::ZombieCoordinators,
        Check::ZombieAnalyzerRevisions,
        Check::CurrentDeadPrimaries,
        Check::SkeletonDatabases,
        Check::MissingSystemCollections,
        Check::OutOfSyncFollowers,
        Check::BrokenEdgeIndexes,
        Check::MissingShardingStrategy,
        Check::UnplannedFailoverCandidates,
        Check::CleanedServerResidue,
        Check::OneShardMismatch,
    ];

    /// Family name used as key in the report.
    pub fn name(self) -> &'static str {
        match self {
            Check::Zombies => "zombies",
            Check::BrokenCollections => "brokenCollections",
            Check::ObsoleteCollections => "obsoleteCollections",
            Check::NoPlanDatabases => "noPlanDatabases",
            Check::DeadPrimaries => "deadPrimaries",
            Check::RealLeaderMissing => "realLeaderMissing",
            Check::NoShardCollections => "noShardCollections",
            Check::UnplannedLeader => "unplannedLeader",
            Check::NoInsyncFollower => "noInsyncFollower",
            Check::NoInsyncAndDeadLeader => "noInsyncAndDeadLeader",
            Check::ViolatedDistributeShardsLike => "violatedDistributeShardsLike",
            Check::ZombieCoordinators => "zombieCoordinators",
            Check::ZombieAnalyzerRevisions => "zombieAnalyzerRevisions",
            Check::CurrentDeadPrimaries => "currentDeadPrimaries",
            Check::SkeletonDatabases => "skeletonDatabases",
            Check::MissingSystemCollections => "missingSystemCollections",
            Check::OutOfSyncFollowers => "outOfSyncFollowers",
            Check::BrokenEdgeIndexes => "brokenEdgeIndexes",
            Check::MissingShardingStrategy => "missingShardingStrategy",
            Check::UnplannedFailoverCandidates => "unplannedFailoverCandidates",
            Check::CleanedServerResidue => "cleanedServerResidue",
            Check::OneShardMismatch => "oneShardMismatch",
        }
    }

    /// Stable remediation file name.
    pub fn file_name(self) -> &'static str {
        match self {
            Check::Zombies => "zombies.json",
            Check::BrokenCollections => "broken-collections.json",
            Check::ObsoleteCollections => "obsolete-collections.json",
            Check::NoPlanDatabases => "no-plan-databases.json",
            Check::DeadPrimaries => "dead-primaries.json",
            Check::RealLeaderMissing => "missing-prototypes.json",
            Check::NoShardCollections => "no-shard-collections.json",
            Check::UnplannedLeader => "unplanned-leaders.json",
            Check::NoInsyncFollower => "no-insync-followers.json",
            Check::NoInsyncAndDeadLeader => "no-insync-dead-leaders.json",
            Check::ViolatedDistributeShardsLike => "violated-distribution.json",
            Check::ZombieCoordinators => "zombie-coordinators.json",
            Check::ZombieAnalyzerRevisions => "zombie-analyzer-revisions.json",
            Check::CurrentDeadPrimaries => "current-dead-primaries.json",
            Check::SkeletonDatabases => "skeleton-databases.json",
            Check::MissingSystemCollections => "missing-collections.json",
            Check::OutOfSyncFollowers => "out-of-sync-followers.json",
            Check::BrokenEdgeIndexes => "broken-edge-indexes.json",
            Check::MissingShardingStrategy => "sharding-strategy.json",
            Check::UnplannedFailoverCandidates => "unplanned-failover-candidates.json",
            Check::CleanedServerResidue => "cleaned-server-residue.json",
            Check::OneShardMismatch => "one-shard-mismatch.json",
        }
    }

    /// Repair action that consumes the remediation file, if there is one.
    pub fn next_action(self) -> Option<&'static str> {
        match self {
            Check::Zombies => Some("remove-zombies"),
            Check::DeadPrimaries => Some("remove-dead-primaries"),
            Check::NoInsyncAndDeadLeader => Some("force-failover"),
            Check::ZombieCoordinators => Some("remove-zombie-coordinators"),
            Check::ZombieAnalyzerRevisions => Some("remove-zombie-analyzers"),
            Check::CurrentDeadPrimaries => Some("remove-current-dead-primaries"),
            Check::SkeletonDatabases => Some("remove-skeleton-databases"),
            Check::MissingSystemCollections => Some("create-missing-collections"),
            Check::BrokenEdgeIndexes => Some("fix-edge-indexes"),
            Check::MissingShardingStrategy => Some("set-sharding-strategy"),
            Check::UnplannedFailoverCandidates => Some("fix-failover-candidates"),
            Check::CleanedServerResidue => Some("strip-cleaned-servers"),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Check::Zombies => "collections without name and id",
            Check::BrokenCollections => "collections missing name or id",
            Check::ObsoleteCollections => "collection names planned under several ids",
            Check::NoPlanDatabases => "collections of databases missing from Plan",
            Check::DeadPrimaries => "planned shards on servers that are not alive",
            Check::RealLeaderMissing => "distributeShardsLike prototypes that do not exist",
            Check::NoShardCollections => "non-smart collections without shards",
            Check::UnplannedLeader => "shards led by another server than planned",
            Check::NoInsyncFollower => "replicated shards without an in-sync follower",
            Check::NoInsyncAndDeadLeader => "shards with a dead leader and no in-sync follower",
            Check::ViolatedDistributeShardsLike => "shard groups that are not colocated",
            Check::ZombieCoordinators => "coordinators in Current but not in Plan",
            Check::ZombieAnalyzerRevisions => "analyzer revisions of dropped databases",
            Check::CurrentDeadPrimaries => "dead primaries registered in Current databases",
            Check::SkeletonDatabases => "databases without collections",
            Check::MissingSystemCollections => "databases missing system collections",
            Check::OutOfSyncFollowers => "planned followers not in sync",
            Check::BrokenEdgeIndexes => "combined _from/_to edge indexes",
            Check::MissingShardingStrategy => "collections without sharding strategy",
            Check::UnplannedFailoverCandidates => "failover candidates outside the plan",
            Check::CleanedServerResidue => "cleaned or failed servers among failover candidates",
            Check::OneShardMismatch => "one-shard databases reported differently by servers",
        }
    }
}

/// Result of one check with its issues erased to JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub check: Check,
    pub issues: Vec<Value>,
    pub transactions: Vec<AgencyTransaction>,
    /// Aggregate view of the issues, when the family has one.
    pub summary: Option<Value>,
    /// Soft failures met while running the check.
    pub warnings: Vec<String>,
}

impl CheckOutcome {
    pub fn from_issues<'a, T, I>(check: Check, issues: I) -> Result<Self>
    where
        T: Serialize + Remediation + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut outcome = CheckOutcome {
            check,
            issues: Vec::new(),
            transactions: Vec::new(),
            summary: None,
            warnings: Vec::new(),
        };
        for issue in issues {
            outcome.issues.push(serde_json::to_value(issue)?);
            if let Some(trx) = issue.transaction() {
                outcome.transactions.push(trx);
            }
        }
        Ok(outcome)
    }

    pub fn with_summary(mut self, summary: Value) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn is_bad(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// Runs every check that only needs the snapshot, in [`Check::ALL`] order.
pub fn run_static(ctx: &AnalysisContext<'_>) -> Result<Vec<CheckOutcome>> {
    let mut outcomes = structure::outcomes(ctx)?;
    outcomes.push(placement::outcome(ctx)?);
    outcomes.extend(prototypes::outcomes(ctx)?);
    outcomes.extend(groups::outcomes(ctx)?);
    outcomes.push(coordinators::outcome(ctx)?);
    outcomes.push(analyzers::outcome(ctx)?);
    outcomes.extend(databases::outcomes(ctx)?);
    outcomes.push(sync::outcome(ctx)?);
    outcomes.push(indexes::outcome(ctx)?);
    outcomes.push(strategy::outcome(ctx)?);
    outcomes.extend(failover::outcomes(ctx)?);
    for outcome in &outcomes {
        debug!(check = outcome.check.name(), issues = outcome.issues.len(), "check done");
    }
    Ok(outcomes)
}
