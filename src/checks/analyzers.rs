//! Analyzer revisions left behind by dropped databases.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::repair::{AgencyTransaction, Remediation, plan_path};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZombieAnalyzerRevision {
    pub database: String,
    pub revision: Value,
}

impl Remediation for ZombieAnalyzerRevision {
    fn transaction(&self) -> Option<AgencyTransaction> {
        let key = plan_path(&["Analyzers", self.database.as_str()]);
        Some(
            AgencyTransaction::new()
                .delete(key.clone())
                .expect_old(key, self.revision.clone()),
        )
    }
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Vec<ZombieAnalyzerRevision> {
    let plan = &ctx.snapshot.plan;
    plan.analyzers
        .iter()
        .filter(|(db, _)| !plan.databases.contains_key(*db))
        .map(|(db, revision)| ZombieAnalyzerRevision {
            database: db.clone(),
            revision: revision.clone(),
        })
        .collect()
}

pub fn outcome(ctx: &AnalysisContext<'_>) -> Result<CheckOutcome> {
    CheckOutcome::from_issues(Check::ZombieAnalyzerRevisions, &detect(ctx))
}
