//! Failover candidate lists in `Current` that name servers the plan does not
//! hold the shard on, or servers supervision has already cleaned out.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::repair::{AgencyTransaction, Remediation, current_path, plan_path};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rewrite {
    Unplanned,
    Residue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRewrite {
    pub database: String,
    pub cid: String,
    pub collection: String,
    pub shard: String,
    /// Servers stripped from the list.
    pub offending: Vec<String>,
    pub planned: Vec<String>,
    pub candidates: Vec<String>,
    pub fixed: Vec<String>,
    #[serde(skip)]
    guard_plan: bool,
}

impl Remediation for CandidateRewrite {
    /// Rewrites the candidate list. Unplanned candidates are judged against
    /// the plan, so that list is guarded as well.
    fn transaction(&self) -> Option<AgencyTransaction> {
        let (db, cid, shard) = (self.database.as_str(), self.cid.as_str(), self.shard.as_str());
        let key = current_path(&["Collections", db, cid, shard, "failoverCandidates"]);
        let mut trx = AgencyTransaction::new()
            .set(key.clone(), json!(self.fixed))
            .expect_old(key, json!(self.candidates));
        if self.guard_plan {
            trx = trx.expect_old(
                plan_path(&["Collections", db, cid, "shards", shard]),
                json!(self.planned),
            );
        }
        Some(trx)
    }
}

fn scan(ctx: &AnalysisContext<'_>, kind: Rewrite) -> Vec<CandidateRewrite> {
    let target = &ctx.snapshot.target;
    let gone: BTreeSet<&String> = target
        .cleaned_servers
        .iter()
        .chain(target.failed_servers.iter())
        .collect();

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
                let Some(candidates) = current_col
                    .get(&shard.name)
                    .and_then(|s| s.failover_candidates.as_ref())
                else {
                    continue;
                };
                let offends = |server: &String| match kind {
                    Rewrite::Unplanned => !shard.servers.contains(server),
                    Rewrite::Residue => gone.contains(server),
                };
                let offending: Vec<String> =
                    candidates.iter().filter(|s| offends(*s)).cloned().collect();
                if offending.is_empty() {
                    continue;
                }
                found.push(CandidateRewrite {
                    database: database.clone(),
                    cid: collection.cid.clone(),
                    collection: collection.name.clone(),
                    shard: shard.name.clone(),
                    fixed: candidates.iter().filter(|s| !offends(*s)).cloned().collect(),
                    offending,
                    planned: shard.servers.clone(),
                    candidates: candidates.clone(),
                    guard_plan: kind == Rewrite::Unplanned,
                });
            }
        }
    }
    found
}

pub fn unplanned_candidates(ctx: &AnalysisContext<'_>) -> Vec<CandidateRewrite> {
    scan(ctx, Rewrite::Unplanned)
}

/// Candidates listed in `Target/CleanedServers` or `Target/FailedServers`.
pub fn cleaned_residue(ctx: &AnalysisContext<'_>) -> Vec<CandidateRewrite> {
    scan(ctx, Rewrite::Residue)
}

pub fn outcomes(ctx: &AnalysisContext<'_>) -> Result<Vec<CheckOutcome>> {
    Ok(vec![
        CheckOutcome::from_issues(Check::UnplannedFailoverCandidates, &unplanned_candidates(ctx))?,
        CheckOutcome::from_issues(Check::CleanedServerResidue, &cleaned_residue(ctx))?,
    ])
}
