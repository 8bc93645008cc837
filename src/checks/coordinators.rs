//! Coordinators still registered in `Current` after leaving the plan.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::repair::{AgencyTransaction, Remediation, current_path};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZombieCoordinator {
    pub server: String,
    /// Registration record in `Current/Coordinators`.
    pub registration: Value,
}

impl Remediation for ZombieCoordinator {
    fn transaction(&self) -> Option<AgencyTransaction> {
        let key = current_path(&["Coordinators", self.server.as_str()]);
        Some(
            AgencyTransaction::new()
                .delete(key.clone())
                .expect_old(key, self.registration.clone()),
        )
    }
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Vec<ZombieCoordinator> {
    let planned = &ctx.snapshot.plan.coordinators;
    ctx.snapshot
        .current
        .coordinators
        .iter()
        .filter(|(id, _)| !planned.contains_key(*id))
        .map(|(id, registration)| ZombieCoordinator {
            server: id.clone(),
            registration: registration.clone(),
        })
        .collect()
}

pub fn outcome(ctx: &AnalysisContext<'_>) -> Result<CheckOutcome> {
    CheckOutcome::from_issues(Check::ZombieCoordinators, &detect(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AnalyzerOptions;
    use crate::snapshot::snapshot_from_value;
    use serde_json::json;

    #[test]
    fn unplanned_coordinator_is_deleted_from_current() {
        let snapshot = snapshot_from_value(json!({"arango": {
            "Plan": {"Coordinators": {"CRDN-a": ""}},
            "Current": {"Coordinators": {"CRDN-a": "x", "CRDN-gone": "y"}}
        }}))
        .unwrap();
        let options = AnalyzerOptions::default();
        let ctx = AnalysisContext::build(&snapshot, &options);

        let found = detect(&ctx);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].server, "CRDN-gone");

        let trx = found[0].transaction().unwrap();
        assert_eq!(
            trx.operations["/arango/Current/Coordinators/CRDN-gone"],
            json!({"op": "delete"})
        );
        assert_eq!(
            trx.preconditions["/arango/Current/Coordinators/CRDN-gone"],
            json!({"old": "y"})
        );
    }
}
