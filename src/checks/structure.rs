//! Families found while extracting `Plan/Collections`.

use super::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::extract::{BrokenCollection, NoPlanDatabase, ObsoleteCollection, ZombieCollection};
use crate::repair::{AgencyTransaction, Remediation, plan_path};

impl Remediation for ZombieCollection {
    /// Deletes the placeholder, but only while it still has neither name nor id.
    fn transaction(&self) -> Option<AgencyTransaction> {
        let (db, cid) = (self.database.as_str(), self.cid.as_str());
        Some(
            AgencyTransaction::new()
                .delete(plan_path(&["Collections", db, cid]))
                .expect_empty(plan_path(&["Collections", db, cid, "name"]), true)
                .expect_empty(plan_path(&["Collections", db, cid, "id"]), true),
        )
    }
}

impl Remediation for BrokenCollection {}
impl Remediation for ObsoleteCollection {}
impl Remediation for NoPlanDatabase {}

pub fn outcomes(ctx: &AnalysisContext<'_>) -> Result<Vec<CheckOutcome>> {
    let index = &ctx.databases;
    Ok(vec![
        CheckOutcome::from_issues(Check::Zombies, &index.zombies)?,
        CheckOutcome::from_issues(Check::BrokenCollections, &index.broken)?,
        CheckOutcome::from_issues(Check::ObsoleteCollections, &index.obsolete)?,
        CheckOutcome::from_issues(Check::NoPlanDatabases, &index.no_plan_databases)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zombie_repair_is_guarded() {
        let zombie = ZombieCollection {
            database: "mydb".into(),
            cid: "100".into(),
        };
        let trx = zombie.transaction().unwrap();
        assert_eq!(
            trx.operations["/arango/Plan/Collections/mydb/100"],
            json!({"op": "delete"})
        );
        assert_eq!(
            trx.preconditions["/arango/Plan/Collections/mydb/100/id"],
            json!({"oldEmpty": true})
        );
    }
}
