//! Report assembler.
//!
//! Merges the outcomes of all checks into one verdict. The run is
//! `infected` as soon as any family has an issue; every non-empty family
//! then gets a remediation file and a suggested next action.

use crate::checks::{Check, CheckOutcome};
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::extract::ShardLedger;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Informational view of `Supervision` and `Target`; never affects the verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisionSummary {
    pub mode: Option<String>,
    pub maintenance: bool,
    pub jobs_to_do: usize,
    pub jobs_pending: usize,
    pub jobs_failed: usize,
    pub hot_backup: bool,
}

impl SupervisionSummary {
    pub fn of(ctx: &AnalysisContext<'_>) -> Self {
        let supervision = &ctx.snapshot.supervision;
        let target = &ctx.snapshot.target;
        Self {
            mode: supervision.state.as_ref().and_then(|s| s.mode.clone()),
            maintenance: supervision.in_maintenance(),
            jobs_to_do: target.to_do.len(),
            jobs_pending: target.pending.len(),
            jobs_failed: target.failed.len(),
            hot_backup: !matches!(target.hot_backup, None | Some(Value::Null)),
        }
    }
}

/// What to do with one non-empty family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub check: &'static str,
    pub file: &'static str,
    pub issues: usize,
    /// Repair action consuming the file; `None` means an operator has to decide.
    pub next_action: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub infected: bool,
    pub generated_at: DateTime<Utc>,
    pub outcomes: Vec<CheckOutcome>,
    pub supervision: SupervisionSummary,
    pub ledger: BTreeMap<String, ShardLedger>,
}

impl Report {
    pub fn assemble(ctx: &AnalysisContext<'_>, outcomes: Vec<CheckOutcome>) -> Self {
        let infected = outcomes.iter().any(CheckOutcome::is_bad);
        let report = Self {
            infected,
            generated_at: Utc::now(),
            outcomes,
            supervision: SupervisionSummary::of(ctx),
            ledger: ctx.databases.ledger.clone(),
        };
        info!(
            infected = report.infected,
            bad = report.bad_checks().count(),
            checks = report.outcomes.len(),
            "analysis finished"
        );
        report
    }

    pub fn outcome(&self, check: Check) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.check == check)
    }

    /// Issues of one family; empty when the check found nothing or did not run.
    pub fn issues(&self, check: Check) -> &[Value] {
        self.outcome(check).map(|o| o.issues.as_slice()).unwrap_or(&[])
    }

    pub fn bad_checks(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| o.is_bad())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &String> {
        self.outcomes.iter().flat_map(|o| o.warnings.iter())
    }

    /// One `name: good|bad` line per check that ran.
    pub fn status_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|o| {
                if o.is_bad() {
                    format!("{}: bad ({} issues)", o.check.name(), o.issues.len())
                } else {
                    format!("{}: good", o.check.name())
                }
            })
            .collect()
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.bad_checks()
            .map(|o| Suggestion {
                check: o.check.name(),
                file: o.check.file_name(),
                issues: o.issues.len(),
                next_action: o.check.next_action(),
            })
            .collect()
    }

    /// Writes one file per non-empty family into `dir` and returns the paths.
    /// A clean report writes nothing.
    pub fn write_remediation_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        if !self.infected {
            return Ok(written);
        }
        fs::create_dir_all(dir)?;
        for outcome in self.bad_checks() {
            let path = dir.join(outcome.check.file_name());
            let body = remediation_body(outcome)?;
            write_atomic(&path, &serde_json::to_vec_pretty(&body)?)?;
            debug!(file = %path.display(), issues = outcome.issues.len(), "remediation file written");
            written.push(path);
        }
        Ok(written)
    }

    pub fn to_json(&self) -> Result<Value> {
        let mut checks = Map::new();
        for outcome in &self.outcomes {
            let mut entry = Map::new();
            entry.insert("status".into(), json!(if outcome.is_bad() { "bad" } else { "good" }));
            entry.insert("description".into(), json!(outcome.check.description()));
            entry.insert("issues".into(), Value::Array(outcome.issues.clone()));
            if let Some(summary) = &outcome.summary {
                entry.insert("summary".into(), summary.clone());
            }
            if !outcome.warnings.is_empty() {
                entry.insert("warnings".into(), json!(outcome.warnings));
            }
            checks.insert(outcome.check.name().into(), Value::Object(entry));
        }

        Ok(json!({
            "infected": self.infected,
            "generatedAt": self.generated_at.to_rfc3339(),
            "checks": checks,
            "suggestions": serde_json::to_value(self.suggestions())?,
            "supervision": serde_json::to_value(&self.supervision)?,
            "ledger": serde_json::to_value(&self.ledger)?,
        }))
    }
}

fn remediation_body(outcome: &CheckOutcome) -> Result<Value> {
    let mut body = Map::new();
    body.insert("issues".into(), Value::Array(outcome.issues.clone()));
    body.insert(
        "transactions".into(),
        serde_json::to_value(&outcome.transactions)?,
    );
    if let Some(summary) = &outcome.summary {
        body.insert("summary".into(), summary.clone());
    }
    Ok(Value::Object(body))
}

/// Writes through a temp file next to `path` and renames it into place, so
/// readers never see a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let temp_file = File::create(&temp_path)?;
    let mut writer = BufWriter::new(temp_file);
    writer.write_all(bytes)?;
    writer.flush()?;
    writer.get_mut().sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
