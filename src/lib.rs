// ============================================================================
// agencycheck Library
// ============================================================================

//! Consistency analyzer for ArangoDB cluster metadata.
//!
//! An agency snapshot is parsed once into a typed [`Snapshot`], indexed into
//! an [`AnalysisContext`] and run through independent checks. The resulting
//! [`Report`] carries the verdict, every issue found and the
//! compare-and-swap transactions that repair them.
//!
//! ```ignore
//! let snapshot = agencycheck::load_file(Path::new("agency.json"))?;
//! let report = agencycheck::analyze(&snapshot, &AnalyzerOptions::default())?;
//! if report.infected {
//!     report.write_remediation_files(Path::new("out"))?;
//! }
//! ```

pub mod checks;
pub mod connection;
pub mod context;
pub mod core;
pub mod distribution;
pub mod extract;
pub mod health;
pub mod repair;
pub mod report;
pub mod snapshot;

pub use checks::{Check, CheckOutcome};
pub use connection::{AgencyClient, AgencyConfig, HttpServerConnector, ServerConnector};
pub use context::{AnalysisContext, AnalyzerOptions, Edition};
pub use crate::core::{AnalyzerError, Result};
pub use report::Report;
pub use snapshot::{Snapshot, load_file, snapshot_from_str, snapshot_from_value};

use tracing::{info, warn};

/// Runs every check that works on a static snapshot.
///
/// `options.check_one_shard` is ignored here; the one-shard check needs a
/// live cluster, see [`analyze_live`].
pub fn analyze(snapshot: &Snapshot, options: &AnalyzerOptions) -> Result<Report> {
    let ctx = AnalysisContext::build(snapshot, options);
    if options.check_one_shard {
        warn!("one-shard check needs a live cluster, skipped");
    }
    let outcomes = checks::run_static(&ctx)?;
    Ok(Report::assemble(&ctx, outcomes))
}

/// Like [`analyze`], and additionally runs the one-shard check through
/// `connector` when `options.check_one_shard` is set.
pub async fn analyze_live<C>(
    snapshot: &Snapshot,
    options: &AnalyzerOptions,
    connector: &mut C,
) -> Result<Report>
where
    C: ServerConnector + ?Sized,
{
    let ctx = AnalysisContext::build(snapshot, options);
    let mut outcomes = checks::run_static(&ctx)?;
    if options.check_one_shard {
        info!(
            coordinators = ctx.health.alive_coordinators.len(),
            "checking one-shard databases"
        );
        outcomes.push(checks::one_shard::outcome(&ctx, connector).await?);
    }
    Ok(Report::assemble(&ctx, outcomes))
}
