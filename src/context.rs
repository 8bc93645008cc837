use crate::core::names::REQUIRED_SYSTEM_COLLECTIONS;
use crate::distribution::{ShardGroups, group_shards};
use crate::extract::{DatabaseIndex, extract_databases};
use crate::health::HealthIndex;
use crate::snapshot::Snapshot;
use std::path::PathBuf;

/// Server edition; decides which sharding strategy legacy collections get.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Edition {
    #[default]
    Community,
    Enterprise,
}

/// Options of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    pub edition: Edition,
    /// Directory remediation files are written to.
    pub output_dir: PathBuf,
    /// Run the live one-shard check. Only meaningful against a live cluster.
    pub check_one_shard: bool,
    /// Collections every database must contain, prototype first.
    pub system_collections: Vec<String>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            edition: Edition::Community,
            output_dir: PathBuf::from("."),
            check_one_shard: false,
            system_collections: REQUIRED_SYSTEM_COLLECTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AnalyzerOptions {
    pub fn edition(mut self, edition: Edition) -> Self {
        self.edition = edition;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn check_one_shard(mut self, enabled: bool) -> Self {
        self.check_one_shard = enabled;
        self
    }

    /// Adds a collection to the required set; duplicates are ignored.
    pub fn require_collection(mut self, name: &str) -> Self {
        if !self.system_collections.iter().any(|c| c == name) {
            self.system_collections.push(name.to_string());
        }
        self
    }
}

/// Everything derived from one snapshot, built once and shared read-only by
/// all detectors.
pub struct AnalysisContext<'a> {
    pub snapshot: &'a Snapshot,
    pub options: &'a AnalyzerOptions,
    pub health: HealthIndex,
    pub databases: DatabaseIndex,
    pub groups: ShardGroups,
}

impl<'a> AnalysisContext<'a> {
    pub fn build(snapshot: &'a Snapshot, options: &'a AnalyzerOptions) -> Self {
        let health = HealthIndex::compute(snapshot);
        let databases = extract_databases(snapshot);
        let groups = group_shards(snapshot, &databases, &health);
        Self {
            snapshot,
            options,
            health,
            databases,
            groups,
        }
    }
}
