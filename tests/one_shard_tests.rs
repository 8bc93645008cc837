/// Live one-shard check against an in-memory connector.
///
/// Run with: cargo test --test one_shard_tests

use agencycheck::{
    AnalyzerError, AnalyzerOptions, Check, Result, ServerConnector, analyze, analyze_live,
    snapshot_from_value,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;

/// Fake cluster: endpoint -> answer of `/_api/database/current`.
struct FakeCluster {
    servers: HashMap<String, Value>,
    active: Option<String>,
    connects: usize,
}

#[async_trait]
impl ServerConnector for FakeCluster {
    async fn connect(&mut self, _server_id: &str, endpoint: &str) -> Result<()> {
        self.connects += 1;
        if !self.servers.contains_key(endpoint) {
            self.active = None;
            return Err(AnalyzerError::Connection(format!("{} unreachable", endpoint)));
        }
        self.active = Some(endpoint.to_string());
        Ok(())
    }

    async fn database_properties(&mut self, _database: &str) -> Result<Value> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| AnalyzerError::Connection("not connected".into()))?;
        Ok(self.servers[active].clone())
    }
}

fn snapshot() -> agencycheck::Snapshot {
    snapshot_from_value(json!({"arango": {
        "Plan": {"Databases": {"single": {"sharding": "single"}}},
        "Supervision": {"Health": {
            "CRDN-1": {"Status": "GOOD", "Endpoint": "tcp://c1:8529"},
            "CRDN-2": {"Status": "GOOD", "Endpoint": "tcp://c2:8529"},
            "CRDN-3": {"Status": "FAILED", "Endpoint": "tcp://c3:8529"}
        }}
    }}))
    .unwrap()
}

#[tokio::test]
async fn test_disagreeing_coordinator_is_reported() {
    let mut cluster = FakeCluster {
        servers: HashMap::from([
            ("tcp://c1:8529".to_string(), json!({"name": "single", "sharding": "single"})),
            ("tcp://c2:8529".to_string(), json!({"name": "single"})),
        ]),
        active: None,
        connects: 0,
    };
    let options = AnalyzerOptions::default().check_one_shard(true);
    let report = analyze_live(&snapshot(), &options, &mut cluster).await.unwrap();

    assert_eq!(cluster.connects, 2);
    assert!(report.infected);
    assert_eq!(
        report.issues(Check::OneShardMismatch),
        &[json!({"database": "single", "server": "CRDN-2", "planned": "single", "reported": null})]
    );
}

#[tokio::test]
async fn test_unreachable_coordinator_is_a_warning() {
    let mut cluster = FakeCluster {
        servers: HashMap::from([(
            "tcp://c1:8529".to_string(),
            json!({"sharding": "single"}),
        )]),
        active: None,
        connects: 0,
    };
    let options = AnalyzerOptions::default().check_one_shard(true);
    let report = analyze_live(&snapshot(), &options, &mut cluster).await.unwrap();

    assert!(report.issues(Check::OneShardMismatch).is_empty());
    let warnings: Vec<&String> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("CRDN-2"));
}

#[tokio::test]
async fn test_db_server_disagreement_is_reported() {
    let snapshot = snapshot_from_value(json!({"arango": {
        "Plan": {"Databases": {"single": {"sharding": "single"}}},
        "Supervision": {"Health": {
            "PRMR-a": {"Status": "GOOD", "Endpoint": "tcp://a:8530"},
            "CRDN-x": {"Status": "GOOD", "Endpoint": "tcp://x:8529"}
        }}
    }}))
    .unwrap();
    let mut cluster = FakeCluster {
        servers: HashMap::from([
            ("tcp://a:8530".to_string(), json!({"sharding": ""})),
            ("tcp://x:8529".to_string(), json!({"sharding": "single"})),
        ]),
        active: None,
        connects: 0,
    };
    let options = AnalyzerOptions::default().check_one_shard(true);
    let report = analyze_live(&snapshot, &options, &mut cluster).await.unwrap();

    assert_eq!(cluster.connects, 2);
    assert_eq!(
        report.issues(Check::OneShardMismatch),
        &[json!({"database": "single", "server": "PRMR-a", "planned": "single", "reported": ""})]
    );
}

#[test]
fn test_static_analysis_skips_live_check() {
    let options = AnalyzerOptions::default().check_one_shard(true);
    let report = analyze(&snapshot(), &options).unwrap();
    assert!(report.outcome(Check::OneShardMismatch).is_none());
}
