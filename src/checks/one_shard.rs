//! One-shard databases whose live properties disagree with the plan.
//!
//! Needs a live cluster: every alive server, primaries first and then
//! coordinators, is asked one after the other through the single connection
//! handle. A server that cannot be
//! reached is a warning, not a failure of the run.

use super::{Check, CheckOutcome};
use crate::connection::ServerConnector;
use crate::context::AnalysisContext;
use crate::core::Result;
use crate::repair::Remediation;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

const SINGLE: &str = "single";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OneShardMismatch {
    pub database: String,
    pub server: String,
    pub planned: String,
    /// `None` when the server does not report a sharding mode at all.
    pub reported: Option<String>,
}

/// Reported only; the database has to be recreated by an operator.
impl Remediation for OneShardMismatch {}

#[derive(Debug, Default)]
pub struct OneShardFindings {
    pub mismatches: Vec<OneShardMismatch>,
    pub warnings: Vec<String>,
}

impl OneShardFindings {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

pub async fn detect<C>(ctx: &AnalysisContext<'_>, connector: &mut C) -> OneShardFindings
where
    C: ServerConnector + ?Sized,
{
    let mut findings = OneShardFindings::default();
    let databases: Vec<&String> = ctx
        .snapshot
        .plan
        .databases
        .iter()
        .filter(|(_, db)| db.is_one_shard())
        .map(|(name, _)| name)
        .collect();
    if databases.is_empty() {
        debug!("no one-shard databases planned");
        return findings;
    }

    for (server, health) in ctx.health.alive_servers() {
        let Some(endpoint) = health.endpoint.as_deref() else {
            findings.warn(format!("{} has no endpoint, skipped", server));
            continue;
        };
        if let Err(e) = connector.connect(server, endpoint).await {
            findings.warn(format!("cannot connect to {}: {}", server, e));
            continue;
        }
        for database in &databases {
            let properties = match connector.database_properties(database).await {
                Ok(properties) => properties,
                Err(e) => {
                    findings.warn(format!(
                        "cannot read properties of '{}' on {}: {}",
                        database, server, e
                    ));
                    continue;
                }
            };
            let reported = properties
                .get("sharding")
                .and_then(Value::as_str)
                .map(str::to_string);
            if reported.as_deref() != Some(SINGLE) {
                findings.mismatches.push(OneShardMismatch {
                    database: database.to_string(),
                    server: server.clone(),
                    planned: SINGLE.to_string(),
                    reported,
                });
            }
        }
    }
    findings
}

pub async fn outcome<C>(ctx: &AnalysisContext<'_>, connector: &mut C) -> Result<CheckOutcome>
where
    C: ServerConnector + ?Sized,
{
    let findings = detect(ctx, connector).await;
    let mut outcome = CheckOutcome::from_issues(Check::OneShardMismatch, &findings.mismatches)?;
    outcome.warnings = findings.warnings;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AnalyzerOptions;
    use crate::core::AnalyzerError;
    use crate::snapshot::snapshot_from_value;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;

    /// Answers from a fixed table and records the order of calls.
    struct ScriptedConnector {
        answers: BTreeMap<String, Value>,
        unreachable: Vec<String>,
        connected: Option<String>,
        log: Vec<String>,
    }

    #[async_trait]
    impl ServerConnector for ScriptedConnector {
        async fn connect(&mut self, server_id: &str, _endpoint: &str) -> Result<()> {
            self.log.push(format!("connect {}", server_id));
            if self.unreachable.iter().any(|s| s == server_id) {
                self.connected = None;
                return Err(AnalyzerError::Connection("refused".into()));
            }
            self.connected = Some(server_id.to_string());
            Ok(())
        }

        async fn database_properties(&mut self, database: &str) -> Result<Value> {
            let server = self
                .connected
                .clone()
                .ok_or_else(|| AnalyzerError::Connection("not connected".into()))?;
            self.log.push(format!("read {} on {}", database, server));
            Ok(self.answers[&server].clone())
        }
    }

    #[tokio::test]
    async fn servers_are_visited_in_turn() {
        let snapshot = snapshot_from_value(json!({"arango": {
            "Plan": {"Databases": {"one": {"sharding": "single"}, "flex": {"sharding": "flexible"}}},
            "Supervision": {"Health": {
                "CRDN-a": {"Status": "GOOD", "Endpoint": "tcp://a:8529"},
                "CRDN-b": {"Status": "GOOD", "Endpoint": "tcp://b:8529"},
                "CRDN-c": {"Status": "GOOD", "Endpoint": "tcp://c:8529"}
            }}
        }}))
        .unwrap();
        let options = AnalyzerOptions::default().check_one_shard(true);
        let ctx = AnalysisContext::build(&snapshot, &options);

        let mut connector = ScriptedConnector {
            answers: BTreeMap::from([
                ("CRDN-a".to_string(), json!({"sharding": "single"})),
                ("CRDN-c".to_string(), json!({"sharding": ""})),
            ]),
            unreachable: vec!["CRDN-b".to_string()],
            connected: None,
            log: Vec::new(),
        };

        let outcome = outcome(&ctx, &mut connector).await.unwrap();
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0]["server"], json!("CRDN-c"));
        assert_eq!(outcome.issues[0]["reported"], json!(""));
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(
            connector.log,
            vec![
                "connect CRDN-a",
                "read one on CRDN-a",
                "connect CRDN-b",
                "connect CRDN-c",
                "read one on CRDN-c"
            ]
        );
    }

    #[tokio::test]
    async fn primaries_are_asked_before_coordinators() {
        let snapshot = snapshot_from_value(json!({"arango": {
            "Plan": {"Databases": {"one": {"sharding": "single"}}},
            "Supervision": {"Health": {
                "PRMR-a": {"Status": "GOOD", "Endpoint": "tcp://a:8530"},
                "PRMR-b": {"Status": "FAILED", "Endpoint": "tcp://b:8530"},
                "CRDN-x": {"Status": "GOOD", "Endpoint": "tcp://x:8529"}
            }}
        }}))
        .unwrap();
        let options = AnalyzerOptions::default().check_one_shard(true);
        let ctx = AnalysisContext::build(&snapshot, &options);

        let mut connector = ScriptedConnector {
            answers: BTreeMap::from([
                ("PRMR-a".to_string(), json!({"sharding": "flexible"})),
                ("CRDN-x".to_string(), json!({"sharding": "single"})),
            ]),
            unreachable: Vec::new(),
            connected: None,
            log: Vec::new(),
        };

        let outcome = outcome(&ctx, &mut connector).await.unwrap();
        assert_eq!(
            outcome.issues,
            vec![json!({"database": "one", "server": "PRMR-a", "planned": "single", "reported": "flexible"})]
        );
        assert!(outcome.warnings.is_empty());
        assert_eq!(
            connector.log,
            vec!["connect PRMR-a", "read one on PRMR-a", "connect CRDN-x", "read one on CRDN-x"]
        );
    }
}
