//! Live snapshot fetch from the agency.

use super::config::AgencyConfig;
use crate::core::{AnalyzerError, Result};
use crate::snapshot::{Snapshot, snapshot_from_value};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, info};

const READ_PATH: &str = "/_api/agency/read";

pub struct AgencyClient {
    config: AgencyConfig,
    client: reqwest::Client,
}

impl AgencyClient {
    pub fn new(config: AgencyConfig) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &AgencyConfig {
        &self.config
    }

    /// Reads the whole store. Followers answer with a redirect to the
    /// leader, which the client follows.
    pub async fn read_raw(&self) -> Result<Value> {
        let url = format!("{}{}", self.config.endpoint, READ_PATH);
        debug!(endpoint = %self.config.to_url(), "reading agency");

        let request = self.client.post(&url).json(&json!([["/"]]));
        let response = self.config.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(&self.config.endpoint, status, body));
        }

        let value: Value = response.json().await?;
        info!(endpoint = %self.config.to_url(), "agency snapshot fetched");
        Ok(value)
    }

    pub async fn read_snapshot(&self) -> Result<Snapshot> {
        snapshot_from_value(self.read_raw().await?)
    }
}

/// A 503 mentioning the leader means the agency has none right now.
fn classify_failure(endpoint: &str, status: StatusCode, body: String) -> AnalyzerError {
    if status == StatusCode::SERVICE_UNAVAILABLE && body.to_lowercase().contains("leader") {
        return AnalyzerError::NotLeader(endpoint.to_string());
    }
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("errorMessage").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    AnalyzerError::Agency {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_leader_is_reported_as_such() {
        let err = classify_failure(
            "http://agent:8531",
            StatusCode::SERVICE_UNAVAILABLE,
            "No leader".to_string(),
        );
        assert!(matches!(err, AnalyzerError::NotLeader(_)));
    }

    #[test]
    fn error_message_is_extracted() {
        let err = classify_failure(
            "http://agent:8531",
            StatusCode::UNAUTHORIZED,
            r#"{"error":true,"errorMessage":"not authorized","code":401}"#.to_string(),
        );
        match err {
            AnalyzerError::Agency { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "not authorized");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
