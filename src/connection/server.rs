//! One swappable connection to the cluster's servers.
//!
//! The connector holds a single active target. `connect` repoints it, so a
//! caller must finish with one server before moving to the next; the
//! `&mut self` receivers enforce that.

use super::config::AgencyConfig;
use crate::core::{AnalyzerError, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

#[async_trait]
pub trait ServerConnector: Send {
    /// Points the connection at `endpoint`, dropping the previous target.
    async fn connect(&mut self, server_id: &str, endpoint: &str) -> Result<()>;

    /// Properties of `database` as the connected server reports them.
    async fn database_properties(&mut self, database: &str) -> Result<Value>;
}

pub struct HttpServerConnector {
    base: AgencyConfig,
    client: reqwest::Client,
    target: Option<(String, AgencyConfig)>,
}

impl HttpServerConnector {
    /// Credentials, timeout and TLS settings are taken from `base`.
    pub fn new(base: AgencyConfig) -> Result<Self> {
        let client = base.http_client()?;
        Ok(Self {
            base,
            client,
            target: None,
        })
    }
}

#[async_trait]
impl ServerConnector for HttpServerConnector {
    async fn connect(&mut self, server_id: &str, endpoint: &str) -> Result<()> {
        let config = self.base.with_endpoint(endpoint);
        let url = format!("{}/_api/version", config.endpoint);
        let response = config
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| AnalyzerError::Connection(format!("{}: {}", server_id, e)))?;
        if !response.status().is_success() {
            return Err(AnalyzerError::Connection(format!(
                "{}: status {}",
                server_id,
                response.status()
            )));
        }
        debug!(server = server_id, endpoint = %config.endpoint, "connected");
        self.target = Some((server_id.to_string(), config));
        Ok(())
    }

    async fn database_properties(&mut self, database: &str) -> Result<Value> {
        let Some((server_id, config)) = &self.target else {
            return Err(AnalyzerError::Connection("not connected".to_string()));
        };
        let url = format!("{}/_db/{}/_api/database/current", config.endpoint, database);
        let response = config
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| AnalyzerError::Connection(format!("{}: {}", server_id, e)))?;
        if !response.status().is_success() {
            return Err(AnalyzerError::Connection(format!(
                "{}: database '{}' answered {}",
                server_id,
                database,
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| AnalyzerError::Connection(format!("{}: {}", server_id, e)))?;
        Ok(body.get("result").cloned().unwrap_or(body))
    }
}
