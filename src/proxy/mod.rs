//! Client for the legacy-migration proxy service.
//!
//! Three JSON endpoints, each taking the legacy database connection string:
//! `test-connection`, `migrate` and `sync`. Responses share the envelope
//! `{"success": bool, "error": "...", ...payload}`.

use crate::config::MigrationConfig;
use crate::remote::{blocking_client, status_error, transport_error, EndpointError, DEFAULT_TIMEOUT};
use reqwest::blocking::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    connection_string: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<&'a str>,
}

/// Successful service response. `payload` holds whatever else the service
/// returned (counts, table names, timings).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

pub struct MigrationClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl MigrationClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EndpointError> {
        Ok(Self {
            client: blocking_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &MigrationConfig) -> Result<Self, EndpointError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| EndpointError::Client("no migration service URL configured (migration.url)".to_string()))?;
        Self::new(url, Duration::from_secs(config.timeout_secs))
    }

    /// Connection check; uses the shorter general deadline.
    pub fn test_connection(&self, connection_string: &str) -> Result<ProxyResponse, EndpointError> {
        self.call("test-connection", connection_string, None, self.timeout.min(DEFAULT_TIMEOUT))
    }

    pub fn migrate(&self, connection_string: &str) -> Result<ProxyResponse, EndpointError> {
        self.call("migrate", connection_string, None, self.timeout)
    }

    /// Incremental sync of rows changed after `since`.
    pub fn sync(&self, connection_string: &str, since: Option<&str>) -> Result<ProxyResponse, EndpointError> {
        self.call("sync", connection_string, since, self.timeout)
    }

    fn call(
        &self,
        action: &str,
        connection_string: &str,
        since: Option<&str>,
        timeout: Duration,
    ) -> Result<ProxyResponse, EndpointError> {
        let url = format!("{}/{}", self.base_url, action);
        info!(action, "calling migration service");

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&ProxyRequest {
                connection_string,
                since,
            })
            .send()
            .map_err(|e| transport_error(e, &url, timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response, &url));
        }

        let body: ProxyResponse = response.json().map_err(|e| transport_error(e, &url, timeout))?;
        check_envelope(body)
    }
}

fn check_envelope(body: ProxyResponse) -> Result<ProxyResponse, EndpointError> {
    if body.success {
        Ok(body)
    } else {
        Err(EndpointError::Remote(
            body.error.unwrap_or_else(|| "migration service reported failure".to_string()),
        ))
    }
}
