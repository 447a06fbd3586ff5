//! SQL execution RPC over HTTPS.
//!
//! Request body is `{"sql_statement": "..."}`; the service answers
//! `{"success": bool, "error": "..."}`. Non-2xx responses and
//! `success: false` are both statement failures, with the service's error
//! message passed through verbatim. A reply without `success` fails when it
//! carries an `error`.

use super::SqlEndpoint;
use crate::remote::{blocking_client, status_error, transport_error, EndpointError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ExecRequest<'a> {
    sql_statement: &'a str,
}

#[derive(Deserialize)]
struct ExecResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

impl ExecResponse {
    fn into_result(self) -> Result<(), EndpointError> {
        let error = self.error.filter(|e| !e.trim().is_empty());
        match (self.success, error) {
            (Some(true), _) | (None, None) => Ok(()),
            (None, Some(error)) => Err(EndpointError::Remote(error)),
            (Some(false), error) => Err(EndpointError::Remote(
                error.unwrap_or_else(|| "statement failed without an error message".to_string()),
            )),
        }
    }
}

pub struct RemoteSqlEndpoint {
    client: Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RemoteSqlEndpoint {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, EndpointError> {
        Ok(Self {
            client: blocking_client(timeout)?,
            url: url.into(),
            api_key,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SqlEndpoint for RemoteSqlEndpoint {
    fn execute(&mut self, sql: &str) -> Result<(), EndpointError> {
        let mut request = self.client.post(&self.url).json(&ExecRequest { sql_statement: sql });
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request
            .send()
            .map_err(|e| transport_error(e, &self.url, self.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response, &self.url));
        }

        let body = response
            .text()
            .map_err(|e| transport_error(e, &self.url, self.timeout))?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(());
        }

        let parsed: ExecResponse = serde_json::from_str(&body).map_err(|e| EndpointError::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        parsed.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(ExecRequest {
            sql_statement: "SELECT 1",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "sql_statement": "SELECT 1" }));
    }

    fn parse(body: &str) -> Result<(), EndpointError> {
        serde_json::from_str::<ExecResponse>(body).unwrap().into_result()
    }

    #[test]
    fn test_response_parsing() {
        assert!(parse(r#"{"success": true}"#).is_ok());
        assert!(parse("{}").is_ok());
        assert!(parse(r#"{"error": null}"#).is_ok());

        let failed = parse(r#"{"success": false, "error": "relation \"x\" does not exist"}"#).unwrap_err();
        assert_eq!(failed.to_string(), "relation \"x\" does not exist");

        // No success flag, but an error: still a failure, message kept verbatim
        let implicit = parse(r#"{"error": "relation x does not exist"}"#).unwrap_err();
        assert!(implicit.is_remote());
        assert_eq!(implicit.to_string(), "relation x does not exist");

        let silent = parse(r#"{"success": false}"#).unwrap_err();
        assert!(silent.to_string().contains("without an error message"));
    }
}
