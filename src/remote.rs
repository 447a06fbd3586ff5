//! Shared blocking HTTP plumbing for remote services.
//!
//! Every call has a fixed deadline. Transport failures are turned into
//! [`EndpointError`]s that name the likely cause, so users can tell a dead
//! service from a firewall or DNS problem without reading a stack trace.

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Deadline for general remote calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for migration calls, which do more work per request.
pub const MIGRATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("request to {url} timed out after {}s; the service may be down or overloaded", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    #[error("could not connect to {url}: {message}. Check that the service is running, that no firewall blocks it, and that the host name resolves")]
    Connect { url: String, message: String },

    #[error("HTTP {status} from {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// The service answered and reported a failure.
    #[error("{0}")]
    Remote(String),

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl EndpointError {
    /// Whether the service itself produced the error (as opposed to the
    /// network between us and it).
    pub fn is_remote(&self) -> bool {
        matches!(self, EndpointError::Remote(_) | EndpointError::Status { .. })
    }
}

pub fn blocking_client(timeout: Duration) -> Result<Client, EndpointError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pcrm-import/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| EndpointError::Client(e.to_string()))
}

pub fn transport_error(err: reqwest::Error, url: &str, timeout: Duration) -> EndpointError {
    if err.is_timeout() {
        EndpointError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else if err.is_connect() {
        EndpointError::Connect {
            url: url.to_string(),
            message: root_cause(&err),
        }
    } else if err.is_decode() {
        EndpointError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else {
        EndpointError::Client(root_cause(&err))
    }
}

fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut cause = err;
    while let Some(next) = cause.source() {
        cause = next;
    }
    cause.to_string()
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

/// Turn a non-2xx response into [`EndpointError::Status`], preferring the
/// structured `message`/`error` field of a JSON body over the raw text.
pub fn status_error(response: Response, url: &str) -> EndpointError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed
            .message
            .or(parsed.error)
            .or(parsed.details)
            .unwrap_or(body),
        Err(_) if body.trim().is_empty() => "no response body".to_string(),
        Err(_) => body,
    };
    EndpointError::Status {
        url: url.to_string(),
        status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_classification() {
        assert!(EndpointError::Remote("relation exists".into()).is_remote());
        assert!(!EndpointError::Timeout {
            url: "http://x".into(),
            timeout: DEFAULT_TIMEOUT
        }
        .is_remote());
    }

    #[test]
    fn test_messages_name_likely_cause() {
        let err = EndpointError::Connect {
            url: "http://localhost:1".into(),
            message: "connection refused".into(),
        };
        let text = err.to_string();
        assert!(text.contains("firewall"));
        assert!(text.contains("connection refused"));

        let err = EndpointError::Timeout {
            url: "http://x".into(),
            timeout: MIGRATION_TIMEOUT,
        };
        assert!(err.to_string().contains("60s"));
    }

    #[test]
    fn test_unreachable_host_maps_to_connect() {
        let client = blocking_client(Duration::from_secs(2)).unwrap();
        let url = "http://127.0.0.1:9/";
        let err = client.get(url).send().unwrap_err();
        let mapped = transport_error(err, url, Duration::from_secs(2));
        assert!(matches!(
            mapped,
            EndpointError::Connect { .. } | EndpointError::Timeout { .. }
        ));
    }
}
