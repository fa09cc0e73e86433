//! Shared HTTP plumbing for the Google Cloud REST clients.
//!
//! Centralizes status-code checks (429 with `Retry-After`, Google's
//! `{"error": {...}}` envelope, non-success → [`ApiError::Api`]) and the
//! transient/permanent split that [`crate::with_retry`] relies on.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::retry::RetryableError;

/// Errors from a single REST call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure (DNS, connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The API returned 429 Too Many Requests.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// A success response whose body did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// The credential collaborator could not supply a token.
    #[error("credential error: {0}")]
    Credentials(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl ApiError {
    /// HTTP status, when the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// 401 or 403.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.status() == Some(409)
    }

    /// 412, or a 409 whose message reports an aborted (etag) write.
    #[must_use]
    pub fn is_precondition_failed(&self) -> bool {
        match self {
            Self::Api { status: 412, .. } => true,
            Self::Api {
                status: 409,
                message,
            } => message.contains("ABORTED"),
            _ => false,
        }
    }
}

impl RetryableError for ApiError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => matches!(status, 408 | 500 | 502 | 503 | 504),
            Self::RateLimited { .. } | Self::Timeout { .. } => true,
            Self::Parse(_) | Self::Credentials(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }

    fn timed_out(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Check an HTTP response for common error conditions.
///
/// Returns the response unchanged on success. Handles:
/// - **429 Too Many Requests** → [`ApiError::RateLimited`] with
///   `Retry-After` header parsing (falls back to 60 s if absent or
///   unparseable).
/// - **Non-success status** → [`ApiError::Api`] carrying the Google error
///   message (`"STATUS: message"`) or the raw body.
///
/// # Errors
///
/// See above.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if resp.status() == 429 {
        let retry_after = parse_retry_after(&resp);
        return Err(ApiError::RateLimited {
            retry_after_secs: retry_after,
        });
    }
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Api {
            status,
            message: error_message(&body),
        });
    }
    Ok(resp)
}

/// [`check_response`], then decode the JSON body.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] if the body does not decode as `T`.
pub async fn json_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let resp = check_response(resp).await?;
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(e.to_string()))
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<GoogleErrorEnvelope>(body) {
        Ok(envelope) if envelope.error.status.is_empty() => envelope.error.message,
        Ok(envelope) => format!("{}: {}", envelope.error.status, envelope.error.message),
        Err(_) => body.trim().to_string(),
    }
}

/// Parse the `Retry-After` header as seconds, falling back to 60 s.
fn parse_retry_after(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_response(status: u16, body: &'static str) -> reqwest::Response {
        reqwest::Response::from(
            ::http::Response::builder()
                .status(status)
                .body(body)
                .unwrap(),
        )
    }

    fn mock_response_with_retry_after(status: u16, value: &str) -> reqwest::Response {
        reqwest::Response::from(
            ::http::Response::builder()
                .status(status)
                .header("Retry-After", value)
                .body("")
                .unwrap(),
        )
    }

    #[test]
    fn parse_retry_after_from_header() {
        let resp = mock_response_with_retry_after(429, "120");
        assert_eq!(parse_retry_after(&resp), 120);
    }

    #[test]
    fn parse_retry_after_non_numeric() {
        let resp = mock_response_with_retry_after(429, "soon");
        assert_eq!(parse_retry_after(&resp), 60);
    }

    #[tokio::test]
    async fn check_response_rate_limited_is_transient_with_hint() {
        let resp = mock_response_with_retry_after(429, "30");
        let err = check_response(resp).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::RateLimited {
                retry_after_secs: 30
            }
        ));
        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn check_response_extracts_google_error_message() {
        let resp = mock_response(
            404,
            r#"{"error":{"code":404,"message":"Not found: Table acme:sales.orders","status":"NOT_FOUND"}}"#,
        );
        let err = check_response(resp).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "API error (404): NOT_FOUND: Not found: Table acme:sales.orders"
        );
    }

    #[tokio::test]
    async fn check_response_server_errors_are_transient() {
        for status in [500, 502, 503, 504] {
            let err = check_response(mock_response(status, "oops")).await.unwrap_err();
            assert!(err.is_transient(), "{status}");
        }
        let err = check_response(mock_response(400, "bad")).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn aborted_conflict_counts_as_precondition_failure() {
        let resp = mock_response(
            409,
            r#"{"error":{"code":409,"message":"etag mismatch","status":"ABORTED"}}"#,
        );
        let err = check_response(resp).await.unwrap_err();
        assert!(err.is_precondition_failed());
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn json_body_reports_shape_mismatch() {
        #[derive(Debug, Deserialize)]
        struct Expected {
            #[allow(dead_code)]
            name: String,
        }
        let err = json_body::<Expected>(mock_response(200, "{}")).await.unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[tokio::test]
    async fn check_response_success() {
        assert!(check_response(mock_response(200, "{}")).await.is_ok());
    }
}
