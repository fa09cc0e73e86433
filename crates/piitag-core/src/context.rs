//! Per-run context threaded through every external-facing call.
//!
//! The context carries the opaque credential source, the retry policy, and
//! the cancellation token. It is built once per run by the caller; nothing in
//! piitag keeps credentials in globals.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::cancel::CancellationToken;
use crate::http::ApiError;
use crate::retry::RetryPolicy;

/// Supplies OAuth access tokens for Google Cloud APIs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Access token valid for `scopes`.
    async fn access_token(&self, scopes: &[&str]) -> Result<String, String>;
}

/// A fixed token, for emulators and tests.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self, _scopes: &[&str]) -> Result<String, String> {
        Ok(self.0.clone())
    }
}

/// Explicit run state passed to source, inspection, and catalog calls.
#[derive(Clone)]
pub struct RunContext {
    run_id: String,
    project: String,
    credentials: Arc<dyn TokenSource>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("project", &self.project)
            .field("credentials", &"<TokenSource>")
            .field("retry", &self.retry)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl RunContext {
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        credentials: Arc<dyn TokenSource>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            run_id: format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ")),
            project: project.into(),
            credentials,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the cancellation token (e.g. one wired to Ctrl-C).
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Project that owns inspection jobs and catalog resources.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[must_use]
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    #[must_use]
    pub const fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Bearer token for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Credentials`] if the token source fails.
    pub async fn bearer(&self, scope: &str) -> Result<String, ApiError> {
        self.credentials
            .access_token(&[scope])
            .await
            .map_err(ApiError::Credentials)
    }
}
