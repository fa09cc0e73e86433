//! Application Default Credentials adapter for [`TokenSource`].

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use piitag_core::TokenSource;

/// Tokens from `gcp_auth`: a service account key, the metadata server, or
/// the local `gcloud` login, whichever is found first.
pub struct GcpTokenSource {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl GcpTokenSource {
    pub async fn discover() -> anyhow::Result<Self> {
        let provider = gcp_auth::provider()
            .await
            .context("no Google Cloud credentials found (set GOOGLE_APPLICATION_CREDENTIALS or run `gcloud auth application-default login`)")?;
        Ok(Self { provider })
    }

    /// Project of the discovered credentials, if they name one.
    pub async fn project_id(&self) -> Option<String> {
        self.provider.project_id().await.ok().map(|id| id.to_string())
    }
}

impl fmt::Debug for GcpTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GcpTokenSource")
    }
}

#[async_trait]
impl TokenSource for GcpTokenSource {
    async fn access_token(&self, scopes: &[&str]) -> Result<String, String> {
        self.provider
            .token(scopes)
            .await
            .map(|token| token.as_str().to_string())
            .map_err(|error| error.to_string())
    }
}
