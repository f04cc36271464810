//! Google Cloud access tokens for the Dialogflow and Text-to-Speech clients.
//!
//! Tokens come from a [`TokenSource`] asked once per request. The Google
//! source wraps `gcp_auth`, which resolves Application Default Credentials
//! (`GOOGLE_APPLICATION_CREDENTIALS`, the metadata server, or the gcloud CLI)
//! and refreshes tokens before they expire. A fixed token is still accepted
//! for local runs, but it is never refreshed.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::GoogleAuthConfig;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[async_trait]
pub trait TokenSource: Send + Sync + std::fmt::Debug {
    async fn access_token(&self) -> Result<String, AuthError>;
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Google credentials unavailable: {0}")]
    Credentials(#[from] gcp_auth::Error),

    #[error("Missing access token")]
    MissingAccessToken,
}

/// A token supplied through configuration. Expires with whatever issued it.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = token.into();
        if token.is_empty() {
            return Err(AuthError::MissingAccessToken);
        }
        Ok(Self(token))
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

/// Refreshing tokens from a service account or the ambient Google credentials.
pub struct GoogleTokenSource {
    provider: Arc<dyn gcp_auth::TokenProvider>,
    origin: String,
}

impl GoogleTokenSource {
    /// Application Default Credentials.
    pub async fn discover() -> Result<Self, AuthError> {
        let provider = gcp_auth::provider().await?;
        Ok(Self {
            provider,
            origin: "application default credentials".to_string(),
        })
    }

    /// A service-account JSON key on disk.
    pub fn from_key_file(path: &str) -> Result<Self, AuthError> {
        let account = gcp_auth::CustomServiceAccount::from_file(path)?;
        Ok(Self {
            provider: Arc::new(account),
            origin: path.to_string(),
        })
    }
}

impl std::fmt::Debug for GoogleTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTokenSource")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for GoogleTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        let token = self.provider.token(&[CLOUD_PLATFORM_SCOPE]).await?;
        Ok(token.as_str().to_string())
    }
}

/// Pick the token source for a Google client.
///
/// A non-empty `fixed_token` wins; otherwise the key file from `config`, and
/// failing that the ambient credentials.
pub async fn token_source(
    fixed_token: &str,
    config: &GoogleAuthConfig,
) -> Result<Arc<dyn TokenSource>, AuthError> {
    if !fixed_token.is_empty() {
        tracing::warn!("Using a fixed Google access token; it will not be refreshed");
        return Ok(Arc::new(StaticToken::new(fixed_token)?));
    }

    let source = match config.credentials_file.as_deref() {
        Some(path) if !path.is_empty() => GoogleTokenSource::from_key_file(path)?,
        _ => GoogleTokenSource::discover().await?,
    };
    tracing::info!(origin = %source.origin, "Google credentials loaded");
    Ok(Arc::new(source))
}
