//! Identity provider integration.
//!
//! The provider exchanges short-lived identity tokens for session credentials,
//! verifies those credentials and revokes a user's outstanding tokens. The HTTP
//! implementation speaks an Identity-Toolkit style REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;

use crate::config::IdentityConfig;
use crate::errors::AppError;

/// Failures reported by an identity provider.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Token or session credential is invalid, expired or malformed
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Session credential was revoked
    #[error("session revoked: {0}")]
    Revoked(String),
    /// Provider is not configured or cannot be reached
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    /// Provider answered with something unexpected
    #[error("identity provider error: {0}")]
    Upstream(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken(msg) => AppError::Unauthorized(msg),
            IdentityError::Revoked(msg) => AppError::Forbidden(msg),
            IdentityError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            IdentityError::Upstream(msg) => AppError::Integration(msg),
        }
    }
}

/// Claims extracted from a verified session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub uid: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an identity token for a session credential valid for `valid_for`.
    async fn create_session_cookie(
        &self,
        id_token: &str,
        valid_for: Duration,
    ) -> Result<String, IdentityError>;

    /// Verify a session credential, optionally checking for revocation.
    async fn verify_session_cookie(
        &self,
        session_cookie: &str,
        check_revoked: bool,
    ) -> Result<SessionClaims, IdentityError>;

    /// Invalidate every outstanding token of `uid`.
    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), IdentityError>;
}

/// Explicitly constructed handle to the identity provider.
///
/// The provider is built on first use; concurrent first callers wait on the
/// same initialisation. A failed initialisation is retried on the next call.
pub struct IdentityClient {
    config: IdentityConfig,
    provider: OnceCell<Arc<dyn IdentityProvider>>,
}

impl IdentityClient {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            config,
            provider: OnceCell::new(),
        }
    }

    /// Client backed by an already built provider.
    pub fn with_provider(config: IdentityConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config,
            provider: OnceCell::new_with(Some(provider)),
        }
    }

    pub async fn provider(&self) -> Result<Arc<dyn IdentityProvider>, IdentityError> {
        let provider = self
            .provider
            .get_or_try_init(|| async {
                let provider = HttpIdentityProvider::from_config(&self.config)?;
                tracing::info!("Identity provider client initialised");
                Ok::<Arc<dyn IdentityProvider>, IdentityError>(Arc::new(provider))
            })
            .await?;
        Ok(provider.clone())
    }
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// REST implementation of [`IdentityProvider`].
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionCookieResponse {
    session_cookie: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifySessionCookieResponse {
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

impl HttpIdentityProvider {
    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let project_id = config.project_id.clone().ok_or_else(|| {
            IdentityError::Unavailable("IDENTITY_PROJECT_ID is not configured".to_string())
        })?;
        let api_token = config.api_token.clone().ok_or_else(|| {
            IdentityError::Unavailable("IDENTITY_API_TOKEN is not configured".to_string())
        })?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Unavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            project_id,
            api_token,
        })
    }

    fn url(&self, action: &str) -> String {
        format!("{}/v1/projects/{}{}", self.base_url, self.project_id, action)
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        body: serde_json::Value,
    ) -> Result<T, IdentityError> {
        let response = self
            .client
            .post(self.url(action))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| IdentityError::Upstream(format!("unexpected response: {}", e)));
        }

        let message = response
            .json::<GoogleErrorBody>()
            .await
            .map(|b| b.error.message)
            .unwrap_or_default();
        Err(classify_failure(status, message))
    }
}

/// Map a provider failure onto the error kinds callers act on.
fn classify_failure(status: StatusCode, message: String) -> IdentityError {
    let upper = message.to_ascii_uppercase();
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };

    if upper.contains("REVOKED") {
        IdentityError::Revoked(message)
    } else if status.is_server_error()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        IdentityError::Unavailable(message)
    } else if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND {
        IdentityError::InvalidToken(message)
    } else {
        IdentityError::Upstream(message)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn create_session_cookie(
        &self,
        id_token: &str,
        valid_for: Duration,
    ) -> Result<String, IdentityError> {
        let response: CreateSessionCookieResponse = self
            .post(
                ":createSessionCookie",
                json!({
                    "idToken": id_token,
                    "validDuration": valid_for.as_secs().to_string(),
                }),
            )
            .await?;
        Ok(response.session_cookie)
    }

    async fn verify_session_cookie(
        &self,
        session_cookie: &str,
        check_revoked: bool,
    ) -> Result<SessionClaims, IdentityError> {
        let response: VerifySessionCookieResponse = self
            .post(
                ":verifySessionCookie",
                json!({
                    "sessionCookie": session_cookie,
                    "checkRevoked": check_revoked,
                }),
            )
            .await?;
        Ok(SessionClaims {
            uid: response.local_id,
        })
    }

    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), IdentityError> {
        let _: serde_json::Value = self
            .post(
                "/accounts:update",
                json!({
                    "localId": uid,
                    "validSince": chrono::Utc::now().timestamp().to_string(),
                }),
            )
            .await?;
        Ok(())
    }
}
