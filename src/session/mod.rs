//! Server-side session lifecycle.
//!
//! A session is an opaque credential minted by the identity provider from an
//! identity token and carried in the `__session` cookie. Logout is idempotent:
//! it always clears the cookie, whatever the state of the credential.

mod provider;

pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::cookies::SetCookie;
use crate::errors::AppError;

/// Cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "__session";
/// Five days.
pub const SESSION_MAX_AGE_SECS: i64 = 432_000;

/// Issues, inspects and destroys sessions.
pub struct SessionService {
    identity: Arc<IdentityClient>,
    secure_cookies: bool,
}

impl SessionService {
    pub fn new(identity: Arc<IdentityClient>, secure_cookies: bool) -> Self {
        Self {
            identity,
            secure_cookies,
        }
    }

    fn session_cookie(&self, cookie: SetCookie) -> SetCookie {
        cookie
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site_lax()
    }

    /// Exchange an identity token for a session cookie.
    pub async fn create(&self, id_token: &str) -> Result<SetCookie, AppError> {
        if id_token.trim().is_empty() {
            return Err(AppError::Validation("idToken is required".to_string()));
        }

        let provider = self.identity.provider().await?;
        let valid_for = Duration::from_secs(SESSION_MAX_AGE_SECS as u64);
        let credential = provider
            .create_session_cookie(id_token, valid_for)
            .await
            .map_err(|e| {
                tracing::warn!("Session creation rejected: {}", e);
                AppError::from(e)
            })?;

        tracing::info!("Session created");
        Ok(self.session_cookie(
            SetCookie::new(SESSION_COOKIE, credential).max_age(SESSION_MAX_AGE_SECS),
        ))
    }

    /// Verify the current session and return its subject.
    pub async fn inspect(&self, session: Option<&str>) -> Result<SessionClaims, AppError> {
        let session = session.ok_or_else(|| AppError::Unauthorized("No session".to_string()))?;
        let provider = self.identity.provider().await?;
        Ok(provider.verify_session_cookie(session, true).await?)
    }

    /// End the session.
    ///
    /// Verification and revocation failures are logged only; the returned
    /// cookie always clears `__session`.
    pub async fn destroy(&self, session: Option<&str>) -> SetCookie {
        let cleared = self.session_cookie(SetCookie::expired(SESSION_COOKIE));

        let Some(session) = session else {
            tracing::debug!("Logout without a session cookie");
            return cleared;
        };

        let provider = match self.identity.provider().await {
            Ok(provider) => provider,
            Err(e) => {
                tracing::warn!("Logout could not reach identity provider: {}", e);
                return cleared;
            }
        };

        let claims = match provider.verify_session_cookie(session, true).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::info!("Logout with an unverifiable session: {}", e);
                return cleared;
            }
        };

        match provider.revoke_refresh_tokens(&claims.uid).await {
            Ok(()) => tracing::info!(uid = %claims.uid, "Revoked refresh tokens on logout"),
            Err(e) => tracing::warn!(uid = %claims.uid, "Failed to revoke refresh tokens: {}", e),
        }

        cleared
    }
}

/// Pull the identity token out of a create-session body.
///
/// Rejects a missing field, non-string values and blank strings.
pub fn extract_id_token(body: &Value) -> Result<&str, AppError> {
    match body.get("idToken") {
        Some(Value::String(token)) if !token.trim().is_empty() => Ok(token),
        Some(Value::String(_)) | None => {
            Err(AppError::Validation("idToken is required".to_string()))
        }
        Some(_) => Err(AppError::Validation("idToken must be a string".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider double that counts calls.
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        revoked: bool,
        fail_revoke: bool,
    }

    #[async_trait]
    impl IdentityProvider for CountingProvider {
        async fn create_session_cookie(
            &self,
            id_token: &str,
            _valid_for: Duration,
        ) -> Result<String, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if id_token == "expired" {
                return Err(IdentityError::InvalidToken("TOKEN_EXPIRED".into()));
            }
            Ok(format!("session-for-{}", id_token))
        }

        async fn verify_session_cookie(
            &self,
            _session_cookie: &str,
            _check_revoked: bool,
        ) -> Result<SessionClaims, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.revoked {
                return Err(IdentityError::Revoked("SESSION_COOKIE_REVOKED".into()));
            }
            Ok(SessionClaims {
                uid: "user-1".into(),
            })
        }

        async fn revoke_refresh_tokens(&self, _uid: &str) -> Result<(), IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_revoke {
                return Err(IdentityError::Unavailable("down".into()));
            }
            Ok(())
        }
    }

    fn service(provider: Arc<CountingProvider>, secure: bool) -> SessionService {
        let config = IdentityConfig {
            api_url: "http://unused".into(),
            project_id: None,
            api_token: None,
        };
        let identity = IdentityClient::with_provider(config, provider);
        SessionService::new(Arc::new(identity), secure)
    }

    #[tokio::test]
    async fn test_create_sets_session_cookie() {
        let provider = Arc::new(CountingProvider::default());
        let cookie = service(provider, true).create("tok").await.unwrap();
        assert_eq!(
            cookie.render(),
            "__session=session-for-tok; Path=/; Max-Age=432000; HttpOnly; Secure; SameSite=Lax"
        );
    }

    #[tokio::test]
    async fn test_create_blank_token_makes_no_call() {
        let provider = Arc::new(CountingProvider::default());
        let result = service(provider.clone(), false).create("   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_rejected_token_is_unauthorized() {
        let provider = Arc::new(CountingProvider::default());
        let result = service(provider, false).create("expired").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_destroy_without_cookie_clears() {
        let provider = Arc::new(CountingProvider::default());
        let cookie = service(provider.clone(), false).destroy(None).await;
        assert!(cookie.render().starts_with("__session=; Path=/; Max-Age=0"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_destroy_revoked_session_still_clears() {
        let provider = Arc::new(CountingProvider {
            revoked: true,
            ..Default::default()
        });
        let cookie = service(provider.clone(), false).destroy(Some("old")).await;
        assert!(cookie.render().contains("Max-Age=0"));
        // verify only, no revoke attempt
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_destroy_revoke_failure_is_swallowed() {
        let provider = Arc::new(CountingProvider {
            fail_revoke: true,
            ..Default::default()
        });
        let cookie = service(provider.clone(), false).destroy(Some("live")).await;
        assert!(cookie.render().contains("Max-Age=0"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_inspect_revoked_is_forbidden() {
        let provider = Arc::new(CountingProvider {
            revoked: true,
            ..Default::default()
        });
        let result = service(provider, false).inspect(Some("old")).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_extract_id_token() {
        assert_eq!(extract_id_token(&json!({"idToken": "abc"})).unwrap(), "abc");
        assert!(extract_id_token(&json!({})).is_err());
        assert!(extract_id_token(&json!({"idToken": ""})).is_err());
        assert!(extract_id_token(&json!({"idToken": 42})).is_err());
        assert!(extract_id_token(&json!({"idToken": null})).is_err());
        assert!(extract_id_token(&json!("abc")).is_err());
    }
}
