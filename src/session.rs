//! Auth session owning the bearer token lifecycle

use crate::{
    api::MeterApi,
    constants::TOKEN_EXPIRY_MARGIN_SECS,
    error::ApiError,
    types::{AuthToken, Credentials},
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owns the account credentials and the current bearer token.
///
/// `token()` never hands out a token past its margin-adjusted expiry: the
/// held token is treated as expired [`TOKEN_EXPIRY_MARGIN_SECS`] before the
/// server-declared time to absorb clock skew. The token/expiry pair is
/// replaced atomically under one lock, so no reader observes a half-updated
/// state.
pub struct AuthSession {
    api: Arc<dyn MeterApi>,
    credentials: RwLock<Credentials>,
    state: RwLock<Option<AuthToken>>,
}

impl AuthSession {
    /// Creates a session; no exchange happens until the first `token()` call
    pub fn new(api: Arc<dyn MeterApi>, credentials: Credentials) -> Self {
        Self {
            api,
            credentials: RwLock::new(credentials),
            state: RwLock::new(None),
        }
    }

    /// Returns a valid token, performing at most one credential exchange.
    ///
    /// Within the validity window repeated calls reuse the held token.
    pub async fn token(&self) -> Result<String, ApiError> {
        {
            let state = self.state.read().await;
            if let Some(held) = state.as_ref() {
                if !Self::expired(held) {
                    return Ok(held.token.clone());
                }
            }
        }

        let mut state = self.state.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(held) = state.as_ref() {
            if !Self::expired(held) {
                return Ok(held.token.clone());
            }
        }

        let credentials = self.credentials.read().await.clone();
        let fresh = self.api.authenticate(&credentials).await?;
        tracing::debug!(
            api = self.api.api_name(),
            expires_at = %fresh.expires_at,
            "exchanged credentials for a new token"
        );
        let token = fresh.token.clone();
        *state = Some(fresh);
        Ok(token)
    }

    /// Drops the held token so the next `token()` call re-authenticates.
    ///
    /// Used by the coordinator when the upstream rejects a token mid-request.
    pub async fn invalidate(&self) {
        *self.state.write().await = None;
    }

    /// Replaces the credentials and drops the held token
    pub async fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write().await = credentials;
        *self.state.write().await = None;
    }

    fn expired(state: &AuthToken) -> bool {
        Utc::now() + chrono::Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) >= state.expires_at
    }
}
