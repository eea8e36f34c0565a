// Token lifecycle management
//
// State machine: Unconfigured -> Authenticating -> Active -> Refreshing
//                -> Active | ExpiredUnrecoverable
//
// Refresh is synchronous and call-site-triggered: tokens that are never
// used are never refreshed, and there is no background timer to race an
// in-flight request. The cost is refresh latency on the first call after
// expiry. Concurrent `ensure_valid()` calls during a refresh can race and
// issue two refresh requests; this is accepted for a single-caller client.

use chrono::{Duration, Utc};
use reqwest::Client;
use tokio::sync::RwLock;

use super::store::CredentialStore;
use super::types::{Credential, LifecycleState, TokenResponse};
use crate::error::{Result, SyncError};

/// Fallback token lifetime when the provider omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: u64 = 1800;

/// Safety margin subtracted from the provider-reported lifetime
const EXPIRY_BUFFER_SECS: i64 = 60;

/// OAuth application settings for one provider's token endpoint
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Outcome of a raw token-endpoint exchange, before policy is applied
enum ExchangeFailure {
    Transport(reqwest::Error),
    Rejected { status: u16, body: String },
    Malformed(String),
}

/// Manages one integration's credential: authorization-code exchange,
/// expiry checking and on-demand refresh, with persistence through
/// a [`CredentialStore`].
pub struct TokenLifecycle {
    oauth: OAuthConfig,
    store: CredentialStore,
    client: Client,
    credential: RwLock<Option<Credential>>,
    state: RwLock<LifecycleState>,
}

impl TokenLifecycle {
    /// Create a lifecycle manager. Persistence is explicit: nothing is read
    /// from the store until [`load_persisted`](Self::load_persisted).
    pub fn new(oauth: OAuthConfig, store: CredentialStore, client: Client) -> Self {
        Self {
            oauth,
            store,
            client,
            credential: RwLock::new(None),
            state: RwLock::new(LifecycleState::Unconfigured),
        }
    }

    /// Load the persisted credential into memory. Called once at startup.
    ///
    /// An expired-but-present credential still transitions to `Active`;
    /// the next `ensure_valid()` drives the refresh.
    pub async fn load_persisted(&self) {
        match self.store.load() {
            Some(cred) => {
                tracing::info!(
                    fresh = cred.is_fresh(),
                    "Loaded persisted credential"
                );
                *self.credential.write().await = Some(cred);
                *self.state.write().await = LifecycleState::Active;
            }
            None => {
                *self.credential.write().await = None;
                *self.state.write().await = LifecycleState::Unconfigured;
            }
        }
    }

    /// Current lifecycle state
    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// Snapshot of the in-memory credential
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    /// Delegates to [`CredentialStore::is_configured`]; same narrow semantics
    pub fn is_configured(&self) -> bool {
        self.store.is_configured()
    }

    /// Exchange a one-time authorization code for a credential.
    ///
    /// On success the credential is persisted and the state becomes
    /// `Active`. On a provider rejection the state remains `Unconfigured`
    /// and the caller must restart the auth flow.
    pub async fn authenticate(&self, authorization_code: &str) -> Result<Credential> {
        *self.state.write().await = LifecycleState::Authenticating;

        let form = [
            ("grant_type", "authorization_code"),
            ("code", authorization_code),
            ("redirect_uri", self.oauth.redirect_uri.as_str()),
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
        ];

        let response = match self.exchange(&form).await {
            Ok(response) => response,
            Err(failure) => {
                *self.state.write().await = LifecycleState::Unconfigured;
                return Err(match failure {
                    ExchangeFailure::Transport(e) => SyncError::Transport(e),
                    ExchangeFailure::Rejected { status, body } => {
                        SyncError::AuthenticationFailed(format!("{}: {}", status, body))
                    }
                    ExchangeFailure::Malformed(msg) => SyncError::AuthenticationFailed(msg),
                });
            }
        };

        let refresh_token = match response.refresh_token {
            Some(token) => token,
            None => {
                *self.state.write().await = LifecycleState::Unconfigured;
                return Err(SyncError::AuthenticationFailed(
                    "token response missing refresh_token".to_string(),
                ));
            }
        };

        let credential = Credential {
            access_token: response.access_token,
            refresh_token,
            tenant_id: None,
            expires_at: expires_at_from(response.expires_in),
        };

        self.store.save(&credential)?;
        *self.credential.write().await = Some(credential.clone());
        *self.state.write().await = LifecycleState::Active;

        tracing::info!(
            expires_at = %credential.expires_at.to_rfc3339(),
            "Authenticated, credential persisted"
        );
        Ok(credential)
    }

    /// Return a valid access token, refreshing at most once.
    ///
    /// Cheap common path: when the cached credential's expiry is in the
    /// future the token is returned with no network call. Otherwise exactly
    /// one refresh exchange is attempted. A rejected refresh transitions to
    /// `ExpiredUnrecoverable` and is not retried here; the caller must
    /// drive a fresh `authenticate`.
    pub async fn ensure_valid(&self) -> Result<String> {
        let cached = self.credential.read().await.clone();
        let Some(current) = cached else {
            return Err(SyncError::NotConfigured);
        };

        if current.is_fresh() {
            return Ok(current.access_token);
        }

        tracing::debug!("Access token expired, refreshing");
        *self.state.write().await = LifecycleState::Refreshing;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.as_str()),
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
        ];

        let response = match self.exchange(&form).await {
            Ok(response) => response,
            Err(ExchangeFailure::Transport(e)) => {
                // No verdict from the provider; the credential may still be
                // good, so this is not an auth failure.
                *self.state.write().await = LifecycleState::Active;
                return Err(SyncError::Transport(e));
            }
            Err(ExchangeFailure::Rejected { status, body }) => {
                tracing::warn!(status, "Refresh token rejected");
                *self.state.write().await = LifecycleState::ExpiredUnrecoverable;
                return Err(SyncError::ReauthenticationRequired(format!(
                    "{}: {}",
                    status, body
                )));
            }
            Err(ExchangeFailure::Malformed(msg)) => {
                *self.state.write().await = LifecycleState::ExpiredUnrecoverable;
                return Err(SyncError::ReauthenticationRequired(msg));
            }
        };

        // Providers may rotate the refresh token or keep it unchanged
        let credential = Credential {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or(current.refresh_token),
            tenant_id: current.tenant_id,
            expires_at: expires_at_from(response.expires_in),
        };

        self.store.save(&credential)?;
        let token = credential.access_token.clone();
        *self.credential.write().await = Some(credential);
        *self.state.write().await = LifecycleState::Active;

        tracing::info!("Access token refreshed");
        Ok(token)
    }

    /// Persist the provider scoping identifier into the credential
    /// (tenant discovery runs after the auth exchange)
    pub async fn set_tenant_id(&self, tenant_id: &str) -> Result<()> {
        let mut guard = self.credential.write().await;
        let Some(credential) = guard.as_mut() else {
            return Err(SyncError::NotConfigured);
        };
        credential.tenant_id = Some(tenant_id.to_string());
        self.store.save(credential)?;
        Ok(())
    }

    /// Current tenant/portal identifier, if discovered
    pub async fn tenant_id(&self) -> Option<String> {
        self.credential.read().await.as_ref()?.tenant_id.clone()
    }

    /// Discard the credential entirely; state returns to `Unconfigured`
    pub async fn disconnect(&self) -> Result<()> {
        self.store.delete()?;
        *self.credential.write().await = None;
        *self.state.write().await = LifecycleState::Unconfigured;
        tracing::info!("Credential discarded");
        Ok(())
    }

    /// Raw token-endpoint POST shared by both grant types
    async fn exchange(
        &self,
        form: &[(&str, &str)],
    ) -> std::result::Result<TokenResponse, ExchangeFailure> {
        let response = self
            .client
            .post(&self.oauth.token_url)
            .form(form)
            .send()
            .await
            .map_err(ExchangeFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeFailure::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ExchangeFailure::Malformed(format!("malformed token response: {}", e)))
    }
}

fn expires_at_from(expires_in: Option<u64>) -> chrono::DateTime<Utc> {
    let expires_in = expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    Utc::now() + Duration::seconds(expires_in as i64 - EXPIRY_BUFFER_SECS)
}
