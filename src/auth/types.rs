// Credential and token-endpoint wire types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted OAuth credential for one integration
///
/// `tenant_id` carries the provider scoping identifier: the accounting
/// provider's tenant id (discovered after authentication) or the CRM
/// provider's portal id when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub tenant_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// True while the access token's recorded expiry is strictly in the future
    pub fn is_fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// OAuth token endpoint response (authorization-code and refresh grants)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// Token lifecycle state machine
///
/// `Authenticating` and `Refreshing` are transient; they are only
/// observable by a concurrent `state()` call during an in-flight exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unconfigured,
    Authenticating,
    Active,
    Refreshing,
    ExpiredUnrecoverable,
}
