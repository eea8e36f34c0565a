// Accounting integration client (Xero-shaped account API)
//
// Same shape as the CRM client, plus two provider quirks: every API call
// is scoped by a tenant header, and the tenant id is not part of the token
// exchange - it is discovered from a separate connections endpoint after
// authentication and persisted into the credential.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{CredentialStore, LifecycleState, OAuthConfig, TokenLifecycle};
use crate::config::AccountingSettings;
use crate::error::{Result, SyncError};
use crate::executor::RequestExecutor;
use crate::mapper::account::{self, Account};

const ACCOUNTS_PATH: &str = "/Accounts";
const TENANT_HEADER: &str = "Xero-Tenant-Id";
const OAUTH_SCOPES: &str = "accounting.settings offline_access";

/// One authorized organisation, as returned by the connections endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
}

/// Sync client for the accounting provider's chart of accounts
pub struct AccountingClient {
    settings: AccountingSettings,
    executor: RequestExecutor,
}

impl AccountingClient {
    /// Build a client from settings and an explicit credential store.
    /// No persisted state is read here; call
    /// [`load_persisted`](Self::load_persisted) at startup.
    pub fn new(settings: AccountingSettings, store: CredentialStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(SyncError::Transport)?;

        let oauth = OAuthConfig {
            token_url: settings.token_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
        };
        let lifecycle = Arc::new(TokenLifecycle::new(oauth, store, client.clone()));
        let executor = RequestExecutor::new(
            client,
            lifecycle,
            settings.api_base.clone(),
            Some(TENANT_HEADER),
        );

        Ok(Self { settings, executor })
    }

    /// URL the user visits to start the authorization-code flow.
    /// Parameters are percent-encoded; a redirect URI carrying its own
    /// query string stays intact.
    pub fn authorize_url(&self) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            &self.settings.authorize_base,
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", OAUTH_SCOPES),
            ],
        )
        .map_err(|e| SyncError::Config(format!("invalid authorize URL: {}", e)))?;
        Ok(url.to_string())
    }

    /// Load the persisted credential, if any
    pub async fn load_persisted(&self) {
        self.executor.lifecycle().load_persisted().await;
    }

    /// Exchange the pasted authorization code, then resolve the tenant
    /// scoping id: an explicit configured tenant wins, otherwise the first
    /// connected organisation is used.
    pub async fn connect(&self, authorization_code: &str) -> Result<()> {
        self.executor
            .lifecycle()
            .authenticate(authorization_code)
            .await?;

        if let Some(tenant_id) = &self.settings.tenant_id {
            self.executor.lifecycle().set_tenant_id(tenant_id).await?;
            return Ok(());
        }

        let connections = self.connections().await?;
        let Some(first) = connections.first() else {
            return Err(SyncError::AuthenticationFailed(
                "authorized, but the provider returned no connected organisation".to_string(),
            ));
        };

        tracing::info!(
            tenant_id = %first.tenant_id,
            tenant_name = first.tenant_name.as_deref().unwrap_or("-"),
            "Discovered accounting tenant"
        );
        self.executor
            .lifecycle()
            .set_tenant_id(&first.tenant_id)
            .await
    }

    /// Discard the stored credential
    pub async fn disconnect(&self) -> Result<()> {
        self.executor.lifecycle().disconnect().await
    }

    pub fn is_configured(&self) -> bool {
        self.executor.lifecycle().is_configured()
    }

    pub async fn lifecycle_state(&self) -> LifecycleState {
        self.executor.lifecycle().state().await
    }

    /// Tenant id currently scoping API calls, if discovered
    pub async fn tenant_id(&self) -> Option<String> {
        self.executor.lifecycle().tenant_id().await
    }

    /// Organisations this credential is authorized against. Hosted outside
    /// the API base; never carries the tenant header, even after a tenant
    /// id has been discovered and persisted.
    pub async fn connections(&self) -> Result<Vec<Connection>> {
        let response = self
            .executor
            .call_url(Method::GET, &self.settings.connections_url, None)
            .await?;
        serde_json::from_value(response)
            .map_err(|e| SyncError::Payload(format!("malformed connections response: {}", e)))
    }

    /// Create a ledger account; returns the record echoed by the provider
    /// with its server-assigned identifier
    pub async fn create_account(&self, account: &Account) -> Result<Account> {
        let body = account::to_external(account);
        let response = self
            .executor
            .call(Method::PUT, ACCOUNTS_PATH, Some(&body))
            .await?;
        first_account(&response)
    }

    /// Read one account by identifier; a remote 404 is normalized to `None`
    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        let path = format!("{}/{}", ACCOUNTS_PATH, account_id);
        match self.executor.call(Method::GET, &path, None).await {
            Ok(response) => first_account(&response).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Update an existing account; a 404 here is an error, not an absence
    pub async fn update_account(&self, account_id: &str, account: &Account) -> Result<Account> {
        let body = account::to_external(account);
        let path = format!("{}/{}", ACCOUNTS_PATH, account_id);
        let response = self.executor.call(Method::POST, &path, Some(&body)).await?;
        first_account(&response)
    }
}

fn first_account(response: &Value) -> Result<Account> {
    account::from_collection(response)
        .into_iter()
        .next()
        .ok_or_else(|| SyncError::Payload("empty Accounts response".to_string()))
}
