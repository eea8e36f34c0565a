// Request executor - authenticated calls against a provider REST API
//
// Obtains a valid access token (refreshing through the lifecycle manager
// when needed), attaches the bearer header plus any provider-specific
// scoping header, and maps the outcome into the SyncError taxonomy.
// Deliberately no automatic retry: a single network failure surfaces to
// the caller as-is.

use std::sync::Arc;

use reqwest::{Client, Method};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::TokenLifecycle;
use crate::error::{Result, SyncError};

/// Executes authenticated JSON requests for one integration
pub struct RequestExecutor {
    client: Client,
    lifecycle: Arc<TokenLifecycle>,
    api_base: String,

    /// Header name carrying the tenant/organisation identifier, for
    /// providers that scope every API call (the accounting provider's
    /// tenant header). Attached only once a tenant id has been discovered.
    tenant_header: Option<&'static str>,
}

impl RequestExecutor {
    pub fn new(
        client: Client,
        lifecycle: Arc<TokenLifecycle>,
        api_base: String,
        tenant_header: Option<&'static str>,
    ) -> Self {
        Self {
            client,
            lifecycle,
            api_base,
            tenant_header,
        }
    }

    /// Shared lifecycle manager backing this executor
    pub fn lifecycle(&self) -> &Arc<TokenLifecycle> {
        &self.lifecycle
    }

    /// Perform an authenticated call against `path` under the API base URL.
    /// Carries the tenant header once a tenant id has been discovered.
    pub async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.api_base, path);
        self.dispatch(method, &url, body, true).await
    }

    /// Perform an authenticated call against an absolute URL hosted outside
    /// the API base (tenant discovery). Tenant scoping does not apply to
    /// these endpoints, so the tenant header is never attached.
    pub async fn call_url(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        self.dispatch(method, url, body, false).await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        tenant_scoped: bool,
    ) -> Result<Value> {
        let token = self.lifecycle.ensure_valid().await?;
        let correlation_id = Uuid::new_v4();

        tracing::debug!(
            method = %method,
            url = %url,
            correlation_id = %correlation_id,
            "Dispatching provider request"
        );

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&token)
            .header("Accept", "application/json");

        if tenant_scoped {
            if let Some(header) = self.tenant_header {
                if let Some(tenant_id) = self.lifecycle.tenant_id().await {
                    request = request.header(header, tenant_id);
                }
            }
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(
                correlation_id = %correlation_id,
                error = %e,
                "Provider request failed at transport level"
            );
            SyncError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                correlation_id = %correlation_id,
                status = status.as_u16(),
                "Provider returned error response"
            );
            return Err(SyncError::RemoteRequestFailed {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(SyncError::Transport)?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            SyncError::Payload(format!("response is not valid JSON: {}", e))
        })
    }
}
