// CRM integration client (HubSpot-shaped contact API)
//
// Composes the credential store, token lifecycle and request executor into
// the contact-facing domain operations. Contacts are keyed by email on the
// provider side via the `idProperty=email` read path.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::{json, Value};

use crate::auth::{CredentialStore, LifecycleState, OAuthConfig, TokenLifecycle};
use crate::config::CrmSettings;
use crate::error::{Result, SyncError};
use crate::executor::RequestExecutor;
use crate::mapper::contact::{self, Contact, PROPERTY_NAMES};

const CONTACTS_PATH: &str = "/crm/v3/objects/contacts";
const OAUTH_SCOPES: &str = "crm.objects.contacts.read crm.objects.contacts.write";

/// Sync client for the CRM provider's contact collection
pub struct CrmClient {
    settings: CrmSettings,
    executor: RequestExecutor,
}

impl CrmClient {
    /// Build a client from settings and an explicit credential store.
    /// No persisted state is read here; call
    /// [`load_persisted`](Self::load_persisted) at startup.
    pub fn new(settings: CrmSettings, store: CredentialStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(SyncError::Transport)?;

        let oauth = OAuthConfig {
            token_url: format!("{}/oauth/v1/token", settings.api_base),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
        };
        let lifecycle = Arc::new(TokenLifecycle::new(oauth, store, client.clone()));
        let executor = RequestExecutor::new(client, lifecycle, settings.api_base.clone(), None);

        Ok(Self { settings, executor })
    }

    /// URL the user visits to start the authorization-code flow.
    /// Parameters are percent-encoded; a redirect URI carrying its own
    /// query string stays intact.
    pub fn authorize_url(&self) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            &self.settings.authorize_base,
            &[
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

    /// Exchange the pasted authorization code for a credential
    pub async fn connect(&self, authorization_code: &str) -> Result<()> {
        self.executor
            .lifecycle()
            .authenticate(authorization_code)
            .await?;
        Ok(())
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

    /// Read one contact by email. A remote 404 is normalized to `None`;
    /// every other failure propagates.
    pub async fn get_contact(&self, email: &str) -> Result<Option<Contact>> {
        Ok(self.fetch_record(email).await?.map(|(_, contact)| contact))
    }

    /// Upsert one contact, returning the provider-assigned identifier.
    ///
    /// Not idempotent at the wire level: the remote API offers no
    /// idempotency key, so a retry after an ambiguous failure can create a
    /// duplicate. Callers own that risk.
    pub async fn sync_contact(&self, contact: &Contact) -> Result<String> {
        let body = json!({ "properties": contact::to_properties(contact) });

        match self.fetch_record(&contact.email).await? {
            Some((id, _)) => {
                tracing::debug!(%id, "Updating existing contact");
                self.executor
                    .call(
                        Method::PATCH,
                        &format!("{}/{}", CONTACTS_PATH, id),
                        Some(&body),
                    )
                    .await?;
                Ok(id)
            }
            None => {
                tracing::debug!(email = %contact.email, "Creating contact");
                let response = self
                    .executor
                    .call(Method::POST, CONTACTS_PATH, Some(&body))
                    .await?;
                record_id(&response)
            }
        }
    }

    /// Full-text search over the contact collection
    pub async fn search_contacts(&self, query: &str) -> Result<Vec<Contact>> {
        let body = json!({
            "query": query,
            "properties": PROPERTY_NAMES,
            "limit": 50,
        });
        let response = self
            .executor
            .call(Method::POST, &format!("{}/search", CONTACTS_PATH), Some(&body))
            .await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(results
            .iter()
            .map(|record| {
                contact::from_properties(record.get("properties").unwrap_or(&Value::Null))
            })
            .collect())
    }

    /// Read path shared by `get_contact` and `sync_contact`: the record id
    /// is needed to decide create vs update
    async fn fetch_record(&self, email: &str) -> Result<Option<(String, Contact)>> {
        let path = format!(
            "{}/{}?idProperty=email&properties={}",
            CONTACTS_PATH,
            email,
            PROPERTY_NAMES.join(","),
        );

        match self.executor.call(Method::GET, &path, None).await {
            Ok(record) => {
                let id = record_id(&record)?;
                let contact =
                    contact::from_properties(record.get("properties").unwrap_or(&Value::Null));
                Ok(Some((id, contact)))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn record_id(record: &Value) -> Result<String> {
    record
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SyncError::Payload("contact record missing id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use chrono::{Duration, Utc};
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> CrmClient {
        let settings = CrmSettings {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            redirect_uri: "http://localhost:3000/oauth/hubspot/callback".to_string(),
            authorize_base: format!("{}/oauth/authorize", server.url()),
            api_base: server.url(),
        };
        let store = CredentialStore::open_in_memory("hubspot").unwrap();
        store
            .save(&Credential {
                access_token: "access-1".to_string(),
                refresh_token: "refresh-1".to_string(),
                tenant_id: None,
                expires_at: Utc::now() + Duration::minutes(30),
            })
            .unwrap();
        CrmClient::new(settings, store).unwrap()
    }

    #[tokio::test]
    async fn test_get_contact_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/crm/v3/objects/contacts/a@b.com")
            .match_query(Matcher::Any)
            .match_header("Authorization", "Bearer access-1")
            .with_status(200)
            .with_body(
                r#"{"id":"301","properties":{"email":"a@b.com","preferred_spirits":"Gin;Rum"}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        client.load_persisted().await;

        let contact = client.get_contact("a@b.com").await.unwrap().unwrap();
        assert_eq!(contact.email, "a@b.com");
        assert_eq!(contact.preferred_spirits, vec!["Gin", "Rum"]);
    }

    #[tokio::test]
    async fn test_get_contact_404_is_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/crm/v3/objects/contacts/ghost@b.com")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"not found"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        client.load_persisted().await;

        assert!(client.get_contact("ghost@b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_contact_forbidden_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/crm/v3/objects/contacts/a@b.com")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let client = client_for(&server);
        client.load_persisted().await;

        let err = client.get_contact("a@b.com").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::RemoteRequestFailed { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn test_sync_contact_updates_existing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/crm/v3/objects/contacts/a@b.com")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id":"301","properties":{"email":"a@b.com"}}"#)
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/crm/v3/objects/contacts/301")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "properties": {"email": "a@b.com", "loyalty_points": "50"}
            })))
            .with_status(200)
            .with_body(r#"{"id":"301"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        client.load_persisted().await;

        let contact = Contact {
            email: "a@b.com".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
            company: None,
            preferred_spirits: vec![],
            newsletter_opt_in: false,
            loyalty_points: 50,
        };
        let id = client.sync_contact(&contact).await.unwrap();

        patch.assert_async().await;
        assert_eq!(id, "301");
    }

    #[tokio::test]
    async fn test_sync_contact_update_404_is_error() {
        // The lookup-404 path means "create"; a 404 on the update itself
        // is a real failure and must surface
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/crm/v3/objects/contacts/a@b.com")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id":"301","properties":{"email":"a@b.com"}}"#)
            .create_async()
            .await;
        server
            .mock("PATCH", "/crm/v3/objects/contacts/301")
            .with_status(404)
            .with_body(r#"{"message":"contact was deleted"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        client.load_persisted().await;

        let contact = Contact {
            email: "a@b.com".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
            company: None,
            preferred_spirits: vec![],
            newsletter_opt_in: false,
            loyalty_points: 0,
        };
        let err = client.sync_contact(&contact).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::RemoteRequestFailed { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn test_sync_contact_creates_when_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/crm/v3/objects/contacts/new@b.com")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/crm/v3/objects/contacts")
            .with_status(201)
            .with_body(r#"{"id":"999"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        client.load_persisted().await;

        let contact = Contact {
            email: "new@b.com".to_string(),
            first_name: Some("New".to_string()),
            last_name: None,
            phone: None,
            company: None,
            preferred_spirits: vec!["Rum".to_string()],
            newsletter_opt_in: true,
            loyalty_points: 0,
        };
        let id = client.sync_contact(&contact).await.unwrap();

        post.assert_async().await;
        assert_eq!(id, "999");
    }

    #[tokio::test]
    async fn test_search_contacts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/crm/v3/objects/contacts/search")
            .match_body(Matcher::PartialJson(serde_json::json!({"query": "copperworks"})))
            .with_status(200)
            .with_body(
                r#"{"results":[
                    {"id":"1","properties":{"email":"a@b.com"}},
                    {"id":"2","properties":{"email":"c@d.com","preferred_spirits":"Gin"}}
                ]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        client.load_persisted().await;

        let contacts = client.search_contacts("copperworks").await.unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[1].preferred_spirits, vec!["Gin"]);
    }

    fn authorize_client(redirect_uri: &str) -> CrmClient {
        let settings = CrmSettings {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            redirect_uri: redirect_uri.to_string(),
            authorize_base: "https://crm.example/oauth/authorize".to_string(),
            api_base: "https://api.crm.example".to_string(),
        };
        let store = CredentialStore::open_in_memory("hubspot").unwrap();
        CrmClient::new(settings, store).unwrap()
    }

    #[test]
    fn test_authorize_url_contains_client_and_redirect() {
        let url = authorize_client("http://localhost:3000/cb")
            .authorize_url()
            .unwrap();
        assert!(url.starts_with("https://crm.example/oauth/authorize?"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcb"));
        assert!(url.contains("scope=crm.objects.contacts.read+crm.objects.contacts.write"));
    }

    #[test]
    fn test_authorize_url_encodes_redirect_with_query_string() {
        let url = authorize_client("http://localhost:3000/cb?env=dev")
            .authorize_url()
            .unwrap();
        // The redirect URI's own query must not leak into the authorize
        // URL's parameter list
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcb%3Fenv%3Ddev"));
        assert!(!url.contains("env=dev&"));
    }

    #[test]
    fn test_authorize_url_rejects_malformed_base() {
        let settings = CrmSettings {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            redirect_uri: "http://localhost:3000/cb".to_string(),
            authorize_base: "not a url".to_string(),
            api_base: "https://api.crm.example".to_string(),
        };
        let store = CredentialStore::open_in_memory("hubspot").unwrap();
        let client = CrmClient::new(settings, store).unwrap();

        let err = client.authorize_url().unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
