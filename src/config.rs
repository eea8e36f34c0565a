use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Stillsync - distillery CRM and accounting sync clients
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the credential database
    #[arg(
        short = 'd',
        long,
        env = "STILLSYNC_DB_FILE",
        default_value = "~/.stillsync/credentials.sqlite3"
    )]
    pub db_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the authorization-code flow for a provider
    Connect { provider: Provider },
    /// Discard a provider's stored credential
    Disconnect { provider: Provider },
    /// Show connection state for both providers
    Status,
    /// Read one CRM contact by email
    GetContact { email: String },
    /// Upsert a CRM contact from a JSON file
    SyncContact { file: PathBuf },
    /// Full-text search over CRM contacts
    SearchContacts { query: String },
    /// Read one ledger account by identifier
    GetAccount { id: String },
    /// Create a ledger account from a JSON file
    CreateAccount { file: PathBuf },
    /// Update a ledger account from a JSON file
    UpdateAccount { id: String, file: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Hubspot,
    Xero,
}

/// Settings for the CRM provider (HubSpot-shaped)
#[derive(Clone, Debug)]
pub struct CrmSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_base: String,
    pub api_base: String,
}

/// Settings for the accounting provider (Xero-shaped)
#[derive(Clone, Debug)]
pub struct AccountingSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_base: String,
    pub token_url: String,
    pub api_base: String,
    pub connections_url: String,
    /// Explicit tenant override; when absent the tenant is discovered
    /// from the connections endpoint after authentication
    pub tenant_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub db_file: PathBuf,
    pub log_level: String,
    hubspot: Option<CrmSettings>,
    xero: Option<AccountingSettings>,
}

impl Config {
    /// Build configuration from parsed CLI args plus the environment.
    /// Per-provider settings are optional at load time; commands that need
    /// a provider fail with a pointed message via [`crm`](Self::crm) /
    /// [`accounting`](Self::accounting).
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let hubspot = match (env("HUBSPOT_CLIENT_ID"), env("HUBSPOT_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(CrmSettings {
                client_id,
                client_secret,
                redirect_uri: env("HUBSPOT_REDIRECT_URI")
                    .unwrap_or_else(|| "http://localhost:3000/oauth/hubspot/callback".to_string()),
                authorize_base: env("HUBSPOT_AUTHORIZE_URL")
                    .unwrap_or_else(|| "https://app.hubspot.com/oauth/authorize".to_string()),
                api_base: env("HUBSPOT_API_BASE")
                    .unwrap_or_else(|| "https://api.hubapi.com".to_string()),
            }),
            _ => None,
        };

        let xero = match (env("XERO_CLIENT_ID"), env("XERO_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(AccountingSettings {
                client_id,
                client_secret,
                redirect_uri: env("XERO_REDIRECT_URI")
                    .unwrap_or_else(|| "http://localhost:3000/oauth/xero/callback".to_string()),
                authorize_base: env("XERO_AUTHORIZE_URL").unwrap_or_else(|| {
                    "https://login.xero.com/identity/connect/authorize".to_string()
                }),
                token_url: env("XERO_TOKEN_URL")
                    .unwrap_or_else(|| "https://identity.xero.com/connect/token".to_string()),
                api_base: env("XERO_API_BASE")
                    .unwrap_or_else(|| "https://api.xero.com/api.xro/2.0".to_string()),
                connections_url: env("XERO_CONNECTIONS_URL")
                    .unwrap_or_else(|| "https://api.xero.com/connections".to_string()),
                tenant_id: env("XERO_TENANT_ID"),
            }),
            _ => None,
        };

        Ok(Config {
            db_file: expand_tilde(&args.db_file),
            log_level: args.log_level.clone(),
            hubspot,
            xero,
        })
    }

    pub fn crm(&self) -> Result<&CrmSettings> {
        self.hubspot
            .as_ref()
            .context("CRM provider is not configured (set HUBSPOT_CLIENT_ID and HUBSPOT_CLIENT_SECRET)")
    }

    pub fn accounting(&self) -> Result<&AccountingSettings> {
        self.xero
            .as_ref()
            .context("Accounting provider is not configured (set XERO_CLIENT_ID and XERO_CLIENT_SECRET)")
    }

    pub fn crm_configured(&self) -> bool {
        self.hubspot.is_some()
    }

    pub fn accounting_configured(&self) -> bool {
        self.xero.is_some()
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Expand tilde (~) in file paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
