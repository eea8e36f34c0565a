use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Input;

use stillsync::auth::CredentialStore;
use stillsync::config::{CliArgs, Command, Config, Provider};
use stillsync::mapper::{Account, Contact};
use stillsync::providers::{AccountingClient, CrmClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = Config::from_args(&args)?;

    // Initialize logging with the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match args.command {
        Command::Connect { provider } => connect(&config, provider).await,
        Command::Disconnect { provider } => disconnect(&config, provider).await,
        Command::Status => status(&config).await,
        Command::GetContact { email } => {
            let client = crm_client(&config).await?;
            match client.get_contact(&email).await? {
                Some(contact) => print_json(&contact)?,
                None => println!("No contact found for {}", email),
            }
            Ok(())
        }
        Command::SyncContact { file } => {
            let contact: Contact = read_json(&file)?;
            let client = crm_client(&config).await?;
            let id = client.sync_contact(&contact).await?;
            println!("Synced contact {} (id {})", contact.email, id);
            Ok(())
        }
        Command::SearchContacts { query } => {
            let client = crm_client(&config).await?;
            let contacts = client.search_contacts(&query).await?;
            print_json(&contacts)?;
            Ok(())
        }
        Command::GetAccount { id } => {
            let client = accounting_client(&config).await?;
            match client.get_account(&id).await? {
                Some(account) => print_json(&account)?,
                None => println!("No account found for {}", id),
            }
            Ok(())
        }
        Command::CreateAccount { file } => {
            let account: Account = read_json(&file)?;
            let client = accounting_client(&config).await?;
            let created = client.create_account(&account).await?;
            println!(
                "Created account {} (id {})",
                created.name,
                created.account_id.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        Command::UpdateAccount { id, file } => {
            let account: Account = read_json(&file)?;
            let client = accounting_client(&config).await?;
            let updated = client.update_account(&id, &account).await?;
            println!("Updated account {}", updated.name);
            Ok(())
        }
    }
}

async fn crm_client(config: &Config) -> Result<CrmClient> {
    let settings = config.crm()?.clone();
    let store = CredentialStore::open(&config.db_file, "hubspot")?;
    let client = CrmClient::new(settings, store)?;
    client.load_persisted().await;
    Ok(client)
}

async fn accounting_client(config: &Config) -> Result<AccountingClient> {
    let settings = config.accounting()?.clone();
    let store = CredentialStore::open(&config.db_file, "xero")?;
    let client = AccountingClient::new(settings, store)?;
    client.load_persisted().await;
    Ok(client)
}

/// Interactive authorization-code flow: print the authorize URL, let the
/// user approve in the browser and paste the `code` query parameter back.
async fn connect(config: &Config, provider: Provider) -> Result<()> {
    match provider {
        Provider::Hubspot => {
            let client = crm_client(config).await?;
            let code = prompt_authorization_code(&client.authorize_url()?)?;
            client.connect(&code).await?;
            println!("CRM provider connected");
        }
        Provider::Xero => {
            let client = accounting_client(config).await?;
            let code = prompt_authorization_code(&client.authorize_url()?)?;
            client.connect(&code).await?;
            println!(
                "Accounting provider connected (tenant {})",
                client.tenant_id().await.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

fn prompt_authorization_code(authorize_url: &str) -> Result<String> {
    println!("Open this URL in your browser and approve access:");
    println!();
    println!("  {}", authorize_url);
    println!();

    let code: String = Input::new()
        .with_prompt("Paste the 'code' parameter from the redirect URL")
        .interact_text()
        .context("Failed to read authorization code")?;
    let code = code.trim().to_string();
    if code.is_empty() {
        anyhow::bail!("Authorization code cannot be empty");
    }
    Ok(code)
}

async fn disconnect(config: &Config, provider: Provider) -> Result<()> {
    match provider {
        Provider::Hubspot => {
            crm_client(config).await?.disconnect().await?;
            println!("CRM credential discarded");
        }
        Provider::Xero => {
            accounting_client(config).await?.disconnect().await?;
            println!("Accounting credential discarded");
        }
    }
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    if config.crm_configured() {
        let client = crm_client(config).await?;
        println!(
            "hubspot: configured={} state={:?}",
            client.is_configured(),
            client.lifecycle_state().await
        );
    } else {
        println!("hubspot: app credentials not set");
    }

    if config.accounting_configured() {
        let client = accounting_client(config).await?;
        println!(
            "xero:    configured={} state={:?} tenant={}",
            client.is_configured(),
            client.lifecycle_state().await,
            client.tenant_id().await.as_deref().unwrap_or("-")
        );
    } else {
        println!("xero:    app credentials not set");
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
