use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use jx_auth::{
    AuthFlow, ConsentPrompt, CredentialStore, FileCredentialStore, ProviderConfig,
};

use crate::credentials_file;
use crate::prompt;

#[derive(Parser)]
#[command(name = "jx-launcher", version, about = "Authenticate Jagex accounts for external game clients")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate an account and write the game client credentials file
    Auth {
        /// Place to output the credentials.properties file to
        #[arg(short = 'O', long, default_value = "$HOME/.runelite/credentials.properties")]
        output_destination: String,
    },
    /// List stored accounts
    List,
    /// Delete a stored account
    #[command(alias = "del")]
    Delete {
        /// Account to delete; prompts when omitted
        account: Option<String>,
    },
}

pub async fn run(args: Cli) -> anyhow::Result<()> {
    match args.command {
        Command::Auth { output_destination } => auth(output_destination).await,
        Command::List => list().await,
        Command::Delete { account } => delete(account).await,
    }
}

struct TerminalPrompt;

impl ConsentPrompt for TerminalPrompt {
    fn show_consent_url(&self, url: &url::Url, _callback_port: u16) {
        println!("Consent URL, please visit: {}", url);
    }
}

async fn open_store() -> anyhow::Result<Arc<FileCredentialStore>> {
    let root = FileCredentialStore::default_root()?;
    Ok(Arc::new(FileCredentialStore::new(root).await?))
}

async fn auth(output_destination: String) -> anyhow::Result<()> {
    let config = ProviderConfig::jagex();

    // Preflight the privileged callback port before any network flow.
    if let Err(e) = jx_auth::probe_port(config.callback_port).await {
        let exe = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "jx-launcher".to_string());
        bail!(
            "{e}\nGrant permission to listen on port {} with:\n  sudo setcap CAP_NET_BIND_SERVICE=+eip {}",
            config.callback_port,
            exe
        );
    }

    let store = open_store().await?;
    let flow = AuthFlow::new(config, store.clone())?;

    let accounts = store.list_accounts().await;
    let mut options = vec!["New account".to_string()];
    options.extend(accounts.iter().cloned());
    let choice = prompt::select("Select Jagex account to authenticate", &options)?;

    let record = if choice == 0 {
        let pending = flow.client().begin_authorization();
        println!("Visit this url:\n{}", pending.url);
        let pasted = prompt::read_line("Input the url returned (jagex:...)")?;
        flow.client()
            .complete_authorization(&pasted, &pending)
            .await?
    } else {
        let name = &accounts[choice - 1];
        store
            .load(name)
            .await
            .with_context(|| format!("reading saved credentials for {name}"))?
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = flow.authenticate(record, &TerminalPrompt, &cancel).await?;

    let characters = &outcome.record.characters;
    let index = if characters.len() == 1 {
        0
    } else {
        let names: Vec<String> = characters
            .iter()
            .map(|c| c.display_name.clone())
            .collect();
        prompt::select("Select character", &names)?
    };
    let character = &characters[index];

    let destination = credentials_file::expand_destination(&output_destination);
    std::fs::write(
        &destination,
        credentials_file::render(character, &outcome.record.session_id),
    )
    .with_context(|| format!("writing credentials file to {}", destination.display()))?;

    info!(
        account = %outcome.account_name,
        character = %character.display_name,
        "Credentials written to {}",
        destination.display()
    );
    Ok(())
}

async fn list() -> anyhow::Result<()> {
    let store = open_store().await?;
    for account in store.list_accounts().await {
        println!("{}", account);
    }
    Ok(())
}

async fn delete(account: Option<String>) -> anyhow::Result<()> {
    let store = open_store().await?;

    let name = match account {
        Some(name) => name,
        None => {
            let accounts = store.list_accounts().await;
            if accounts.is_empty() {
                bail!("no stored accounts");
            }
            let choice = prompt::select("Select Jagex account to delete", &accounts)?;
            accounts[choice].clone()
        }
    };

    store.remove(&name).await?;
    info!(account = %name, "Account deleted");
    Ok(())
}
