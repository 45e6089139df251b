use std::{
    io::{self, Write},
    path::Path,
    process::ExitCode,
};

use anyhow::{Context, bail};
use hookverify_client::{
    credentials::{CredentialStore, Credentials, DEFAULT_API_URL},
    render::TerminalRenderer,
    tls, version,
    webhook::{self, WebhookForwarder},
    websocket::{Listener, ListenerConfig},
};
use tracing_subscriber::EnvFilter;

use crate::cli::Command;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
    tls::init()?;

    match cli::args().command {
        Command::Login { api_key, url } => login(&store()?, api_key, url)?,
        Command::Logout => {
            store()?
                .clear()
                .context("failed to remove credentials")?;
            println!("✅ Credentials removed.");
        }
        Command::Status => status(&store()?),
        Command::Listen {
            port,
            path,
            api_key,
            ca_cert,
        } => return listen(&store()?, port, &path, api_key, ca_cert.as_deref()).await,
        Command::Version => println!("{}", version::version_line()),
    }

    Ok(ExitCode::SUCCESS)
}

fn store() -> anyhow::Result<CredentialStore> {
    CredentialStore::from_env().context("failed to locate the config directory")
}

fn login(store: &CredentialStore, api_key: Option<String>, url: String) -> anyhow::Result<()> {
    let api_key = match api_key {
        Some(api_key) => api_key,
        None => prompt("Enter your API key: ")?,
    };
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }

    let credentials = Credentials::new(api_key, url);
    store
        .save(&credentials)
        .context("failed to save credentials")?;

    println!("✅ Credentials saved to {}", store.path().display());
    println!("  API URL: {}", credentials.api_url);
    println!("  API Key: {}", credentials.masked_key());
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read API key from stdin")?;
    Ok(line.trim().to_string())
}

fn status(store: &CredentialStore) {
    let Some(credentials) = store.load() else {
        println!("⚠️ Not logged in. Run: hookverify login --api-key YOUR_KEY");
        return;
    };

    println!("{}", version::version_line());
    println!("  {:<12} {}", "API URL", credentials.api_url);
    println!("  {:<12} {}", "API Key", credentials.masked_key());
    println!("  {:<12} {}", "Config File", store.path().display());
}

async fn listen(
    store: &CredentialStore,
    port: u16,
    path: &str,
    api_key: Option<String>,
    ca_cert: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let stored = store.load();
    let Some(api_key) = api_key.or_else(|| stored.as_ref().map(|c| c.api_key.clone())) else {
        println!("❌ Error: No API key found. Run: hookverify login --api-key YOUR_KEY");
        return Ok(ExitCode::FAILURE);
    };
    let api_url = stored
        .map(|c| c.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let credentials = Credentials::new(api_key, api_url);

    let http_client = webhook::http_client().context("failed to build reqwest http client")?;
    let forwarder = WebhookForwarder::new(port, path, http_client);
    let tls_config = tls::client_config(ca_cert)?;

    println!("\n🦀 {}", version::version_line());
    println!("Forwarding webhooks to: {}", forwarder.target());
    println!("Connecting to: {}\n", credentials.api_url);

    let config = ListenerConfig::default();
    let renderer = TerminalRenderer::new(config.reconnect_delay);
    let mut listener = Listener::new(&credentials, forwarder, renderer)
        .with_config(config)
        .with_tls_config(tls_config);

    tokio::select! {
        result = listener.run() => {
            if result.is_err() {
                return Ok(ExitCode::FAILURE);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n👋 Disconnected.");
        }
    }

    Ok(ExitCode::SUCCESS)
}
