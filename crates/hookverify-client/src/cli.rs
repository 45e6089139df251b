use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hookverify_client::credentials::DEFAULT_API_URL;

#[derive(Parser, Debug)]
#[command(name = "hookverify", version)]
/// Receive webhooks locally during development
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authenticate with HookVerify
    Login {
        #[arg(long, short = 'k', env = "HOOKVERIFY_API_KEY")]
        /// Your HookVerify API key, prompted for when omitted
        api_key: Option<String>,

        #[arg(long, short = 'u', default_value = DEFAULT_API_URL)]
        /// HookVerify API URL
        url: String,
    },

    /// Remove stored credentials
    Logout,

    /// Show the stored credentials
    Status,

    /// Listen for webhooks and forward them to localhost
    Listen {
        /// Local port to forward webhooks to
        port: u16,

        #[arg(long, short, default_value = "/")]
        /// Local path to forward to e.g: /webhooks/stripe
        path: String,

        #[arg(long, short = 'k', env = "HOOKVERIFY_API_KEY")]
        /// API key, the stored key is used when omitted
        api_key: Option<String>,

        #[arg(long, env = "HOOKVERIFY_CA_CERT")]
        /// Path to a CA certificate (PEM encoded) for self-hosted relays
        ca_cert: Option<PathBuf>,
    },

    /// Show CLI version
    Version,
}

pub fn args() -> Args {
    Args::parse()
}
