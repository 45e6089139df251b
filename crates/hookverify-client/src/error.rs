use thiserror::Error;
use tokio_tungstenite::tungstenite::{self, protocol::CloseFrame};

#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected response from relay: {0}")]
    HandshakeRejected(String),

    #[error("connection closed: {reason}")]
    ConnectionClosed { reason: String },

    #[error("relay refused the connection ({status}): {body}")]
    UpgradeRejected { status: u16, body: String },

    #[error("connection error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("http client error: {0}")]
    HttpClientFailed(#[from] reqwest::Error),

    #[error("credentials file error: {0}")]
    CredentialsIo(#[from] std::io::Error),

    #[error("failed to encode credentials: {0}")]
    CredentialsFormat(#[from] serde_json::Error),

    #[error("could not determine the home directory")]
    NoHomeDir,
}

impl Error {
    pub(crate) fn closed(frame: Option<CloseFrame>) -> Self {
        let reason = frame
            .map(|f| f.reason.as_str().to_string())
            .filter(|reason| !reason.is_empty())
            .unwrap_or_else(|| "no reason given".to_string());
        Self::ConnectionClosed { reason }
    }

    /// Whether the listener keeps reconnecting after this error.
    /// A rejected handshake points at a bad API key, so retrying is pointless.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::HandshakeRejected(_))
    }
}
