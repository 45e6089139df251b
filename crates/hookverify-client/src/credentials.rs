use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_API_URL: &str = "https://hookverify.com";

const CONFIG_DIR_ENV: &str = "HOOKVERIFY_CONFIG_DIR";
const CONFIG_DIR_NAME: &str = ".hookverify";
const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: api_url.into(),
        }
    }

    /// The key as shown on screen: `first12...last4`, or `***` for short keys.
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 16 {
            return "***".to_string();
        }

        let head: String = chars[..12].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// Flat JSON file holding the credentials of the logged in user.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            path: config_dir.as_ref().join(CREDENTIALS_FILE),
        }
    }

    /// `$HOOKVERIFY_CONFIG_DIR` when set, `~/.hookverify` otherwise.
    pub fn from_env() -> Result<Self, Error> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .map(|home| home.join(CONFIG_DIR_NAME))
                .ok_or(Error::NoHomeDir)?,
        };
        Ok(Self::new(config_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable credentials both mean "not logged in".
    pub fn load(&self) -> Option<Credentials> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!("failed to read {}: {err}", self.path.display());
                return None;
            }
        };

        serde_json::from_str(&contents)
            .inspect_err(|err| tracing::warn!("ignoring malformed {}: {err}", self.path.display()))
            .ok()
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), Error> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(credentials)?)?;
        tracing::debug!("saved credentials to {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<(), Error> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}
