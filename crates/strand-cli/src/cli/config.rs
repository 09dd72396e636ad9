use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strand_core::{CoreConfig, KeySigner};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Engine settings (relays, timeouts, query caps)
    #[serde(default)]
    pub engine: CoreConfig,

    /// Identity used by read-only commands when none is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Credentials for signing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

/// Nostr credentials configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// nsec, hex, or ncryptsec (encrypted) key
    pub key: String,

    /// Password for ncryptsec decryption (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl CliConfig {
    /// `<config_dir>/strand/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("strand").join("config.json"))
    }

    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// An explicit path must exist. Without one, the default location is
    /// used if present, otherwise built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    /// Signer from `--nsec` if given, else from configured credentials
    pub fn signer(&self, nsec: Option<&str>) -> Result<Option<KeySigner>> {
        let (key, password) = match (nsec, &self.credentials) {
            (Some(nsec), _) => (nsec, None),
            (None, Some(creds)) => (creds.key.as_str(), creds.password.as_deref()),
            (None, None) => return Ok(None),
        };
        let signer = KeySigner::from_secret(key, password).context("Failed to load signing key")?;
        Ok(Some(signer))
    }
}
