use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONNECT_TIMEOUT_SECS, CONTACT_LIST_TIMEOUT_SECS, DEFAULT_FEED_LIMIT, DEFAULT_RELAYS,
    FETCH_TIMEOUT_SECS, FOLLOWER_FETCH_LIMIT, MAX_FILTER_AUTHORS, PUBLISH_TIMEOUT_SECS,
    REPLIES_OVERFETCH_FACTOR, THREAD_FETCH_LIMIT,
};

/// Engine configuration. Every field has a default, so a partial JSON
/// document (or `{}`) is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub relays: Vec<String>,
    pub fetch_timeout_secs: u64,
    /// Contact lists are large and slow to gather from every relay
    pub contact_timeout_secs: u64,
    pub publish_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub default_limit: usize,
    pub max_authors: usize,
    pub replies_overfetch: usize,
    pub thread_fetch_limit: usize,
    pub follower_fetch_limit: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            fetch_timeout_secs: FETCH_TIMEOUT_SECS,
            contact_timeout_secs: CONTACT_LIST_TIMEOUT_SECS,
            publish_timeout_secs: PUBLISH_TIMEOUT_SECS,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            default_limit: DEFAULT_FEED_LIMIT,
            max_authors: MAX_FILTER_AUTHORS,
            replies_overfetch: REPLIES_OVERFETCH_FACTOR,
            thread_fetch_limit: THREAD_FETCH_LIMIT,
            follower_fetch_limit: FOLLOWER_FETCH_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn contact_timeout(&self) -> Duration {
        Duration::from_secs(self.contact_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
