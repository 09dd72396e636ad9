use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::Record;
use crate::constants::kinds;

/// Profile parsed from a kind:0 metadata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub pubkey: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub picture: Option<String>,
    pub about: Option<String>,
    pub nip05: Option<String>,
    /// Timestamp of the metadata record this profile came from
    pub created_at: u64,
}

impl Profile {
    /// Parse a kind:0 record. Content must be a JSON object; anything else
    /// yields no profile. Non-string fields are ignored rather than fatal.
    pub fn from_record(record: &Record) -> Option<Self> {
        if record.kind != kinds::METADATA {
            return None;
        }

        let value: Value = match serde_json::from_str(&record.content) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("Skipping unparseable profile {}: {}", record.id, e);
                return None;
            }
        };
        let fields = value.as_object()?;

        let field = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Profile {
            pubkey: record.pubkey.clone(),
            name: field("name"),
            // Older clients wrote camelCase
            display_name: field("display_name").or_else(|| field("displayName")),
            picture: field("picture"),
            about: field("about"),
            nip05: field("nip05"),
            created_at: record.created_at,
        })
    }

    /// `display_name`, falling back to `name`
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref().or(self.name.as_deref())
    }
}
