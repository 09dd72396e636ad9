//! Typed tags and identifier parsing
//!
//! Tags arrive as raw string vectors. The ones the engine reasons about
//! ("e" event references and "p" identity references) are lifted into
//! variants so marker lookups don't depend on positional guessing; every
//! other tag is carried verbatim so it can be republished unchanged.

use nostr_sdk::prelude::{EventId, PublicKey};
use serde::{Deserialize, Serialize};

/// NIP-10 marker (4th field of an "e" tag)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Root,
    Reply,
    Mention,
    Unknown(String),
}

impl Marker {
    fn parse(raw: &str) -> Self {
        match raw {
            "root" => Marker::Root,
            "reply" => Marker::Reply,
            "mention" => Marker::Mention,
            other => Marker::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Marker::Root => "root",
            Marker::Reply => "reply",
            Marker::Mention => "mention",
            Marker::Unknown(s) => s,
        }
    }
}

/// Positional fields are kept exactly as received: `None` means the field
/// was absent, `Some("")` that it was present but empty. Anything past the
/// 4th field lives in `extra`, so a tag round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum Tag {
    /// ["e", <event-id>, <relay-url>, <marker>, <pubkey>...]
    EventRef {
        id: String,
        relay: Option<String>,
        marker: Option<Marker>,
        extra: Vec<String>,
    },
    /// ["p", <pubkey>, <relay-url>, <petname>, ...]
    IdentityRef {
        pubkey: String,
        relay: Option<String>,
        petname: Option<String>,
        extra: Vec<String>,
    },
    Other(Vec<String>),
}

fn trailing(parts: &[String]) -> Vec<String> {
    parts.get(4..).map(<[String]>::to_vec).unwrap_or_default()
}

/// Lay out positional fields, filling skipped slots with "" so later
/// fields keep their position.
fn positional(head: [&str; 2], slots: [Option<&str>; 2], extra: &[String]) -> Vec<String> {
    let mut parts: Vec<String> = head.iter().map(|s| s.to_string()).collect();
    let used = if !extra.is_empty() {
        2
    } else {
        slots.iter().rposition(Option::is_some).map_or(0, |i| i + 1)
    };
    parts.extend(slots[..used].iter().map(|s| s.unwrap_or_default().to_string()));
    parts.extend(extra.iter().cloned());
    parts
}

impl Tag {
    pub fn from_parts(parts: &[String]) -> Self {
        match (parts.first().map(String::as_str), parts.get(1)) {
            (Some("e"), Some(id)) if !id.is_empty() => Tag::EventRef {
                id: id.clone(),
                relay: parts.get(2).cloned(),
                marker: parts.get(3).map(|m| Marker::parse(m)),
                extra: trailing(parts),
            },
            (Some("p"), Some(pubkey)) if !pubkey.is_empty() => Tag::IdentityRef {
                pubkey: pubkey.clone(),
                relay: parts.get(2).cloned(),
                petname: parts.get(3).cloned(),
                extra: trailing(parts),
            },
            _ => Tag::Other(parts.to_vec()),
        }
    }

    pub fn to_parts(&self) -> Vec<String> {
        match self {
            Tag::EventRef {
                id,
                relay,
                marker,
                extra,
            } => positional(
                ["e", id.as_str()],
                [relay.as_deref(), marker.as_ref().map(Marker::as_str)],
                extra,
            ),
            Tag::IdentityRef {
                pubkey,
                relay,
                petname,
                extra,
            } => positional(
                ["p", pubkey.as_str()],
                [relay.as_deref(), petname.as_deref()],
                extra,
            ),
            Tag::Other(parts) => parts.clone(),
        }
    }

    /// "e" tag in wire form: a marker comes with an empty relay slot
    pub fn event(id: impl Into<String>, marker: Option<Marker>) -> Self {
        Tag::EventRef {
            id: id.into(),
            relay: marker.as_ref().map(|_| String::new()),
            marker,
            extra: Vec::new(),
        }
    }

    pub fn identity(pubkey: impl Into<String>) -> Self {
        Tag::IdentityRef {
            pubkey: pubkey.into(),
            relay: None,
            petname: None,
            extra: Vec::new(),
        }
    }

    /// Referenced event id, for "e" tags
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Tag::EventRef { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Referenced pubkey, for "p" tags
    pub fn pubkey(&self) -> Option<&str> {
        match self {
            Tag::IdentityRef { pubkey, .. } => Some(pubkey),
            _ => None,
        }
    }

    pub fn marker(&self) -> Option<&Marker> {
        match self {
            Tag::EventRef { marker, .. } => marker.as_ref().filter(|m| !m.as_str().is_empty()),
            _ => None,
        }
    }
}

impl From<Vec<String>> for Tag {
    fn from(parts: Vec<String>) -> Self {
        Tag::from_parts(&parts)
    }
}

impl From<Tag> for Vec<String> {
    fn from(tag: Tag) -> Self {
        tag.to_parts()
    }
}

/// Normalize an identity (hex or npub) to lowercase hex.
/// Returns `None` for malformed input; callers drop the entry.
pub fn parse_identity(raw: &str) -> Option<String> {
    match PublicKey::parse(raw.trim()) {
        Ok(pk) => Some(pk.to_hex()),
        Err(e) => {
            tracing::debug!("Skipping malformed identity {:?}: {}", raw, e);
            None
        }
    }
}

/// Normalize a record id (hex, note or nevent) to lowercase hex.
/// Returns `None` for malformed input; callers drop the entry.
pub fn parse_record_id(raw: &str) -> Option<String> {
    match EventId::parse(raw.trim()) {
        Ok(id) => Some(id.to_hex()),
        Err(e) => {
            tracing::debug!("Skipping malformed record id {:?}: {}", raw, e);
            None
        }
    }
}

/// Parse every identity in `raw`, skipping malformed entries and repeats
pub fn parse_identities<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for pk in raw.iter().filter_map(|s| parse_identity(s.as_ref())) {
        if !out.contains(&pk) {
            out.push(pk);
        }
    }
    out
}

/// Parse every record id in `raw`, skipping malformed entries and repeats
pub fn parse_record_ids<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for id in raw.iter().filter_map(|s| parse_record_id(s.as_ref())) {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr_sdk::prelude::{Keys, ToBech32};

    fn parts(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_event_tag_with_marker() {
        let tag = Tag::from_parts(&parts(&["e", "abc", "wss://relay", "reply"]));
        assert_eq!(tag.event_id(), Some("abc"));
        assert_eq!(tag.marker(), Some(&Marker::Reply));
        assert_eq!(tag.pubkey(), None);
    }

    #[test]
    fn test_event_tag_empty_relay_keeps_marker() {
        let tag = Tag::from_parts(&parts(&["e", "abc", "", "root"]));
        assert_eq!(tag.marker(), Some(&Marker::Root));
        assert_eq!(tag.to_parts(), parts(&["e", "abc", "", "root"]));
    }

    #[test]
    fn test_marker_only_in_fourth_field() {
        // A marker in the relay slot is not a marker
        let tag = Tag::from_parts(&parts(&["e", "abc", "reply"]));
        assert_eq!(tag.marker(), None);
    }

    #[test]
    fn test_identity_tag_round_trip_with_petname() {
        let raw = parts(&["p", "def", "wss://relay", "alice"]);
        let tag = Tag::from_parts(&raw);
        assert_eq!(tag.pubkey(), Some("def"));
        assert_eq!(tag.to_parts(), raw);
    }

    #[test]
    fn test_event_tag_keeps_trailing_pubkey() {
        let raw = parts(&["e", "abc", "", "reply", "def"]);
        let tag = Tag::from_parts(&raw);
        assert_eq!(tag.marker(), Some(&Marker::Reply));
        assert_eq!(tag.to_parts(), raw);
    }

    #[test]
    fn test_empty_fields_round_trip() {
        for raw in [
            parts(&["p", "def", ""]),
            parts(&["p", "def", "", ""]),
            parts(&["p", "def", "wss://relay", "", "x", "y"]),
            parts(&["e", "abc", "", ""]),
        ] {
            assert_eq!(Tag::from_parts(&raw).to_parts(), raw);
        }
        assert_eq!(Tag::from_parts(&parts(&["e", "abc", "", ""])).marker(), None);
    }

    #[test]
    fn test_built_tags_fill_skipped_slots() {
        assert_eq!(Tag::identity("def").to_parts(), parts(&["p", "def"]));
        assert_eq!(
            Tag::event("abc", Some(Marker::Root)).to_parts(),
            parts(&["e", "abc", "", "root"])
        );
    }

    #[test]
    fn test_unknown_and_truncated_tags_are_other() {
        assert_eq!(
            Tag::from_parts(&parts(&["t", "rust"])),
            Tag::Other(parts(&["t", "rust"]))
        );
        assert_eq!(Tag::from_parts(&parts(&["e"])), Tag::Other(parts(&["e"])));
        assert_eq!(
            Tag::from_parts(&parts(&["p", ""])),
            Tag::Other(parts(&["p", ""]))
        );
    }

    #[test]
    fn test_tag_serializes_as_string_array() {
        let tag = Tag::event("abc", Some(Marker::Root));
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, r#"["e","abc","","root"]"#);

        let back: Tag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tag);
    }

    #[test]
    fn test_parse_identity_accepts_hex_and_npub() {
        let keys = Keys::generate();
        let hex = keys.public_key().to_hex();
        let npub = keys.public_key().to_bech32().unwrap();

        assert_eq!(parse_identity(&hex), Some(hex.clone()));
        assert_eq!(parse_identity(&npub), Some(hex));
    }

    #[test]
    fn test_parse_identities_skips_malformed_and_repeats() {
        let a = Keys::generate().public_key().to_hex();
        let b = Keys::generate().public_key().to_hex();
        let raw = vec![a.clone(), "not-a-key".to_string(), b.clone(), a.clone()];

        assert_eq!(parse_identities(&raw), vec![a, b]);
    }

    #[test]
    fn test_parse_record_ids_skips_malformed() {
        let good = "a".repeat(64);
        let raw = vec![good.as_str(), "zz", ""];
        assert_eq!(parse_record_ids(&raw), vec![good.clone()]);
    }
}
