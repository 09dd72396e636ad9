use std::collections::HashSet;

use nostr_sdk::prelude::Event;
use serde::{Deserialize, Serialize};

use super::tag::Tag;

/// A fetched event. Immutable; the id is content-derived, so two records
/// with the same id are the same logical object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub content: String,
    pub tags: Vec<Tag>,
}

impl Record {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.to_hex(),
            pubkey: event.pubkey.to_hex(),
            created_at: event.created_at.as_secs(),
            kind: event.kind.as_u16(),
            content: event.content.clone(),
            tags: event
                .tags
                .iter()
                .map(|tag| Tag::from_parts(tag.as_slice()))
                .collect(),
        }
    }

    /// "e" tags in original order
    pub fn event_refs(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| t.event_id().is_some())
    }

    /// Whether the record references any other event (i.e. is a reply)
    pub fn has_event_refs(&self) -> bool {
        self.event_refs().next().is_some()
    }

    /// Pubkeys from "p" tags in tag order, first occurrence only
    pub fn identity_refs(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.tags
            .iter()
            .filter_map(Tag::pubkey)
            .filter(|pk| seen.insert(*pk))
            .collect()
    }

    pub fn references_identity(&self, pubkey: &str) -> bool {
        self.tags.iter().any(|t| t.pubkey() == Some(pubkey))
    }
}

/// Collapse records seen from several relays into one entry per id.
/// The first copy wins; the relative order of survivors is preserved.
pub fn dedup_records(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}

/// Newest first; equal timestamps fall back to id so output is stable
pub fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
pub(crate) mod test_records {
    use super::*;
    use crate::models::tag::Marker;

    pub fn record_id(n: u8) -> String {
        hex::encode([n; 32])
    }

    pub fn note(id: u8, pubkey: &str, created_at: u64) -> Record {
        Record {
            id: record_id(id),
            pubkey: pubkey.to_string(),
            created_at,
            kind: crate::constants::kinds::TEXT_NOTE,
            content: format!("note {}", id),
            tags: Vec::new(),
        }
    }

    pub fn reply(id: u8, pubkey: &str, created_at: u64, refs: &[(u8, Option<Marker>)]) -> Record {
        let mut record = note(id, pubkey, created_at);
        record.tags = refs
            .iter()
            .map(|(target, marker)| Tag::event(record_id(*target), marker.clone()))
            .collect();
        record
    }

    pub fn contact_list(id: u8, pubkey: &str, created_at: u64, follows: &[&str]) -> Record {
        Record {
            id: record_id(id),
            pubkey: pubkey.to_string(),
            created_at,
            kind: crate::constants::kinds::CONTACT_LIST,
            content: String::new(),
            tags: follows.iter().map(|pk| Tag::identity(*pk)).collect(),
        }
    }

    pub fn metadata(id: u8, pubkey: &str, created_at: u64, content: &str) -> Record {
        Record {
            id: record_id(id),
            pubkey: pubkey.to_string(),
            created_at,
            kind: crate::constants::kinds::METADATA,
            content: content.to_string(),
            tags: Vec::new(),
        }
    }
}
