//! Latest-write-wins projections over replaceable records
//!
//! Contact lists (kind:3) and profiles (kind:0) are replaced wholesale by
//! each newer record from the same author. A projection therefore reads
//! exactly one record per owner and never unions across versions.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use super::profile::Profile;
use super::record::Record;
use crate::constants::kinds;

/// Current-state view derived from the newest qualifying record(s)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub owner: String,
    /// Timestamp of the newest record that contributed; 0 when empty
    pub as_of: u64,
    pub members: Vec<String>,
}

impl Projection {
    pub fn empty(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            ..Default::default()
        }
    }

    pub fn contains(&self, pubkey: &str) -> bool {
        self.members.iter().any(|m| m == pubkey)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Replaceable-event ordering: newer wins, and on equal timestamps the
/// lexicographically lowest id wins so the choice never depends on the
/// order relays happened to deliver records in.
fn newer(candidate: &Record, current: &Record) -> bool {
    match candidate.created_at.cmp(&current.created_at) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.id < current.id,
    }
}

/// Newest record of `kind` authored by `owner`
pub fn resolve_latest<'a>(records: &'a [Record], owner: &str, kind: u16) -> Option<&'a Record> {
    records
        .iter()
        .filter(|r| r.kind == kind && r.pubkey == owner)
        .fold(None, |best: Option<&Record>, r| match best {
            Some(current) if !newer(r, current) => Some(current),
            _ => Some(r),
        })
}

/// Newest record of `kind` for every author present in `records`
pub fn latest_per_author(records: &[Record], kind: u16) -> HashMap<&str, &Record> {
    let mut latest: HashMap<&str, &Record> = HashMap::new();
    for record in records.iter().filter(|r| r.kind == kind) {
        match latest.get(record.pubkey.as_str()) {
            Some(current) if !newer(record, current) => {}
            _ => {
                latest.insert(record.pubkey.as_str(), record);
            }
        }
    }
    latest
}

/// Who `owner` follows right now: the "p" tags of their newest contact
/// list, in tag order.
pub fn contact_projection(records: &[Record], owner: &str) -> Projection {
    let Some(latest) = resolve_latest(records, owner, kinds::CONTACT_LIST) else {
        return Projection::empty(owner);
    };

    Projection {
        owner: owner.to_string(),
        as_of: latest.created_at,
        members: latest
            .identity_refs()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

/// Who follows `owner` right now, from candidate contact lists that
/// p-tag them. A relay may hand back an older list that still matches the
/// filter while the author's newest one has dropped `owner`, so only each
/// author's newest list is consulted. Members are newest-first.
pub fn follower_projection(records: &[Record], owner: &str) -> Projection {
    let mut followers: Vec<(&str, u64)> = latest_per_author(records, kinds::CONTACT_LIST)
        .into_iter()
        .filter(|(author, record)| *author != owner && record.references_identity(owner))
        .map(|(author, record)| (author, record.created_at))
        .collect();

    followers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    Projection {
        owner: owner.to_string(),
        as_of: followers.first().map(|(_, ts)| *ts).unwrap_or(0),
        members: followers.into_iter().map(|(pk, _)| pk.to_string()).collect(),
    }
}

/// Every identity `owner` has followed in any fetched contact list, ranked
/// by the newest list it appeared in (descending).
pub fn following_history(records: &[Record], owner: &str) -> Vec<(String, u64)> {
    let mut last_seen: HashMap<&str, u64> = HashMap::new();
    for record in records
        .iter()
        .filter(|r| r.kind == kinds::CONTACT_LIST && r.pubkey == owner)
    {
        for pubkey in record.identity_refs() {
            let entry = last_seen.entry(pubkey).or_insert(record.created_at);
            *entry = (*entry).max(record.created_at);
        }
    }

    let mut ranked: Vec<(String, u64)> = last_seen
        .into_iter()
        .map(|(pk, ts)| (pk.to_string(), ts))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Profiles from a batch of metadata records: newest record per author,
/// parsed. An author whose newest record is malformed gets no entry.
pub fn profile_projection(records: &[Record]) -> HashMap<String, Profile> {
    latest_per_author(records, kinds::METADATA)
        .into_values()
        .filter_map(Profile::from_record)
        .map(|profile| (profile.pubkey.clone(), profile))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::test_records::{contact_list, metadata, record_id};

    #[test]
    fn test_latest_contact_list_wins() {
        let records = vec![
            contact_list(1, "me", 10, &["x", "y"]),
            contact_list(2, "me", 20, &["y", "z"]),
        ];

        let projection = contact_projection(&records, "me");
        assert_eq!(projection.members, vec!["y", "z"]);
        assert_eq!(projection.as_of, 20);
    }

    #[test]
    fn test_latest_wins_never_unions() {
        let records = vec![
            contact_list(1, "me", 10, &["a", "b"]),
            contact_list(2, "me", 20, &["c", "d"]),
        ];
        let projection = contact_projection(&records, "me");
        assert!(!projection.contains("a"));
        assert!(!projection.contains("b"));
        assert_eq!(projection.len(), 2);
    }

    #[test]
    fn test_projection_independent_of_input_order() {
        let a = contact_list(1, "me", 10, &["x"]);
        let b = contact_list(2, "me", 30, &["y", "z"]);
        let c = contact_list(3, "me", 20, &["w"]);
        let orders = vec![
            vec![a.clone(), b.clone(), c.clone()],
            vec![c.clone(), b.clone(), a.clone()],
            vec![b.clone(), a.clone(), c.clone()],
        ];

        let first = contact_projection(&orders[0], "me");
        for records in &orders[1..] {
            assert_eq!(contact_projection(records, "me"), first);
        }
    }

    #[test]
    fn test_equal_timestamps_pick_lowest_id() {
        let low = contact_list(1, "me", 10, &["low"]);
        let high = contact_list(2, "me", 10, &["high"]);

        let forward = contact_projection(&[low.clone(), high.clone()], "me");
        let backward = contact_projection(&[high, low], "me");
        assert_eq!(forward.members, vec!["low"]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_other_authors_and_kinds_ignored() {
        let mut profile = metadata(3, "me", 99, "{}");
        profile.tags = vec![crate::models::Tag::identity("nope")];
        let records = vec![
            contact_list(1, "someone", 50, &["q"]),
            profile,
            contact_list(2, "me", 10, &["x"]),
        ];
        assert_eq!(contact_projection(&records, "me").members, vec!["x"]);
    }

    #[test]
    fn test_empty_records_give_empty_projection() {
        let projection = contact_projection(&[], "me");
        assert!(projection.is_empty());
        assert_eq!(projection.owner, "me");
        assert_eq!(projection.as_of, 0);
    }

    #[test]
    fn test_follower_uses_each_authors_latest_list() {
        let records = vec![
            // alice followed me, then unfollowed
            contact_list(1, "alice", 10, &["me"]),
            contact_list(2, "alice", 20, &["other"]),
            // bob follows me in his latest list
            contact_list(3, "bob", 5, &["x"]),
            contact_list(4, "bob", 15, &["x", "me"]),
            // carol has a single list
            contact_list(5, "carol", 30, &["me"]),
        ];

        let followers = follower_projection(&records, "me");
        assert_eq!(followers.members, vec!["carol", "bob"]);
        assert_eq!(followers.as_of, 30);
    }

    #[test]
    fn test_follower_ignores_self() {
        let records = vec![contact_list(1, "me", 10, &["me"])];
        assert!(follower_projection(&records, "me").is_empty());
    }

    #[test]
    fn test_following_history_ranks_by_last_appearance() {
        let records = vec![
            contact_list(1, "me", 10, &["a", "b"]),
            contact_list(2, "me", 30, &["b", "c"]),
            contact_list(3, "me", 20, &["a"]),
        ];
        let history = following_history(&records, "me");
        assert_eq!(
            history,
            vec![
                ("b".to_string(), 30),
                ("c".to_string(), 30),
                ("a".to_string(), 20),
            ]
        );
    }

    #[test]
    fn test_profile_projection_newest_per_author() {
        let records = vec![
            metadata(1, "alice", 10, r#"{"name":"old"}"#),
            metadata(2, "alice", 20, r#"{"name":"new"}"#),
            metadata(3, "bob", 5, r#"{"name":"bob"}"#),
        ];
        let profiles = profile_projection(&records);
        assert_eq!(profiles["alice"].name.as_deref(), Some("new"));
        assert_eq!(profiles["bob"].name.as_deref(), Some("bob"));
    }

    #[test]
    fn test_profile_projection_malformed_latest_is_absent() {
        let records = vec![
            metadata(1, "alice", 10, r#"{"name":"old"}"#),
            metadata(2, "alice", 20, "garbage"),
            metadata(3, "bob", 5, r#"{"name":"bob"}"#),
        ];
        let profiles = profile_projection(&records);
        assert!(!profiles.contains_key("alice"));
        assert!(profiles.contains_key("bob"));
    }

    #[test]
    fn test_resolve_latest_none_for_unknown_owner() {
        let records = vec![contact_list(1, "me", 10, &["x"])];
        assert!(resolve_latest(&records, "you", kinds::CONTACT_LIST).is_none());
        assert_eq!(
            resolve_latest(&records, "me", kinds::CONTACT_LIST).map(|r| r.id.clone()),
            Some(record_id(1))
        );
    }
}
