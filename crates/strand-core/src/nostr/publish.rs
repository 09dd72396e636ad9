//! Tag construction for outgoing records

use crate::models::{resolve_root, Marker, Record, Tag};

/// NIP-10 tags for a reply to `parent_id`.
///
/// With the parent in hand, a parent that is itself a reply contributes its
/// thread root (`root` marker) and the parent becomes the `reply` target;
/// a top-level parent is tagged as the root. The parent's author is always
/// p-tagged. Without the parent only the root tag can be written.
pub fn reply_tags(parent_id: &str, parent: Option<&Record>) -> Vec<Tag> {
    let Some(parent) = parent else {
        return vec![Tag::event(parent_id, Some(Marker::Root))];
    };

    let root = resolve_root(parent);
    let mut tags = if root != parent.id {
        vec![
            Tag::event(root, Some(Marker::Root)),
            Tag::event(parent_id, Some(Marker::Reply)),
        ]
    } else {
        vec![Tag::event(parent_id, Some(Marker::Root))]
    };
    tags.push(Tag::identity(parent.pubkey.clone()));
    tags
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactEdit {
    Follow(String),
    Unfollow(String),
}

/// Apply `edit` to the tags of the current contact list. Every tag other
/// than the affected "p" entry is carried over unchanged. Returns `None`
/// when the list already reflects the edit.
pub fn edit_contact_tags(current: &[Tag], edit: &ContactEdit) -> Option<Vec<Tag>> {
    match edit {
        ContactEdit::Follow(pubkey) => {
            if current.iter().any(|t| t.pubkey() == Some(pubkey.as_str())) {
                return None;
            }
            let mut tags = current.to_vec();
            tags.push(Tag::identity(pubkey.clone()));
            Some(tags)
        }
        ContactEdit::Unfollow(pubkey) => {
            let tags: Vec<Tag> = current
                .iter()
                .filter(|t| t.pubkey() != Some(pubkey.as_str()))
                .cloned()
                .collect();
            (tags.len() != current.len()).then_some(tags)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::test_records::{note, record_id, reply};

    #[test]
    fn test_reply_to_top_level_post() {
        let parent = note(1, "alice", 10);
        let tags = reply_tags(&parent.id, Some(&parent));
        assert_eq!(
            tags,
            vec![
                Tag::event(record_id(1), Some(Marker::Root)),
                Tag::identity("alice"),
            ]
        );
    }

    #[test]
    fn test_reply_to_reply_carries_root() {
        let parent = reply(2, "bob", 20, &[(1, Some(Marker::Root))]);
        let tags = reply_tags(&parent.id, Some(&parent));
        assert_eq!(
            tags,
            vec![
                Tag::event(record_id(1), Some(Marker::Root)),
                Tag::event(record_id(2), Some(Marker::Reply)),
                Tag::identity("bob"),
            ]
        );
    }

    #[test]
    fn test_unfetched_parent_is_tagged_as_root() {
        let tags = reply_tags(&record_id(7), None);
        assert_eq!(tags, vec![Tag::event(record_id(7), Some(Marker::Root))]);
    }

    #[test]
    fn test_follow_appends_once() {
        let current = vec![Tag::identity("a"), Tag::Other(vec!["t".into(), "x".into()])];
        let edited = edit_contact_tags(&current, &ContactEdit::Follow("b".into())).unwrap();
        assert_eq!(edited.len(), 3);
        assert_eq!(edited[1], current[1]);

        assert_eq!(edit_contact_tags(&edited, &ContactEdit::Follow("b".into())), None);
    }

    #[test]
    fn test_unfollow_keeps_other_tags() {
        let current = vec![
            Tag::identity("a"),
            Tag::IdentityRef {
                pubkey: "b".into(),
                relay: Some("wss://r".into()),
                petname: Some("bob".into()),
                extra: Vec::new(),
            },
            Tag::Other(vec!["t".into(), "x".into()]),
        ];
        let edited = edit_contact_tags(&current, &ContactEdit::Unfollow("a".into())).unwrap();
        assert_eq!(edited, current[1..].to_vec());

        assert_eq!(edit_contact_tags(&edited, &ContactEdit::Unfollow("a".into())), None);
    }
}
