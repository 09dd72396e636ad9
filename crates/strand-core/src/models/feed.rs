use serde::{Deserialize, Serialize};

use super::profile::Profile;
use super::record::Record;
use crate::constants::DEFAULT_FEED_LIMIT;

/// A record as presented in a feed, with whatever enrichment applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub record: Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u32>,
    /// Summary of the post this one replies to, when it could be fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<FeedItem>>,
}

impl FeedItem {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            author: None,
            reply_count: None,
            parent: None,
        }
    }

    pub fn with_author(mut self, author: Option<Profile>) -> Self {
        self.author = author;
        self
    }

    /// Author display name, falling back to a shortened pubkey
    pub fn author_label(&self) -> String {
        self.author
            .as_ref()
            .and_then(|p| p.display_name())
            .map(str::to_string)
            .unwrap_or_else(|| short_pubkey(&self.record.pubkey))
    }
}

pub fn short_pubkey(pubkey: &str) -> String {
    let prefix: String = pubkey.chars().take(8).collect();
    format!("{}...", prefix)
}

/// Pagination boundary: the next page holds records created at or before
/// `before`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub before: u64,
}

impl Cursor {
    /// Cursor for the page after `items`, which must be sorted newest
    /// first. An empty page ends pagination, as does a page whose oldest
    /// record sits at timestamp 0.
    pub fn after(items: &[FeedItem]) -> Option<Self> {
        let oldest = items.last()?;
        oldest
            .record
            .created_at
            .checked_sub(1)
            .map(|before| Cursor { before })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    pub limit: usize,
    pub before: Option<u64>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_FEED_LIMIT,
            before: None,
        }
    }
}

impl FeedQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            before: None,
        }
    }

    pub fn before(mut self, before: Option<u64>) -> Self {
        self.before = before;
        self
    }

    /// Query for the page following `cursor`
    pub fn next(self, cursor: Cursor) -> Self {
        self.before(Some(cursor.before))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<Cursor>,
    /// Shown to the user when the page is a degraded stand-in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl Page {
    pub fn new(items: Vec<FeedItem>) -> Self {
        let next_cursor = Cursor::after(&items);
        Self {
            items,
            next_cursor,
            notice: None,
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::test_records::note;

    #[test]
    fn test_cursor_is_oldest_minus_one() {
        let items = vec![FeedItem::new(note(1, "a", 50)), FeedItem::new(note(2, "a", 40))];
        assert_eq!(Cursor::after(&items), Some(Cursor { before: 39 }));
    }

    #[test]
    fn test_empty_page_has_no_cursor() {
        assert_eq!(Page::new(Vec::new()).next_cursor, None);
    }

    #[test]
    fn test_zero_timestamp_ends_pagination() {
        let items = vec![FeedItem::new(note(1, "a", 0))];
        assert_eq!(Cursor::after(&items), None);
    }

    #[test]
    fn test_author_label_falls_back_to_short_pubkey() {
        let item = FeedItem::new(note(1, "abcdef0123456789", 1));
        assert_eq!(item.author_label(), "abcdef01...");
    }

    #[test]
    fn test_query_next_uses_cursor() {
        let query = FeedQuery::new(2).next(Cursor { before: 99 });
        assert_eq!(query.before, Some(99));
        assert_eq!(query.limit, 2);
    }
}
