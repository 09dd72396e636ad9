//! Seam between the engine and wherever records come from

use std::future::Future;
use std::time::Duration;

use nostr_sdk::prelude::Event;

use crate::error::{GatewayError, PublishError};
use crate::models::tag::{parse_identities, parse_record_ids};
use crate::models::Record;

/// Query over records. Identity and id constraints are stored as validated
/// lowercase hex; malformed inputs are dropped while building.
///
/// `None` leaves a dimension unconstrained. `Some` of an empty list matches
/// nothing, so a filter whose every author was malformed never widens into
/// an unrestricted query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub kinds: Vec<u16>,
    pub authors: Option<Vec<String>>,
    pub ids: Option<Vec<String>>,
    /// "#e": records referencing any of these ids
    pub referenced_ids: Option<Vec<String>>,
    /// "#p": records referencing any of these identities
    pub referenced_pubkeys: Option<Vec<String>>,
    pub limit: Option<usize>,
    /// Inclusive upper bound on `created_at`
    pub until: Option<u64>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn authors<S: AsRef<str>>(mut self, authors: &[S]) -> Self {
        self.authors = Some(parse_identities(authors));
        self
    }

    pub fn author(self, author: &str) -> Self {
        self.authors(&[author])
    }

    pub fn ids<S: AsRef<str>>(mut self, ids: &[S]) -> Self {
        self.ids = Some(parse_record_ids(ids));
        self
    }

    pub fn referenced_ids<S: AsRef<str>>(mut self, ids: &[S]) -> Self {
        self.referenced_ids = Some(parse_record_ids(ids));
        self
    }

    pub fn referenced_pubkeys<S: AsRef<str>>(mut self, pubkeys: &[S]) -> Self {
        self.referenced_pubkeys = Some(parse_identities(pubkeys));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn until(mut self, until: Option<u64>) -> Self {
        self.until = until;
        self
    }

    /// True when some constrained dimension has no valid values left
    pub fn matches_nothing(&self) -> bool {
        let emptied = [
            &self.authors,
            &self.ids,
            &self.referenced_ids,
            &self.referenced_pubkeys,
        ]
        .into_iter()
        .any(|set| matches!(set, Some(values) if values.is_empty()));

        emptied || self.limit == Some(0)
    }

    /// Whether `record` satisfies every constraint except `limit`
    pub fn matches(&self, record: &Record) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&record.kind))
            && contains(&self.authors, &record.pubkey)
            && contains(&self.ids, &record.id)
            && contains_any(
                &self.referenced_ids,
                record.event_refs().filter_map(|t| t.event_id()),
            )
            && contains_any(
                &self.referenced_pubkeys,
                record.tags.iter().filter_map(|t| t.pubkey()),
            )
            && self.until.map_or(true, |until| record.created_at <= until)
    }
}

fn contains(set: &Option<Vec<String>>, value: &str) -> bool {
    set.as_ref()
        .map_or(true, |values| values.iter().any(|v| v == value))
}

fn contains_any<'a>(set: &Option<Vec<String>>, mut refs: impl Iterator<Item = &'a str>) -> bool {
    set.as_ref()
        .map_or(true, |values| refs.any(|r| values.iter().any(|v| v == r)))
}

/// Source of records and sink for signed events.
///
/// `fetch` returns whatever arrived within `timeout`. Running out of time is
/// not an error; the partial (possibly empty) result is authoritative for
/// that attempt. Records may contain duplicates and arrive in any order.
pub trait SourceGateway: Send + Sync {
    fn fetch(
        &self,
        filter: RecordFilter,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<Record>, GatewayError>> + Send + '_;

    /// Publish a signed event, returning its id as hex
    fn publish(
        &self,
        event: Event,
    ) -> impl Future<Output = Result<String, PublishError>> + Send + '_;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::test_records::{note, record_id, reply};
    use crate::models::Tag;
    use nostr_sdk::prelude::Keys;

    #[test]
    fn test_malformed_authors_are_dropped() {
        let good = Keys::generate().public_key().to_hex();
        let filter = RecordFilter::new().authors(&[good.as_str(), "nope"]);
        assert_eq!(filter.authors, Some(vec![good]));
        assert!(!filter.matches_nothing());
    }

    #[test]
    fn test_all_malformed_matches_nothing() {
        let filter = RecordFilter::new().kind(1).authors(&["nope", "also-bad"]);
        assert!(filter.matches_nothing());
        assert!(!filter.matches(&note(1, "nope", 1)));
    }

    #[test]
    fn test_matches_referenced_ids_and_until() {
        let filter = RecordFilter::new()
            .kind(1)
            .referenced_ids(&[record_id(1)])
            .until(Some(50));

        assert!(filter.matches(&reply(2, "a", 50, &[(1, None)])));
        assert!(!filter.matches(&reply(3, "a", 51, &[(1, None)])));
        assert!(!filter.matches(&reply(4, "a", 10, &[(9, None)])));
        assert!(!filter.matches(&note(5, "a", 10)));
    }

    #[test]
    fn test_matches_referenced_pubkeys() {
        let me = Keys::generate().public_key().to_hex();
        let filter = RecordFilter::new().referenced_pubkeys(&[me.as_str()]);

        let mut mention = note(1, "a", 1);
        mention.tags.push(Tag::identity(me.clone()));
        assert!(filter.matches(&mention));
        assert!(!filter.matches(&note(2, "a", 1)));
    }
}
