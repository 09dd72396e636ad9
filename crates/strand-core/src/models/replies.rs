use std::collections::{HashMap, HashSet};

use super::record::Record;

/// Count replying records per target id.
///
/// Each replying record counts toward at most one target: its "e" tags are
/// scanned in order and the first one naming a requested target takes the
/// increment. Every requested target is present in the result, zero if
/// nothing referenced it. Records are counted once per id even if the
/// input carries duplicates.
pub fn tally_replies<S: AsRef<str>>(records: &[Record], targets: &[S]) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = targets
        .iter()
        .map(|t| (t.as_ref().to_string(), 0))
        .collect();
    let mut counted: HashSet<&str> = HashSet::new();

    for record in records {
        if !counted.insert(record.id.as_str()) {
            continue;
        }
        let first_match = record
            .event_refs()
            .filter_map(|tag| tag.event_id())
            .find(|id| counts.contains_key(*id));
        if let Some(target) = first_match {
            if let Some(count) = counts.get_mut(target) {
                *count += 1;
            }
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::test_records::{note, record_id, reply};
    use crate::models::tag::Marker;

    #[test]
    fn test_single_reply_counts() {
        let records = vec![reply(2, "b", 90, &[(1, Some(Marker::Reply))])];
        let counts = tally_replies(&records, &[record_id(1)]);
        assert_eq!(counts[&record_id(1)], 1);
    }

    #[test]
    fn test_record_counts_toward_first_matching_target_only() {
        // References both targets; only the first in tag order gets it
        let records = vec![reply(3, "c", 10, &[(1, None), (2, None)])];
        let counts = tally_replies(&records, &[record_id(1), record_id(2)]);
        assert_eq!(counts[&record_id(1)], 1);
        assert_eq!(counts[&record_id(2)], 0);
        assert_eq!(counts.values().sum::<u32>(), 1);
    }

    #[test]
    fn test_skips_unrequested_refs_before_match() {
        let records = vec![reply(3, "c", 10, &[(9, Some(Marker::Root)), (2, Some(Marker::Reply))])];
        let counts = tally_replies(&records, &[record_id(2)]);
        assert_eq!(counts[&record_id(2)], 1);
    }

    #[test]
    fn test_duplicates_count_once() {
        let r = reply(2, "b", 90, &[(1, None)]);
        let counts = tally_replies(&[r.clone(), r], &[record_id(1)]);
        assert_eq!(counts[&record_id(1)], 1);
    }

    #[test]
    fn test_targets_without_replies_are_zero() {
        let counts = tally_replies(&[note(5, "x", 1)], &[record_id(1), record_id(2)]);
        assert_eq!(counts.len(), 2);
        assert!(counts.values().all(|c| *c == 0));
    }
}
