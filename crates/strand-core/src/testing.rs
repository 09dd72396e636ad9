//! In-memory gateway for engine tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nostr_sdk::prelude::Event;
use parking_lot::Mutex;

use crate::error::{GatewayError, PublishError};
use crate::models::record::sort_newest_first;
use crate::models::Record;
use crate::nostr::{RecordFilter, SourceGateway};

type FailurePredicate = Box<dyn Fn(&RecordFilter) -> bool + Send + Sync>;

/// Answers queries from a fixed record set, newest first, honoring every
/// filter constraint including `limit`. Every query is logged so tests can
/// assert on round trips.
#[derive(Default)]
pub struct MemoryGateway {
    records: Mutex<Vec<Record>>,
    calls: Mutex<Vec<RecordFilter>>,
    failures: Mutex<Vec<FailurePredicate>>,
    failing_kinds: Mutex<HashSet<u16>>,
    deliver_twice: AtomicBool,
    reject_publish: AtomicBool,
    published: Mutex<Vec<Event>>,
    delay: Mutex<Option<Duration>>,
}

impl MemoryGateway {
    pub fn new(records: Vec<Record>) -> Self {
        let gateway = Self::default();
        *gateway.records.lock() = records;
        gateway
    }

    pub fn insert(&self, record: Record) {
        self.records.lock().push(record);
    }

    /// Queries that ask for `kind` fail with a transport error
    pub fn fail_kind(&self, kind: u16) {
        self.failing_kinds.lock().insert(kind);
    }

    pub fn fail_if(&self, predicate: impl Fn(&RecordFilter) -> bool + Send + Sync + 'static) {
        self.failures.lock().push(Box::new(predicate));
    }

    /// Return each matching record twice, as overlapping relays do
    pub fn deliver_twice(&self) {
        self.deliver_twice.store(true, Ordering::SeqCst);
    }

    /// Every query sleeps for `delay` before answering, so concurrent
    /// requests overlap
    pub fn slow(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn reject_publish(&self) {
        self.reject_publish.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordFilter> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for_kind(&self, kind: u16) -> Vec<RecordFilter> {
        self.calls
            .lock()
            .iter()
            .filter(|f| f.kinds.contains(&kind))
            .cloned()
            .collect()
    }

    pub fn published(&self) -> Vec<Event> {
        self.published.lock().clone()
    }

    fn should_fail(&self, filter: &RecordFilter) -> bool {
        let kinds = self.failing_kinds.lock();
        filter.kinds.iter().any(|k| kinds.contains(k))
            || self.failures.lock().iter().any(|fail| fail(filter))
    }
}

impl SourceGateway for MemoryGateway {
    async fn fetch(
        &self,
        filter: RecordFilter,
        _timeout: Duration,
    ) -> Result<Vec<Record>, GatewayError> {
        self.calls.lock().push(filter.clone());
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail(&filter) {
            return Err(GatewayError::Transport("injected failure".into()));
        }

        let mut matched: Vec<Record> = self
            .records
            .lock()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        sort_newest_first(&mut matched);
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }

        if self.deliver_twice.load(Ordering::SeqCst) {
            let copies = matched.clone();
            matched.extend(copies);
        }
        Ok(matched)
    }

    async fn publish(&self, event: Event) -> Result<String, PublishError> {
        if self.reject_publish.load(Ordering::SeqCst) {
            return Err(PublishError::Send("relay rejected event".into()));
        }
        let id = event.id.to_hex();
        self.insert(Record::from_event(&event));
        self.published.lock().push(event);
        Ok(id)
    }
}
