use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Stats for records pulled through the gateway
#[derive(Debug, Default, Clone)]
pub struct FetchStats {
    /// Gateway queries issued
    pub queries: u64,
    /// Queries that ran out of time (their partial result was still used)
    pub timeouts: u64,
    /// Queries that failed at the transport level
    pub failures: u64,
    /// Records received by kind, after dedup
    pub by_kind_total: HashMap<u16, u64>,
    /// Total records received, after dedup
    pub total: u64,
    /// Copies of an already-seen record dropped by dedup
    pub duplicates_dropped: u64,
}

impl FetchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&mut self) {
        self.queries += 1;
    }

    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn record(&mut self, kind: u16) {
        self.total += 1;
        *self.by_kind_total.entry(kind).or_insert(0) += 1;
    }

    pub fn record_duplicates(&mut self, dropped: u64) {
        self.duplicates_dropped += dropped;
    }

    /// Get list of kinds sorted by total count (descending)
    pub fn kinds_by_count(&self) -> Vec<(u16, u64)> {
        let mut kinds: Vec<_> = self.by_kind_total.iter().map(|(&k, &c)| (k, c)).collect();
        kinds.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        kinds
    }
}

/// Thread-safe wrapper for fetch stats
#[derive(Debug, Clone)]
pub struct SharedFetchStats {
    inner: Arc<RwLock<FetchStats>>,
}

impl Default for SharedFetchStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedFetchStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(FetchStats::new())),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut FetchStats)) {
        if let Ok(mut stats) = self.inner.write() {
            f(&mut stats);
        }
    }

    pub fn snapshot(&self) -> FetchStats {
        self.inner.read().map(|s| s.clone()).unwrap_or_default()
    }
}
