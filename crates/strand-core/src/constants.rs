//! Application-wide constants
//!
//! Centralized location for relay defaults, query caps and timeouts
//! that are used across multiple modules.

/// Relays queried when no configuration overrides them
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://nostr.wine",
    "wss://relay.snort.social",
];

// Feed defaults
pub const DEFAULT_FEED_LIMIT: usize = 20;

/// Many relays reject filters with more than a few hundred authors
pub const MAX_FILTER_AUTHORS: usize = 250;

/// The replies feed drops top-level notes after fetching, so it asks for more
pub const REPLIES_OVERFETCH_FACTOR: usize = 4;

// Thread and follower query caps
pub const THREAD_FETCH_LIMIT: usize = 500;
pub const FOLLOWER_FETCH_LIMIT: usize = 500;

/// Concurrent profile batches in flight for a single request
pub const PROFILE_FETCH_CONCURRENCY: usize = 4;

// Timeouts (seconds)
pub const FETCH_TIMEOUT_SECS: u64 = 5;
pub const CONTACT_LIST_TIMEOUT_SECS: u64 = 10;
pub const PUBLISH_TIMEOUT_SECS: u64 = 5;
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

// Nostr event kinds consumed by the engine
pub mod kinds {
    /// Metadata (profiles)
    pub const METADATA: u16 = 0;
    /// Text note (post or reply)
    pub const TEXT_NOTE: u16 = 1;
    /// Contact list (follows)
    pub const CONTACT_LIST: u16 = 3;
}
