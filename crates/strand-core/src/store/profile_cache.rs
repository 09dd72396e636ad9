//! Process-lifetime profile cache
//!
//! Entries are created on first resolution and never evicted. The map is
//! guarded for concurrent readers and writers; a separate in-flight table
//! lets concurrent requests agree on who fetches which identity, and lets
//! the others wait for that fetch to land.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::models::Profile;

#[derive(Debug, Default)]
pub struct ProfileCache {
    profiles: RwLock<HashMap<String, Profile>>,
    /// Identity -> completion signal of the request fetching it
    in_flight: Mutex<HashMap<String, watch::Receiver<()>>>,
}

/// Identities one request has taken on fetching. Dropping the claim clears
/// their in-flight entries and wakes every request waiting on them, also
/// when the owning future is cancelled mid-fetch.
pub struct ProfileClaim<'a> {
    cache: &'a ProfileCache,
    owned: Vec<String>,
    _done: watch::Sender<()>,
}

impl ProfileClaim<'_> {
    pub fn owned(&self) -> &[String] {
        &self.owned
    }
}

impl Drop for ProfileClaim<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.cache.in_flight.lock();
        for pubkey in &self.owned {
            in_flight.remove(pubkey);
        }
    }
}

/// Fetches owned by other requests that the caller depends on
#[derive(Debug, Default)]
pub struct PendingFetches {
    waits: Vec<watch::Receiver<()>>,
}

impl PendingFetches {
    pub fn len(&self) -> usize {
        self.waits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waits.is_empty()
    }

    /// Resolves once every owning request has released its claim
    pub async fn wait(self) {
        for mut done in self.waits {
            // Only ever closed, never sent on
            let _ = done.changed().await;
        }
    }
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `pubkeys` into cached profiles and identities with no entry.
    /// Repeated identities are reported once.
    pub fn lookup<S: AsRef<str>>(&self, pubkeys: &[S]) -> (HashMap<String, Profile>, Vec<String>) {
        let profiles = self.profiles.read();
        let mut hits = HashMap::new();
        let mut misses: Vec<String> = Vec::new();

        for pubkey in pubkeys.iter().map(AsRef::as_ref) {
            match profiles.get(pubkey) {
                Some(profile) => {
                    hits.insert(pubkey.to_string(), profile.clone());
                }
                None if !misses.iter().any(|m| m == pubkey) => misses.push(pubkey.to_string()),
                None => {}
            }
        }

        (hits, misses)
    }

    /// Take over fetching the uncached identities in `pubkeys` that no other
    /// request is fetching. The check and the insert happen under one lock.
    /// Identities already in flight elsewhere come back as pending fetches
    /// to wait on.
    pub fn claim(&self, pubkeys: &[String]) -> (ProfileClaim<'_>, PendingFetches) {
        let (done, signal) = watch::channel(());
        let mut owned = Vec::new();
        let mut pending = PendingFetches::default();

        let mut in_flight = self.in_flight.lock();
        let profiles = self.profiles.read();
        for pubkey in pubkeys.iter().filter(|pk| !profiles.contains_key(*pk)) {
            match in_flight.get(pubkey) {
                Some(other) => pending.waits.push(other.clone()),
                None => {
                    in_flight.insert(pubkey.clone(), signal.clone());
                    owned.push(pubkey.clone());
                }
            }
        }

        let claim = ProfileClaim {
            cache: self,
            owned,
            _done: done,
        };
        (claim, pending)
    }

    /// Write a freshly resolved batch through to the cache. An entry is only
    /// replaced by a profile at least as new as the one it holds.
    pub fn merge(&self, batch: &HashMap<String, Profile>) {
        if batch.is_empty() {
            return;
        }
        let mut profiles = self.profiles.write();
        for (pubkey, profile) in batch {
            match profiles.get(pubkey) {
                Some(existing) if existing.created_at > profile.created_at => {}
                _ => {
                    profiles.insert(pubkey.clone(), profile.clone());
                }
            }
        }
    }

    pub fn get(&self, pubkey: &str) -> Option<Profile> {
        self.profiles.read().get(pubkey).cloned()
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}
