//! Feed aggregation engine
//!
//! `FeedEngine` owns the gateway handle, the profile cache and the fetch
//! stats. It is cheap to clone; clones share all three, so one engine built
//! at startup can serve any number of concurrent requests.

mod contacts;
mod feeds;
mod publish;
mod thread;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::config::CoreConfig;
use crate::constants::{kinds, PROFILE_FETCH_CONCURRENCY};
use crate::error::{GatewayError, Result};
use crate::models::projection::profile_projection;
use crate::models::tag::{parse_identities, parse_record_ids};
use crate::models::{dedup_records, resolve_parent, tally_replies, FeedItem, Profile, Record};
use crate::nostr::{RecordFilter, SourceGateway};
use crate::stats::SharedFetchStats;
use crate::store::ProfileCache;

pub use contacts::ContactListChange;
pub use thread::{ThreadLookup, ThreadView};

pub struct FeedEngine<G> {
    gateway: Arc<G>,
    cache: Arc<ProfileCache>,
    config: CoreConfig,
    stats: SharedFetchStats,
}

impl<G> Clone for FeedEngine<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<G: SourceGateway> FeedEngine<G> {
    pub fn new(gateway: G, config: CoreConfig) -> Self {
        Self::with_parts(
            Arc::new(gateway),
            Arc::new(ProfileCache::new()),
            config,
            SharedFetchStats::new(),
        )
    }

    pub fn with_parts(
        gateway: Arc<G>,
        cache: Arc<ProfileCache>,
        config: CoreConfig,
        stats: SharedFetchStats,
    ) -> Self {
        Self {
            gateway,
            cache,
            config,
            stats,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn stats(&self) -> &SharedFetchStats {
        &self.stats
    }

    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Run one gateway query and collapse duplicate deliveries
    pub(crate) async fn fetch(
        &self,
        filter: RecordFilter,
        timeout: Duration,
    ) -> std::result::Result<Vec<Record>, GatewayError> {
        if filter.matches_nothing() {
            return Ok(Vec::new());
        }

        self.stats.update(|s| s.record_query());
        let raw = match self.gateway.fetch(filter, timeout).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Gateway query failed: {}", e);
                self.stats.update(|s| s.record_failure());
                return Err(e);
            }
        };

        let received = raw.len();
        let records = dedup_records(raw);
        let dropped = (received - records.len()) as u64;
        self.stats.update(|s| {
            s.record_duplicates(dropped);
            for record in &records {
                s.record(record.kind);
            }
        });

        Ok(records)
    }

    /// Resolve profiles for `pubkeys`, serving what the cache holds and
    /// querying only the rest. Malformed identities are skipped.
    ///
    /// Identities another request is already fetching are not queried
    /// again: this request waits for that fetch to finish and then reads
    /// them from the cache.
    pub async fn profiles<S: AsRef<str>>(
        &self,
        pubkeys: &[S],
    ) -> Result<HashMap<String, Profile>> {
        let wanted = parse_identities(pubkeys);
        let (mut found, misses) = self.cache.lookup(&wanted);
        if misses.is_empty() {
            return Ok(found);
        }

        let (claim, pending) = self.cache.claim(&misses);
        tracing::debug!(
            "Profiles: {} cached, {} to fetch, {} in flight elsewhere",
            found.len(),
            claim.owned().len(),
            pending.len()
        );

        let batches: Vec<std::result::Result<Vec<Record>, GatewayError>> =
            stream::iter(claim.owned().chunks(self.config.max_authors.max(1)))
                .map(|chunk| {
                    let filter = RecordFilter::new().kind(kinds::METADATA).authors(chunk);
                    self.fetch(filter, self.config.fetch_timeout())
                })
                .buffer_unordered(PROFILE_FETCH_CONCURRENCY)
                .collect()
                .await;

        let mut records = Vec::new();
        let mut first_error = None;
        let batch_count = batches.len();
        let mut failed = 0usize;
        for batch in batches {
            match batch {
                Ok(batch) => records.extend(batch),
                Err(e) => {
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        let fetched = profile_projection(&records);
        self.cache.merge(&fetched);
        // Release before waiting so two requests never wait on each other
        drop(claim);

        if failed == batch_count {
            if let Some(e) = first_error {
                return Err(e.into());
            }
        }
        pending.wait().await;

        for pubkey in misses {
            let profile = fetched
                .get(&pubkey)
                .cloned()
                .or_else(|| self.cache.get(&pubkey));
            if let Some(profile) = profile {
                found.insert(pubkey, profile);
            }
        }
        Ok(found)
    }

    /// Fetch records by id. Malformed ids are skipped; ids no relay
    /// returned are absent from the map.
    pub async fn records_by_id<S: AsRef<str>>(&self, ids: &[S]) -> Result<HashMap<String, Record>> {
        let ids = parse_record_ids(ids);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let filter = RecordFilter::new().ids(&ids).limit(ids.len());
        let records = self.fetch(filter, self.config.fetch_timeout()).await?;
        Ok(records.into_iter().map(|r| (r.id.clone(), r)).collect())
    }

    /// Number of text notes replying to each of `ids`
    pub async fn count_replies<S: AsRef<str>>(&self, ids: &[S]) -> Result<HashMap<String, u32>> {
        let ids = parse_record_ids(ids);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let filter = RecordFilter::new()
            .kind(kinds::TEXT_NOTE)
            .referenced_ids(&ids);
        let replies = self.fetch(filter, self.config.fetch_timeout()).await?;
        Ok(tally_replies(&replies, &ids))
    }

    /// Summaries of the posts `records` reply to, keyed by the replying
    /// record's id. Parents no relay returned are left out.
    pub(crate) async fn parent_summaries(
        &self,
        records: &[Record],
    ) -> Result<HashMap<String, FeedItem>> {
        let links: Vec<(&str, &str)> = records
            .iter()
            .filter_map(|r| resolve_parent(r).map(|parent| (r.id.as_str(), parent)))
            .collect();
        if links.is_empty() {
            return Ok(HashMap::new());
        }

        let parent_ids: Vec<&str> = links
            .iter()
            .map(|(_, parent)| *parent)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let parents = self.records_by_id(&parent_ids).await?;

        let authors: Vec<&str> = parents.values().map(|p| p.pubkey.as_str()).collect();
        let profiles = self.profiles_or_empty(&authors).await;

        Ok(links
            .into_iter()
            .filter_map(|(child, parent)| {
                let record = parents.get(parent)?.clone();
                let author = profiles.get(&record.pubkey).cloned();
                Some((child.to_string(), FeedItem::new(record).with_author(author)))
            })
            .collect())
    }

    /// Profile resolution for enrichment, where failure only costs the
    /// author labels
    pub(crate) async fn profiles_or_empty<S: AsRef<str>>(
        &self,
        pubkeys: &[S],
    ) -> HashMap<String, Profile> {
        self.profiles(pubkeys).await.unwrap_or_else(|e| {
            tracing::warn!("Profile enrichment skipped: {}", e);
            HashMap::new()
        })
    }

    /// Turn fetched records into feed items with author profiles, and
    /// optionally reply counts and parent summaries. Enrichment failures
    /// degrade to missing annotations; the records themselves are kept.
    pub(crate) async fn enrich(&self, records: Vec<Record>, annotate: bool) -> Vec<FeedItem> {
        let authors: Vec<&str> = records
            .iter()
            .map(|r| r.pubkey.as_str())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let (profiles, annotations) = tokio::join!(self.profiles_or_empty(&authors), async {
            if !annotate {
                return None;
            }
            let (parents, counts) =
                tokio::join!(self.parent_summaries(&records), self.count_replies(&ids));
            Some((
                parents.unwrap_or_else(|e| {
                    tracing::warn!("Parent summaries skipped: {}", e);
                    HashMap::new()
                }),
                counts.unwrap_or_else(|e| {
                    tracing::warn!("Reply counts skipped: {}", e);
                    HashMap::new()
                }),
            ))
        });

        let (mut parents, counts) = match annotations {
            Some((parents, counts)) => (parents, Some(counts)),
            None => (HashMap::new(), None),
        };

        records
            .into_iter()
            .map(|record| {
                let author = profiles.get(&record.pubkey).cloned();
                let reply_count = counts
                    .as_ref()
                    .map(|c| c.get(&record.id).copied().unwrap_or(0));
                let parent = parents.remove(&record.id).map(Box::new);
                FeedItem {
                    record,
                    author,
                    reply_count,
                    parent,
                }
            })
            .collect()
    }
}
