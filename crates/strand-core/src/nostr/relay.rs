use std::time::Duration;

use nostr_sdk::prelude::{Client, Event, EventId, Filter, Kind, PublicKey, Timestamp};

use super::gateway::{RecordFilter, SourceGateway};
use crate::config::CoreConfig;
use crate::error::{GatewayError, PublishError};
use crate::models::Record;
use crate::stats::SharedFetchStats;

/// Extra time granted past the relay-level timeout before the query is
/// abandoned outright
const FETCH_GRACE: Duration = Duration::from_secs(1);

/// `SourceGateway` backed by a nostr-sdk client connected to a relay set
pub struct RelayGateway {
    client: Client,
    publish_timeout: Duration,
    stats: SharedFetchStats,
}

impl RelayGateway {
    /// Build a client for `config.relays` and connect. Relays that cannot be
    /// added are skipped; having none left is an error.
    pub async fn connect(
        config: &CoreConfig,
        stats: SharedFetchStats,
    ) -> Result<Self, GatewayError> {
        let client = Client::default();

        let mut added = 0usize;
        for url in &config.relays {
            match client.add_relay(url.as_str()).await {
                Ok(_) => added += 1,
                Err(e) => tracing::warn!("Skipping relay {}: {}", url, e),
            }
        }
        if added == 0 {
            return Err(GatewayError::NotConnected);
        }

        let started = std::time::Instant::now();
        if tokio::time::timeout(config.connect_timeout(), client.connect())
            .await
            .is_err()
        {
            tracing::warn!(
                "Relay connect timed out after {:?}; continuing with relays that came up",
                started.elapsed()
            );
        } else {
            tracing::debug!("Connected to {} relays in {:?}", added, started.elapsed());
        }

        Ok(Self {
            client,
            publish_timeout: config.publish_timeout(),
            stats,
        })
    }
}

/// Translate a validated filter. Every value in `RecordFilter` is already
/// lowercase hex, so the parses here cannot fail in practice; anything that
/// does is dropped like any other malformed input.
fn to_nostr_filter(filter: &RecordFilter) -> Filter {
    let mut out = Filter::new();

    if !filter.kinds.is_empty() {
        out = out.kinds(filter.kinds.iter().map(|k| Kind::from(*k)));
    }
    if let Some(authors) = &filter.authors {
        out = out.authors(authors.iter().filter_map(|a| PublicKey::from_hex(a).ok()));
    }
    if let Some(ids) = &filter.ids {
        out = out.ids(ids.iter().filter_map(|id| EventId::from_hex(id).ok()));
    }
    if let Some(ids) = &filter.referenced_ids {
        out = out.events(ids.iter().filter_map(|id| EventId::from_hex(id).ok()));
    }
    if let Some(pubkeys) = &filter.referenced_pubkeys {
        out = out.pubkeys(pubkeys.iter().filter_map(|p| PublicKey::from_hex(p).ok()));
    }
    if let Some(limit) = filter.limit {
        out = out.limit(limit);
    }
    if let Some(until) = filter.until {
        out = out.until(Timestamp::from(until));
    }

    out
}

impl SourceGateway for RelayGateway {
    async fn fetch(
        &self,
        filter: RecordFilter,
        timeout: Duration,
    ) -> Result<Vec<Record>, GatewayError> {
        if filter.matches_nothing() {
            tracing::debug!("Skipping query with an empty constraint: {:?}", filter);
            return Ok(Vec::new());
        }

        let nostr_filter = to_nostr_filter(&filter);
        match tokio::time::timeout(
            timeout + FETCH_GRACE,
            self.client.fetch_events(nostr_filter, timeout),
        )
        .await
        {
            Ok(Ok(events)) => Ok(events.into_iter().map(|e| Record::from_event(&e)).collect()),
            Ok(Err(e)) => Err(GatewayError::Transport(e.to_string())),
            Err(_) => {
                tracing::warn!("Relay query timed out after {:?}: {:?}", timeout, filter);
                self.stats.update(|s| s.record_timeout());
                Ok(Vec::new())
            }
        }
    }

    async fn publish(&self, event: Event) -> Result<String, PublishError> {
        match tokio::time::timeout(self.publish_timeout, self.client.send_event(&event)).await {
            Ok(Ok(output)) => {
                tracing::info!(
                    "Published {} to {} relays ({} failed)",
                    output.id(),
                    output.success.len(),
                    output.failed.len()
                );
                if output.success.is_empty() {
                    return Err(PublishError::Send(format!(
                        "no relay accepted event {}",
                        output.id()
                    )));
                }
                Ok(output.id().to_hex())
            }
            Ok(Err(e)) => Err(PublishError::Send(e.to_string())),
            Err(_) => Err(PublishError::Timeout(self.publish_timeout.as_secs())),
        }
    }
}
