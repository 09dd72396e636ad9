use super::FeedEngine;
use crate::constants::kinds;
use crate::error::Result;
use crate::models::record::sort_newest_first;
use crate::models::tag::{parse_identities, parse_identity};
use crate::models::{FeedQuery, Page, Record};
use crate::nostr::{RecordFilter, SourceGateway};

/// Shown when the home feed had to be replaced by the global feed
pub const HOME_FALLBACK_NOTICE: &str = "Could not load your feed; showing the global feed instead";

impl<G: SourceGateway> FeedEngine<G> {
    /// Sort, cut to the page size and enrich
    async fn page(&self, mut records: Vec<Record>, limit: usize, annotate: bool) -> Page {
        sort_newest_first(&mut records);
        records.truncate(limit);
        Page::new(self.enrich(records, annotate).await)
    }

    fn text_notes(&self, query: &FeedQuery, limit: usize) -> RecordFilter {
        RecordFilter::new()
            .kind(kinds::TEXT_NOTE)
            .limit(limit)
            .until(query.before)
    }

    /// Valid identities from `authors`, capped to what relays accept in one
    /// filter. Identities past the cap are dropped.
    fn author_scope<S: AsRef<str>>(&self, authors: &[S]) -> Vec<String> {
        let mut scope = parse_identities(authors);
        if scope.len() > self.config.max_authors {
            tracing::debug!(
                "Author scope capped at {} (dropped {})",
                self.config.max_authors,
                scope.len() - self.config.max_authors
            );
            scope.truncate(self.config.max_authors);
        }
        scope
    }

    /// Every text note, newest first
    pub async fn global_feed(&self, query: FeedQuery) -> Result<Page> {
        let filter = self.text_notes(&query, query.limit);
        let records = self.fetch(filter, self.config.fetch_timeout()).await?;
        Ok(self.page(records, query.limit, false).await)
    }

    /// Top-level posts (no "e" tags) by `authors`
    pub async fn author_feed<S: AsRef<str>>(
        &self,
        authors: &[S],
        query: FeedQuery,
    ) -> Result<Page> {
        let scope = self.author_scope(authors);
        if scope.is_empty() {
            return Ok(Page::default());
        }

        let filter = self.text_notes(&query, query.limit).authors(&scope);
        let records = self.fetch(filter, self.config.fetch_timeout()).await?;
        let posts: Vec<Record> = records.into_iter().filter(|r| !r.has_event_refs()).collect();
        Ok(self.page(posts, query.limit, false).await)
    }

    /// Replies (at least one "e" tag) by `authors`. The query over-fetches
    /// because most of what comes back is filtered out.
    pub async fn replies_feed<S: AsRef<str>>(
        &self,
        authors: &[S],
        query: FeedQuery,
    ) -> Result<Page> {
        let scope = self.author_scope(authors);
        if scope.is_empty() {
            return Ok(Page::default());
        }

        let fetch_limit = query.limit.saturating_mul(self.config.replies_overfetch.max(1));
        let filter = self.text_notes(&query, fetch_limit).authors(&scope);
        let records = self.fetch(filter, self.config.fetch_timeout()).await?;
        let replies: Vec<Record> = records.into_iter().filter(Record::has_event_refs).collect();
        Ok(self.page(replies, query.limit, true).await)
    }

    /// Everything one author wrote, posts and replies alike
    pub async fn user_posts(&self, pubkey: &str, query: FeedQuery) -> Result<Page> {
        let Some(pubkey) = parse_identity(pubkey) else {
            return Ok(Page::default());
        };

        let filter = self.text_notes(&query, query.limit).author(&pubkey);
        let records = self.fetch(filter, self.config.fetch_timeout()).await?;
        Ok(self.page(records, query.limit, true).await)
    }

    /// Posts by everyone `user` follows, plus their own. Falls back to the
    /// global feed, with a notice, when the personal feed cannot be loaded.
    pub async fn home_feed(&self, user: &str, query: FeedQuery) -> Result<Page> {
        let personal = async {
            let mut authors = self.following(user).await?.members;
            authors.push(user.to_string());
            self.author_feed(&authors, query).await
        };

        match personal.await {
            Ok(page) => Ok(page),
            Err(e) => {
                tracing::warn!("Home feed for {} failed, using global feed: {}", user, e);
                Ok(self.global_feed(query).await?.with_notice(HOME_FALLBACK_NOTICE))
            }
        }
    }

    /// Text notes that mention `user`, excluding their own
    pub async fn notifications(&self, user: &str, query: FeedQuery) -> Result<Page> {
        let Some(user) = parse_identity(user) else {
            return Ok(Page::default());
        };

        let filter = self
            .text_notes(&query, query.limit)
            .referenced_pubkeys(&[user.as_str()]);
        let records = self.fetch(filter, self.config.fetch_timeout()).await?;
        let mentions: Vec<Record> = records.into_iter().filter(|r| r.pubkey != user).collect();
        Ok(self.page(mentions, query.limit, true).await)
    }
}
