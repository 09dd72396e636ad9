use std::collections::HashMap;

use serde::Serialize;

use super::FeedEngine;
use crate::constants::kinds;
use crate::error::Result;
use crate::models::tag::parse_record_id;
use crate::models::{resolve_parent, resolve_root, FeedItem, Record, ThreadArena, ThreadNode};
use crate::nostr::{RecordFilter, SourceGateway};

#[derive(Debug, Clone, Serialize)]
pub struct ThreadView {
    /// Id of the conversation root the requested record belongs to
    pub thread_root: String,
    /// Tree rooted at the requested record
    pub tree: ThreadNode,
    /// Replies could not be fetched; `tree` holds the requested record alone
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "thread", rename_all = "snake_case")]
pub enum ThreadLookup {
    NotFound,
    Found(ThreadView),
}

impl ThreadLookup {
    pub fn found(&self) -> Option<&ThreadView> {
        match self {
            ThreadLookup::Found(view) => Some(view),
            ThreadLookup::NotFound => None,
        }
    }
}

impl<G: SourceGateway> FeedEngine<G> {
    /// Rebuild the conversation below record `id`.
    ///
    /// Replies are gathered with one query for records referencing either
    /// the requested record or its thread root. If that query fails the
    /// requested record is returned alone and flagged as degraded; only a
    /// failure to look up the record itself is an error.
    pub async fn thread(&self, id: &str) -> Result<ThreadLookup> {
        let Some(id) = parse_record_id(id) else {
            return Ok(ThreadLookup::NotFound);
        };
        let Some(target) = self.records_by_id(&[id.as_str()]).await?.remove(&id) else {
            return Ok(ThreadLookup::NotFound);
        };

        let thread_root = resolve_root(&target).to_string();
        let filter = RecordFilter::new()
            .kind(kinds::TEXT_NOTE)
            .referenced_ids(&[id.as_str(), thread_root.as_str()])
            .limit(self.config.thread_fetch_limit);

        let (replies, parent) = tokio::join!(
            self.fetch(filter, self.config.fetch_timeout()),
            self.parent_summaries(std::slice::from_ref(&target))
        );
        let parent = parent
            .unwrap_or_else(|e| {
                tracing::warn!("Parent summary for {} skipped: {}", id, e);
                HashMap::new()
            })
            .remove(&id)
            .map(Box::new);

        let (mut tree, degraded) = match replies {
            Ok(replies) => (self.assemble(target, replies).await, false),
            Err(e) => {
                tracing::warn!("Thread query for {} failed, showing record alone: {}", id, e);
                (self.lone_node(target).await, true)
            }
        };
        tree.item.parent = parent;

        Ok(ThreadLookup::Found(ThreadView {
            thread_root,
            tree,
            degraded,
        }))
    }

    async fn assemble(&self, target: Record, replies: Vec<Record>) -> ThreadNode {
        let arena = ThreadArena::build(target, replies);
        let authors = arena.authors();
        let ids: Vec<&str> = arena.ids().collect();

        let (profiles, counts) = tokio::join!(
            self.profiles_or_empty(&authors),
            self.count_replies(&ids)
        );
        let counts = counts.unwrap_or_else(|e| {
            tracing::warn!("Reply counts for thread {} skipped: {}", arena.root_id(), e);
            HashMap::new()
        });
        tracing::debug!("Thread {}: {} records indexed", arena.root_id(), arena.len());

        arena.into_tree(|record| {
            let author = profiles.get(&record.pubkey).cloned();
            let reply_count = Some(counts.get(&record.id).copied().unwrap_or(0));
            FeedItem {
                record,
                author,
                reply_count,
                parent: None,
            }
        })
    }

    async fn lone_node(&self, target: Record) -> ThreadNode {
        let author = [target.pubkey.as_str()];
        let id = [target.id.as_str()];
        let (profiles, counts) =
            tokio::join!(self.profiles_or_empty(&author), self.count_replies(&id));
        let reply_count = counts
            .ok()
            .map(|c| c.get(&target.id).copied().unwrap_or(0));

        ThreadNode {
            parent_id: resolve_parent(&target).map(str::to_string),
            item: FeedItem {
                author: profiles.get(&target.pubkey).cloned(),
                reply_count,
                parent: None,
                record: target,
            },
            children: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::models::record::test_records::{metadata, note, record_id, reply};
    use crate::models::Marker;
    use crate::testing::MemoryGateway;
    use nostr_sdk::prelude::Keys;

    fn pubkey() -> String {
        Keys::generate().public_key().to_hex()
    }

    fn engine(records: Vec<Record>) -> FeedEngine<MemoryGateway> {
        FeedEngine::new(MemoryGateway::new(records), CoreConfig::default())
    }

    #[tokio::test]
    async fn test_reply_tree_and_count() {
        let (a, b) = (pubkey(), pubkey());
        let engine = engine(vec![
            note(1, &a, 100),
            reply(2, &b, 90, &[(1, Some(Marker::Reply))]),
            metadata(9, &b, 1, r#"{"name":"bob"}"#),
        ]);

        let lookup = engine.thread(&record_id(1)).await.unwrap();
        let view = lookup.found().unwrap();
        assert!(!view.degraded);
        assert_eq!(view.thread_root, record_id(1));
        assert_eq!(view.tree.item.record.id, record_id(1));
        assert_eq!(view.tree.item.reply_count, Some(1));
        assert_eq!(view.tree.children.len(), 1);

        let child = &view.tree.children[0];
        assert_eq!(child.item.record.id, record_id(2));
        assert_eq!(child.item.author_label(), "bob");
        assert_eq!(child.item.reply_count, Some(0));
    }

    #[tokio::test]
    async fn test_thread_from_mid_conversation_record() {
        let (a, b, c) = (pubkey(), pubkey(), pubkey());
        let engine = engine(vec![
            note(1, &a, 10),
            reply(2, &b, 20, &[(1, Some(Marker::Root))]),
            reply(3, &c, 30, &[(1, Some(Marker::Root)), (2, Some(Marker::Reply))]),
            // Sibling branch under the root, not below record 2
            reply(4, &c, 40, &[(1, Some(Marker::Root))]),
        ]);

        let lookup = engine.thread(&record_id(2)).await.unwrap();
        let view = lookup.found().unwrap();
        assert_eq!(view.thread_root, record_id(1));
        assert_eq!(view.tree.ids(), vec![record_id(2).as_str(), record_id(3).as_str()]);
        assert_eq!(view.tree.parent_id, Some(record_id(1)));
        assert_eq!(
            view.tree.item.parent.as_ref().map(|p| p.record.id.clone()),
            Some(record_id(1))
        );
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let engine = engine(vec![note(1, &pubkey(), 10)]);
        let lookup = engine.thread(&record_id(7)).await.unwrap();
        assert!(matches!(lookup, ThreadLookup::NotFound));

        let malformed = engine.thread("not-an-id").await.unwrap();
        assert!(matches!(malformed, ThreadLookup::NotFound));
    }

    #[tokio::test]
    async fn test_failed_reply_query_degrades_to_lone_record() {
        let a = pubkey();
        let gateway = MemoryGateway::new(vec![
            note(1, &a, 100),
            reply(2, &pubkey(), 110, &[(1, None)]),
            metadata(9, &a, 1, r#"{"display_name":"Alice"}"#),
        ]);
        gateway.fail_if(|f| f.limit == Some(500));
        let engine = FeedEngine::new(gateway, CoreConfig::default());

        let lookup = engine.thread(&record_id(1)).await.unwrap();
        let view = lookup.found().unwrap();
        assert!(view.degraded);
        assert!(view.tree.children.is_empty());
        assert_eq!(view.tree.item.author_label(), "Alice");
        assert_eq!(view.tree.item.reply_count, Some(1));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_an_error() {
        let gateway = MemoryGateway::new(vec![note(1, &pubkey(), 100)]);
        gateway.fail_if(|f| f.ids.is_some());
        let engine = FeedEngine::new(gateway, CoreConfig::default());

        assert!(engine.thread(&record_id(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_cyclic_references_terminate() {
        let a = pubkey();
        let engine = engine(vec![
            reply(1, &a, 10, &[(2, None)]),
            reply(2, &a, 20, &[(1, None)]),
            reply(3, &a, 30, &[(1, None)]),
        ]);

        let lookup = engine.thread(&record_id(1)).await.unwrap();
        let view = lookup.found().unwrap();
        let ids = view.tree.ids();
        let unique: std::collections::HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());
        assert!(view.tree.size() <= 3);
    }
}
