//! Reply-graph reconstruction
//!
//! Records only carry flat "e" references. A thread is rebuilt by resolving
//! each record's parent (NIP-10), indexing every fetched record by id in an
//! arena, and walking down from the requested record by id lookups. Parent
//! links are ids, never references, and the walk carries a visited set, so
//! hostile input encoding a reply cycle still produces a finite tree.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use super::feed::FeedItem;
use super::record::Record;
use super::tag::Marker;

/// Direct parent of a record:
/// 1. the first "e" tag marked `reply`,
/// 2. otherwise the last "e" tag,
/// 3. otherwise none (the record is a root).
pub fn resolve_parent(record: &Record) -> Option<&str> {
    let marked = record
        .event_refs()
        .find(|tag| tag.marker() == Some(&Marker::Reply))
        .and_then(|tag| tag.event_id());

    marked.or_else(|| record.event_refs().last().and_then(|tag| tag.event_id()))
}

/// Thread root of a record:
/// 1. the first "e" tag marked `root`,
/// 2. otherwise the first "e" tag,
/// 3. otherwise the record itself.
pub fn resolve_root(record: &Record) -> &str {
    record
        .event_refs()
        .find(|tag| tag.marker() == Some(&Marker::Root))
        .or_else(|| record.event_refs().next())
        .and_then(|tag| tag.event_id())
        .unwrap_or(&record.id)
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadNode {
    #[serde(flatten)]
    pub item: FeedItem,
    pub parent_id: Option<String>,
    /// Ascending by `created_at`
    pub children: Vec<ThreadNode>,
}

impl ThreadNode {
    /// Number of nodes in this subtree, including self
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ThreadNode::size).sum::<usize>()
    }

    /// Ids in this subtree, depth-first pre-order
    pub fn ids(&self) -> Vec<&str> {
        let mut out = vec![self.item.record.id.as_str()];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }
}

#[derive(Debug)]
struct ArenaNode {
    record: Record,
    parent_id: Option<String>,
    children: Vec<String>,
}

impl ArenaNode {
    fn new(record: Record) -> Self {
        let parent_id = resolve_parent(&record).map(str::to_string);
        Self {
            record,
            parent_id,
            children: Vec::new(),
        }
    }
}

/// Index of fetched thread records keyed by id
#[derive(Debug)]
pub struct ThreadArena {
    root: ArenaNode,
    nodes: HashMap<String, ArenaNode>,
}

impl ThreadArena {
    /// Index `records` and attach every node except `root` to its resolved
    /// parent when that parent was fetched. Nodes whose parent is missing
    /// stay unattached and never appear in the materialized tree.
    pub fn build(root: Record, records: Vec<Record>) -> Self {
        let mut root = ArenaNode::new(root);
        let mut nodes: HashMap<String, ArenaNode> = HashMap::with_capacity(records.len());

        for record in records {
            if record.id == root.record.id || nodes.contains_key(&record.id) {
                continue;
            }
            nodes.insert(record.id.clone(), ArenaNode::new(record));
        }

        let links: Vec<(String, String)> = nodes
            .iter()
            .filter_map(|(id, node)| {
                let parent = node.parent_id.as_ref()?;
                let known = *parent == root.record.id || nodes.contains_key(parent);
                (parent != id && known).then(|| (parent.clone(), id.clone()))
            })
            .collect();

        for (parent, child) in links {
            if parent == root.record.id {
                root.children.push(child);
            } else if let Some(node) = nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }

        let order: HashMap<String, u64> = nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.record.created_at))
            .collect();
        let by_time = |a: &String, b: &String| order[a].cmp(&order[b]).then_with(|| a.cmp(b));
        root.children.sort_by(by_time);
        for node in nodes.values_mut() {
            node.children.sort_by(by_time);
        }

        Self { root, nodes }
    }

    pub fn root_id(&self) -> &str {
        &self.root.record.id
    }

    /// Number of indexed records, root included
    pub fn len(&self) -> usize {
        self.nodes.len() + 1
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.root_id()).chain(self.nodes.keys().map(String::as_str))
    }

    pub fn authors(&self) -> Vec<String> {
        let authors: BTreeSet<&str> = std::iter::once(&self.root)
            .chain(self.nodes.values())
            .map(|n| n.record.pubkey.as_str())
            .collect();
        authors.into_iter().map(str::to_string).collect()
    }

    /// Convert into a nested tree rooted at the requested record, turning
    /// each record into a feed item with `enrich`.
    pub fn into_tree(self, mut enrich: impl FnMut(Record) -> FeedItem) -> ThreadNode {
        let ThreadArena { root, mut nodes } = self;
        let mut visited = HashSet::from([root.record.id.clone()]);

        let children = root
            .children
            .iter()
            .filter_map(|child| materialize(&mut nodes, child, &mut visited, &mut enrich))
            .collect();

        if !nodes.is_empty() {
            tracing::debug!(
                "Thread {}: {} fetched records not reachable from root",
                root.record.id,
                nodes.len()
            );
        }

        ThreadNode {
            item: enrich(root.record),
            parent_id: root.parent_id,
            children,
        }
    }
}

fn materialize(
    nodes: &mut HashMap<String, ArenaNode>,
    id: &str,
    visited: &mut HashSet<String>,
    enrich: &mut impl FnMut(Record) -> FeedItem,
) -> Option<ThreadNode> {
    if !visited.insert(id.to_string()) {
        return None;
    }
    let node = nodes.remove(id)?;

    let children = node
        .children
        .iter()
        .filter_map(|child| materialize(nodes, child, visited, enrich))
        .collect();

    Some(ThreadNode {
        item: enrich(node.record),
        parent_id: node.parent_id,
        children,
    })
}
