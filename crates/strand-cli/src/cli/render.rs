//! Output formatting: JSON for scripts, plain text for people

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use strand_core::engine::ThreadLookup;
use strand_core::models::feed::short_pubkey;
use strand_core::models::{FeedItem, Page, Profile, ThreadNode};
use strand_core::ContactListChange;

pub fn render_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize output")
    } else {
        serde_json::to_string(value).context("Failed to serialize output")
    }
}

/// Coarse relative age, e.g. "5m ago"
pub fn time_ago(timestamp: u64, now: DateTime<Utc>) -> String {
    let diff = (now.timestamp() - timestamp as i64).max(0) as f64;
    if diff < 60.0 {
        return if diff > 1.0 {
            format!("{}s ago", diff as u64)
        } else {
            "just now".to_string()
        };
    }

    let minutes = diff / 60.0;
    let hours = minutes / 60.0;
    let days = hours / 24.0;
    if minutes < 60.0 {
        format!("{}m ago", minutes as u64)
    } else if hours < 24.0 {
        format!("{}h ago", hours as u64)
    } else if days < 7.0 {
        format!("{}d ago", days as u64)
    } else if days / 7.0 < 4.0 {
        format!("{}w ago", (days / 7.0) as u64)
    } else if days / 30.44 < 12.0 {
        format!("{}mo ago", (days / 30.44) as u64)
    } else {
        format!("{}y ago", (days / 365.25) as u64)
    }
}

/// Human-readable text form
pub trait Render {
    fn render(&self, now: DateTime<Utc>) -> String;
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn write_item(out: &mut String, item: &FeedItem, indent: usize, now: DateTime<Utc>) {
    let pad = " ".repeat(indent);
    let _ = writeln!(
        out,
        "{}{} · {} [{}]",
        pad,
        item.author_label(),
        time_ago(item.record.created_at, now),
        short_id(&item.record.id)
    );
    if let Some(parent) = &item.parent {
        let snippet: String = parent.record.content.chars().take(60).collect();
        let _ = writeln!(out, "{}  re {}: {}", pad, parent.author_label(), snippet);
    }
    for line in item.record.content.lines().filter(|l| !l.trim().is_empty()) {
        let _ = writeln!(out, "{}  {}", pad, line.trim());
    }
    if let Some(count) = item.reply_count {
        let noun = if count == 1 { "reply" } else { "replies" };
        let _ = writeln!(out, "{}  {} {}", pad, count, noun);
    }
}

impl Render for [FeedItem] {
    fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        for item in self {
            write_item(&mut out, item, 0, now);
            out.push('\n');
        }
        out
    }
}

impl Render for Page {
    fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        if let Some(notice) = &self.notice {
            let _ = writeln!(out, "! {}\n", notice);
        }
        if self.items.is_empty() {
            out.push_str("Nothing here yet.\n");
        }
        out.push_str(&self.items.render(now));
        if let Some(cursor) = self.next_cursor {
            let _ = writeln!(out, "More: --before {}", cursor.before);
        }
        out
    }
}

fn write_node(out: &mut String, node: &ThreadNode, depth: usize, now: DateTime<Utc>) {
    write_item(out, &node.item, depth * 2, now);
    for child in &node.children {
        write_node(out, child, depth + 1, now);
    }
}

impl Render for ThreadLookup {
    fn render(&self, now: DateTime<Utc>) -> String {
        let ThreadLookup::Found(view) = self else {
            return "Thread not found.\n".to_string();
        };

        let mut out = String::new();
        if view.degraded {
            out.push_str("! Replies could not be loaded\n\n");
        }
        write_node(&mut out, &view.tree, 0, now);
        out
    }
}

/// An identity with its resolved profile, for follow lists and lookups
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityEntry {
    pub pubkey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    /// Newest contact list this identity appeared in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityList {
    pub title: String,
    pub entries: Vec<IdentityEntry>,
}

impl Render for IdentityList {
    fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = format!("{} ({})\n", self.title, self.entries.len());
        for entry in &self.entries {
            let name = entry
                .profile
                .as_ref()
                .and_then(Profile::display_name)
                .map(str::to_string)
                .unwrap_or_else(|| short_pubkey(&entry.pubkey));
            let _ = write!(out, "  {}  {}", name, entry.pubkey);
            if let Some(seen) = entry.last_seen {
                let _ = write!(out, "  (last listed {})", time_ago(seen, now));
            }
            if let Some(about) = entry.profile.as_ref().and_then(|p| p.about.as_deref()) {
                let about: String = about.chars().take(60).collect();
                let _ = write!(out, "\n    {}", about.replace('\n', " "));
            }
            out.push('\n');
        }
        out
    }
}

impl Render for ContactListChange {
    fn render(&self, _now: DateTime<Utc>) -> String {
        match self {
            ContactListChange::Published(id) => format!("Contact list updated: {}\n", id),
            ContactListChange::Unchanged => "Contact list already up to date.\n".to_string(),
        }
    }
}
