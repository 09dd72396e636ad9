use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use strand_core::models::tag::{parse_identities, parse_identity};
use strand_core::models::{FeedItem, FeedQuery, Projection};
use strand_core::{FeedEngine, KeySigner, SourceGateway};

use super::render::{render_json, IdentityEntry, IdentityList, Render};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Global,
    Home { user: Option<String> },
    Feed { authors: Vec<String> },
    Replies { authors: Vec<String> },
    User { pubkey: String },
    Thread { id: String },
    Following { user: Option<String>, history: bool },
    Followers { user: Option<String> },
    Profile { pubkeys: Vec<String> },
    Notifications { user: Option<String> },
    Post { content: String },
    Reply { id: String, content: String },
    Follow { pubkey: String },
    Unfollow { pubkey: String },
    Events { ids: Vec<String> },
}

impl CliCommand {
    pub fn needs_signer(&self) -> bool {
        matches!(
            self,
            CliCommand::Post { .. }
                | CliCommand::Reply { .. }
                | CliCommand::Follow { .. }
                | CliCommand::Unfollow { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFormat {
    pub pretty: bool,
    pub text: bool,
}

impl OutputFormat {
    fn emit<T: Serialize + Render + ?Sized>(&self, value: &T) -> Result<String> {
        if self.text {
            Ok(value.render(Utc::now()))
        } else {
            render_json(value, self.pretty)
        }
    }
}

/// Who a user-scoped command is about: the explicit argument, else the
/// signing identity, else the configured default user.
pub fn resolve_user(
    explicit: Option<&str>,
    signer: Option<&KeySigner>,
    configured: Option<&str>,
) -> Result<String> {
    if let Some(raw) = explicit {
        return parse_identity(raw).ok_or_else(|| anyhow!("Invalid pubkey: {}", raw));
    }
    if let Some(signer) = signer {
        return Ok(signer.identity());
    }
    match configured {
        Some(raw) => {
            parse_identity(raw).ok_or_else(|| anyhow!("Invalid configured user: {}", raw))
        }
        None => bail!("No user given. Pass a pubkey, --nsec, or set \"user\" in the config"),
    }
}

#[derive(Debug, Serialize)]
struct Published {
    id: String,
}

impl Render for Published {
    fn render(&self, _now: chrono::DateTime<Utc>) -> String {
        format!("Published {}\n", self.id)
    }
}

pub struct Session<'a, G> {
    pub engine: &'a FeedEngine<G>,
    pub signer: Option<&'a KeySigner>,
    pub default_user: Option<&'a str>,
    pub query: FeedQuery,
    pub format: OutputFormat,
}

impl<G: SourceGateway> Session<'_, G> {
    fn user(&self, explicit: Option<&str>) -> Result<String> {
        resolve_user(explicit, self.signer, self.default_user)
    }

    fn signer(&self) -> Result<&KeySigner> {
        self.signer.ok_or_else(|| {
            anyhow!("This command needs a key. Pass --nsec or add credentials to the config")
        })
    }

    async fn identity_list(
        &self,
        title: &str,
        entries: Vec<(String, Option<u64>)>,
    ) -> IdentityList {
        let pubkeys: Vec<&str> = entries.iter().map(|(pk, _)| pk.as_str()).collect();
        let mut profiles = match self.engine.profiles(pubkeys.as_slice()).await {
            Ok(profiles) => profiles,
            Err(e) => {
                tracing::warn!("Profiles unavailable for {}: {}", title, e);
                HashMap::new()
            }
        };

        IdentityList {
            title: title.to_string(),
            entries: entries
                .into_iter()
                .map(|(pubkey, last_seen)| IdentityEntry {
                    profile: profiles.remove(&pubkey),
                    pubkey,
                    last_seen,
                })
                .collect(),
        }
    }

    fn projection_entries(projection: Projection) -> Vec<(String, Option<u64>)> {
        projection.members.into_iter().map(|pk| (pk, None)).collect()
    }

    /// Run `command` and return its formatted output
    pub async fn execute(&self, command: CliCommand) -> Result<String> {
        let engine = self.engine;
        let query = self.query;

        match command {
            CliCommand::Global => self.format.emit(&engine.global_feed(query).await?),
            CliCommand::Home { user } => {
                let user = self.user(user.as_deref())?;
                self.format.emit(&engine.home_feed(&user, query).await?)
            }
            CliCommand::Feed { authors } => {
                self.format.emit(&engine.author_feed(authors.as_slice(), query).await?)
            }
            CliCommand::Replies { authors } => {
                self.format.emit(&engine.replies_feed(authors.as_slice(), query).await?)
            }
            CliCommand::User { pubkey } => {
                let pubkey = self.user(Some(&pubkey))?;
                self.format.emit(&engine.user_posts(&pubkey, query).await?)
            }
            CliCommand::Thread { id } => self.format.emit(&engine.thread(&id).await?),
            CliCommand::Following { user, history } => {
                let user = self.user(user.as_deref())?;
                let entries = if history {
                    engine
                        .following_history(&user)
                        .await?
                        .into_iter()
                        .map(|(pk, ts)| (pk, Some(ts)))
                        .collect()
                } else {
                    Self::projection_entries(engine.following(&user).await?)
                };
                let title = if history { "Followed at some point" } else { "Following" };
                self.format.emit(&self.identity_list(title, entries).await)
            }
            CliCommand::Followers { user } => {
                let user = self.user(user.as_deref())?;
                let entries = Self::projection_entries(engine.followers(&user).await?);
                self.format.emit(&self.identity_list("Followers", entries).await)
            }
            CliCommand::Profile { pubkeys } => {
                let profiles = engine.profiles(pubkeys.as_slice()).await?;
                let entries = parse_identities(&pubkeys);
                let list = IdentityList {
                    title: "Profiles".to_string(),
                    entries: entries
                        .into_iter()
                        .map(|pubkey| IdentityEntry {
                            profile: profiles.get(&pubkey).cloned(),
                            pubkey,
                            last_seen: None,
                        })
                        .collect(),
                };
                self.format.emit(&list)
            }
            CliCommand::Notifications { user } => {
                let user = self.user(user.as_deref())?;
                self.format.emit(&engine.notifications(&user, query).await?)
            }
            CliCommand::Post { content } => {
                let id = engine.publish_note(self.signer()?, &content, None).await?;
                self.format.emit(&Published { id })
            }
            CliCommand::Reply { id, content } => {
                let id = engine
                    .publish_note(self.signer()?, &content, Some(&id))
                    .await?;
                self.format.emit(&Published { id })
            }
            CliCommand::Follow { pubkey } => {
                self.format.emit(&engine.follow(self.signer()?, &pubkey).await?)
            }
            CliCommand::Unfollow { pubkey } => {
                self.format.emit(&engine.unfollow(self.signer()?, &pubkey).await?)
            }
            CliCommand::Events { ids } => {
                let found = engine
                    .records_by_id(ids.as_slice())
                    .await
                    .context("Failed to fetch events")?;
                let mut items: Vec<FeedItem> = found.into_values().map(FeedItem::new).collect();
                items.sort_by(|a, b| {
                    b.record
                        .created_at
                        .cmp(&a.record.created_at)
                        .then_with(|| a.record.id.cmp(&b.record.id))
                });
                self.format.emit(items.as_slice())
            }
        }
    }
}
