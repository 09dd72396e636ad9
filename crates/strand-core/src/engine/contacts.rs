use serde::Serialize;

use super::FeedEngine;
use crate::constants::kinds;
use crate::error::Result;
use crate::models::projection::{
    contact_projection, follower_projection, following_history, resolve_latest,
};
use crate::models::tag::parse_identity;
use crate::models::{Projection, Record};
use crate::nostr::{edit_contact_tags, ContactEdit, KeySigner, RecordFilter, SourceGateway};

/// Outcome of a follow or unfollow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "id", rename_all = "snake_case")]
pub enum ContactListChange {
    /// A new contact list was published with this id
    Published(String),
    /// The current list already reflected the request
    Unchanged,
}

impl<G: SourceGateway> FeedEngine<G> {
    async fn contact_lists(&self, filter: RecordFilter) -> Result<Vec<Record>> {
        Ok(self.fetch(filter, self.config.contact_timeout()).await?)
    }

    /// Who `user` follows according to their newest contact list
    pub async fn following(&self, user: &str) -> Result<Projection> {
        let Some(user) = parse_identity(user) else {
            return Ok(Projection::empty(user));
        };

        let filter = RecordFilter::new().kind(kinds::CONTACT_LIST).author(&user);
        let records = self.contact_lists(filter).await?;
        let projection = contact_projection(&records, &user);
        tracing::debug!(
            "{} follows {} identities ({} lists fetched)",
            user,
            projection.len(),
            records.len()
        );
        Ok(projection)
    }

    /// Who currently follows `user`. Candidate lists come from a p-tag
    /// query, then each author's newest list must still name `user`.
    pub async fn followers(&self, user: &str) -> Result<Projection> {
        let Some(user) = parse_identity(user) else {
            return Ok(Projection::empty(user));
        };

        let filter = RecordFilter::new()
            .kind(kinds::CONTACT_LIST)
            .referenced_pubkeys(&[user.as_str()])
            .limit(self.config.follower_fetch_limit);
        let records = self.contact_lists(filter).await?;
        let projection = follower_projection(&records, &user);
        tracing::debug!(
            "{} verified followers of {} from {} candidate lists",
            projection.len(),
            user,
            records.len()
        );
        Ok(projection)
    }

    /// Every identity `user` has followed across the contact lists relays
    /// still hold, most recently seen first
    pub async fn following_history(&self, user: &str) -> Result<Vec<(String, u64)>> {
        let Some(user) = parse_identity(user) else {
            return Ok(Vec::new());
        };

        let filter = RecordFilter::new().kind(kinds::CONTACT_LIST).author(&user);
        let records = self.contact_lists(filter).await?;
        Ok(following_history(&records, &user))
    }

    pub async fn follow(&self, signer: &KeySigner, pubkey: &str) -> Result<ContactListChange> {
        match parse_identity(pubkey) {
            Some(target) => self.edit_contacts(signer, ContactEdit::Follow(target)).await,
            None => Ok(ContactListChange::Unchanged),
        }
    }

    pub async fn unfollow(&self, signer: &KeySigner, pubkey: &str) -> Result<ContactListChange> {
        match parse_identity(pubkey) {
            Some(target) => self.edit_contacts(signer, ContactEdit::Unfollow(target)).await,
            None => Ok(ContactListChange::Unchanged),
        }
    }

    /// Rewrite the signer's newest contact list with `edit` applied. Content
    /// and unrelated tags are carried over; nothing is published when the
    /// edit is a no-op.
    async fn edit_contacts(
        &self,
        signer: &KeySigner,
        edit: ContactEdit,
    ) -> Result<ContactListChange> {
        let owner = signer.identity();
        let filter = RecordFilter::new().kind(kinds::CONTACT_LIST).author(&owner);
        let records = self.contact_lists(filter).await?;

        let latest = resolve_latest(&records, &owner, kinds::CONTACT_LIST);
        let (tags, content) = match latest {
            Some(list) => (list.tags.as_slice(), list.content.as_str()),
            None if matches!(edit, ContactEdit::Unfollow(_)) => {
                tracing::debug!("No contact list for {}; nothing to unfollow", owner);
                return Ok(ContactListChange::Unchanged);
            }
            None => (&[][..], ""),
        };

        let Some(new_tags) = edit_contact_tags(tags, &edit) else {
            tracing::debug!("Contact list for {} already reflects {:?}", owner, edit);
            return Ok(ContactListChange::Unchanged);
        };

        let event = signer.sign(kinds::CONTACT_LIST, content, &new_tags)?;
        let id = self.gateway.publish(event).await?;
        tracing::info!("Published contact list {} ({:?})", id, edit);
        Ok(ContactListChange::Published(id))
    }
}
