use super::FeedEngine;
use crate::constants::kinds;
use crate::error::Result;
use crate::models::tag::parse_record_id;
use crate::nostr::{reply_tags, KeySigner, SourceGateway};

impl<G: SourceGateway> FeedEngine<G> {
    /// Sign and publish a text note, optionally as a reply. Returns the new
    /// record's id. A malformed `reply_to` publishes a top-level note.
    pub async fn publish_note(
        &self,
        signer: &KeySigner,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<String> {
        let tags = match reply_to.and_then(parse_record_id) {
            Some(parent_id) => {
                let parent = match self.records_by_id(&[parent_id.as_str()]).await {
                    Ok(mut found) => found.remove(&parent_id),
                    Err(e) => {
                        tracing::warn!("Could not fetch parent {}: {}", parent_id, e);
                        None
                    }
                };
                reply_tags(&parent_id, parent.as_ref())
            }
            None => Vec::new(),
        };

        let event = signer.sign(kinds::TEXT_NOTE, content, &tags)?;
        let id = self.gateway.publish(event).await?;
        tracing::info!("Published note {}", id);
        Ok(id)
    }
}
