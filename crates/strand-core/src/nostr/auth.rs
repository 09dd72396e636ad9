use nostr_sdk::nips::nip49::EncryptedSecretKey;
use nostr_sdk::prelude::{Event, EventBuilder, FromBech32, Keys, Kind, SecretKey, Tag};

use crate::error::KeyError;
use crate::models::Tag as RecordTag;

/// Identity able to sign records, built from raw key material
#[derive(Clone)]
pub struct KeySigner {
    keys: Keys,
}

impl std::fmt::Debug for KeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySigner")
            .field("pubkey", &self.identity())
            .finish_non_exhaustive()
    }
}

impl KeySigner {
    /// Accepts an nsec or hex secret key, or an ncryptsec when `password`
    /// is given.
    pub fn from_secret(material: &str, password: Option<&str>) -> Result<Self, KeyError> {
        let material = material.trim();

        let secret_key = if material.starts_with("ncryptsec") {
            let password = password
                .filter(|p| !p.is_empty())
                .ok_or_else(|| KeyError::Invalid("encrypted key requires a password".into()))?;
            let encrypted = EncryptedSecretKey::from_bech32(material)
                .map_err(|e| KeyError::Invalid(e.to_string()))?;
            encrypted
                .decrypt(password)
                .map_err(|e| KeyError::Invalid(e.to_string()))?
        } else {
            SecretKey::parse(material).map_err(|e| KeyError::Invalid(e.to_string()))?
        };

        Ok(Self {
            keys: Keys::new(secret_key),
        })
    }

    pub fn from_keys(keys: Keys) -> Self {
        Self { keys }
    }

    /// Public identity as lowercase hex
    pub fn identity(&self) -> String {
        self.keys.public_key().to_hex()
    }

    /// Sign a record carrying exactly `tags`, including any "p" tag naming
    /// the signer (a self-follow in a contact list stays put).
    pub fn sign(&self, kind: u16, content: &str, tags: &[RecordTag]) -> Result<Event, KeyError> {
        let tags = tags
            .iter()
            .map(|tag| Tag::parse(tag.to_parts()).map_err(|e| KeyError::Signing(e.to_string())))
            .collect::<Result<Vec<Tag>, KeyError>>()?;

        EventBuilder::new(Kind::from(kind), content)
            .tags(tags)
            .allow_self_tagging()
            .sign_with_keys(&self.keys)
            .map_err(|e| KeyError::Signing(e.to_string()))
    }
}
