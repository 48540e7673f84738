use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_material::MasterKey;
use crate::core::models::key_record::{KeyRecord, KeyWrapping};
use crate::core::models::protected_payload::TAG_LEN;
use crate::core::traits::cipher::AeadCipher;

const AAD_PREFIX: &[u8] = b"data-protector-key:";

/// Seals master keys before they reach the store, and opens them on load.
///
/// Without a key-encryption key (KEK) material is stored as raw bytes
/// and every write logs a warning.
pub struct KeyWrapper {
    kek: Option<MasterKey>,
    cipher: Arc<dyn AeadCipher>,
}

impl KeyWrapper {
    pub fn new(kek: Option<MasterKey>, cipher: Arc<dyn AeadCipher>) -> Self {
        Self { kek, cipher }
    }

    fn aad(id: &Uuid) -> Vec<u8> {
        [AAD_PREFIX, id.as_bytes().as_slice()].concat()
    }

    /// Wrapping mode new records will be written with.
    pub fn wrapping(&self) -> KeyWrapping {
        match self.kek {
            Some(_) => KeyWrapping::Xchacha20poly1305,
            None => KeyWrapping::None,
        }
    }

    /// Produce the stored form of `key` for the record `id`.
    pub fn seal_key(&self, id: &Uuid, key: &MasterKey) -> Result<Vec<u8>> {
        let Some(kek) = &self.kek else {
            warn!(
                key_id = %id,
                "no key-encryption key configured; key material is persisted unencrypted"
            );
            return Ok(key.as_bytes().to_vec());
        };

        let nonce = self.cipher.generate_nonce();
        let (ct, tag) = self
            .cipher
            .seal(kek.as_bytes(), &nonce, &Self::aad(id), key.as_bytes())?;

        let mut out = Vec::with_capacity(nonce.len() + ct.len() + TAG_LEN);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct);
        out.extend_from_slice(&tag);
        Ok(out)
    }

    /// Recover the master key held by `record`.
    pub fn open_key(&self, record: &KeyRecord) -> Result<MasterKey> {
        match record.wrapping {
            KeyWrapping::None => MasterKey::from_slice(&record.key_material),
            KeyWrapping::Xchacha20poly1305 => {
                let kek = self
                    .kek
                    .as_ref()
                    .ok_or_else(|| ProtectorError::ConfigurationError {
                        detail: format!(
                            "key {} is encrypted at rest but no key-encryption key is configured \
                             (set DP_KEY_ENCRYPTION_KEY)",
                            record.id
                        ),
                    })?;

                let nonce_len = self.cipher.nonce_len();
                let material = &record.key_material;
                if material.len() < nonce_len + TAG_LEN {
                    return Err(ProtectorError::ConfigurationError {
                        detail: format!("wrapped key {} is truncated", record.id),
                    });
                }
                let (nonce, rest) = material.split_at(nonce_len);
                let (ct, tag_bytes) = rest.split_at(rest.len() - TAG_LEN);
                let mut tag = [0u8; TAG_LEN];
                tag.copy_from_slice(tag_bytes);

                let raw = zeroize::Zeroizing::new(
                    self.cipher
                        .open(kek.as_bytes(), nonce, &Self::aad(&record.id), ct, &tag)
                        .map_err(|_| ProtectorError::ConfigurationError {
                            detail: format!(
                                "key {} could not be unwrapped; the key-encryption key is wrong",
                                record.id
                            ),
                        })?,
                );
                MasterKey::from_slice(&raw)
            }
        }
    }
}
