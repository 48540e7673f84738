use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_material::{DerivedKey, FINGERPRINT_LEN, KEY_LEN, MasterKey};
use crate::core::models::purpose_chain::PurposeChain;
use crate::core::traits::deriver::PurposeDeriver;

/// Domain separation salt for the extract step (versioned for future changes).
const SALT: &[u8] = b"data-protector/purpose/v1";

/// HKDF info labels; the encoded purpose chain follows the label.
mod labels {
    pub const ENCRYPTION_KEY: &[u8] = b"enc-key\0";
    pub const FINGERPRINT: &[u8] = b"purpose-fpr\0";
}

/// HKDF-SHA256 purpose deriver.
///
/// ```text
/// PRK         = HKDF-Extract(salt = SALT, ikm = master key)
/// key         = HKDF-Expand(PRK, "enc-key\0"     || chain, 32)
/// fingerprint = HKDF-Expand(PRK, "purpose-fpr\0" || chain, 16)
/// ```
///
/// The fingerprint is keyed by the master key, so it reveals nothing
/// about the namespace to someone without the key ring.
#[derive(Debug, Default, Clone, Copy)]
pub struct HkdfPurposeDeriver;

impl HkdfPurposeDeriver {
    pub fn new() -> Self {
        Self
    }
}

impl PurposeDeriver for HkdfPurposeDeriver {
    fn derive(&self, master: &MasterKey, chain: &PurposeChain) -> Result<DerivedKey> {
        let hkdf = Hkdf::<Sha256>::new(Some(SALT), master.as_bytes());
        let encoded = chain.encode();

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        hkdf.expand_multi_info(&[labels::ENCRYPTION_KEY, encoded.as_slice()], &mut key[..])
            .map_err(|e| ProtectorError::KeyGenerationFailed {
                reason: format!("purpose key expansion failed: {e}"),
            })?;

        let mut fingerprint = [0u8; FINGERPRINT_LEN];
        hkdf.expand_multi_info(&[labels::FINGERPRINT, encoded.as_slice()], &mut fingerprint)
            .map_err(|e| ProtectorError::KeyGenerationFailed {
                reason: format!("purpose fingerprint expansion failed: {e}"),
            })?;

        Ok(DerivedKey::new(key, fingerprint))
    }
}
