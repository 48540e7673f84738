use crate::core::errors::Result;
use crate::core::models::protected_payload::TAG_LEN;

/// Port for authenticated encryption with associated data.
///
/// Implementations live in `adapters::cipher`. The core layer only
/// depends on this trait, never on a concrete AEAD.
pub trait AeadCipher: Send + Sync {
    /// Nonce length this cipher expects.
    fn nonce_len(&self) -> usize;

    /// Fresh random nonce, wide enough that reuse under one key is negligible.
    fn generate_nonce(&self) -> Vec<u8>;

    /// Encrypt `plaintext`, returning the ciphertext and a detached tag.
    fn seal(
        &self,
        key: &[u8; 32],
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, [u8; TAG_LEN])>;

    /// Verify `tag` over `aad` and `ciphertext`, then decrypt.
    fn open(
        &self,
        key: &[u8; 32],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<Vec<u8>>;
}
