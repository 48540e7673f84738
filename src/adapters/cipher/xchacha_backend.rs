use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Tag, XChaCha20Poly1305, XNonce};
use rand::RngCore;

use crate::core::errors::{ProtectorError, Result};
use crate::core::models::protected_payload::TAG_LEN;
use crate::core::traits::cipher::AeadCipher;

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
const NONCE_LEN: usize = 24;

/// XChaCha20-Poly1305 AEAD backend.
///
/// The 192-bit nonce is drawn from the OS CSPRNG on every call, which
/// keeps the collision probability negligible for the lifetime of a key
/// without any shared counter between processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct XChaChaBackend;

impl XChaChaBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AeadCipher for XChaChaBackend {
    fn nonce_len(&self) -> usize {
        NONCE_LEN
    }

    fn generate_nonce(&self) -> Vec<u8> {
        let mut nonce = vec![0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);
        nonce
    }

    fn seal(
        &self,
        key: &[u8; 32],
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, [u8; TAG_LEN])> {
        if nonce.len() != NONCE_LEN {
            return Err(ProtectorError::EncryptionFailed {
                reason: format!("expected a {NONCE_LEN}-byte nonce, got {}", nonce.len()),
            });
        }

        let cipher = XChaCha20Poly1305::new(key.into());
        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(XNonce::from_slice(nonce), aad, &mut buffer)
            .map_err(|e| ProtectorError::EncryptionFailed {
                reason: e.to_string(),
            })?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_slice());
        Ok((buffer, tag_bytes))
    }

    fn open(
        &self,
        key: &[u8; 32],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<Vec<u8>> {
        if nonce.len() != NONCE_LEN {
            return Err(ProtectorError::tampered(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            )));
        }

        let cipher = XChaCha20Poly1305::new(key.into());
        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                XNonce::from_slice(nonce),
                aad,
                &mut buffer,
                Tag::from_slice(tag),
            )
            .map_err(|_| ProtectorError::tampered("authentication tag mismatch"))?;

        Ok(buffer)
    }
}
