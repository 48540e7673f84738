use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::core::errors::{ProtectorError, Result};

/// Length in bytes of master and derived keys.
pub const KEY_LEN: usize = 32;

/// Length in bytes of a purpose fingerprint.
pub const FINGERPRINT_LEN: usize = 16;

/// Raw 256-bit master key held by a key record. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; KEY_LEN]>);

impl MasterKey {
    /// Generate a fresh key from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        rand::rng().fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    /// Build a key from exactly [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| ProtectorError::KeyGenerationFailed {
                reason: format!("expected {KEY_LEN} key bytes, got {}", bytes.len()),
            })?;
        Ok(Self(Zeroizing::new(array)))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Sub-key bound to one purpose chain, plus the fingerprint that
/// identifies that chain under the same master key.
pub struct DerivedKey {
    key: Zeroizing<[u8; KEY_LEN]>,
    fingerprint: [u8; FINGERPRINT_LEN],
}

impl DerivedKey {
    pub fn new(key: Zeroizing<[u8; KEY_LEN]>, fingerprint: [u8; FINGERPRINT_LEN]) -> Self {
        Self { key, fingerprint }
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn fingerprint(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.fingerprint
    }

    /// Constant-time comparison against a fingerprint read from a payload.
    pub fn fingerprint_matches(&self, other: &[u8; FINGERPRINT_LEN]) -> bool {
        self.fingerprint[..].ct_eq(&other[..]).into()
    }
}
