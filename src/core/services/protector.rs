use std::sync::Arc;

use tracing::debug;

use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_record::KeyStatus;
use crate::core::models::key_ring::{KeyRing, RingEntry};
use crate::core::models::protected_payload::ProtectedPayload;
use crate::core::models::purpose_chain::PurposeChain;
use crate::core::services::key_ring_provider::KeyRingProvider;
use crate::core::traits::cipher::AeadCipher;
use crate::core::traits::deriver::PurposeDeriver;

/// Caller-facing encrypt/decrypt unit bound to one purpose chain.
///
/// Each call is atomic: it either returns a result or fails. Only
/// `protect` may write, and only a key the ring provider had to generate.
#[derive(Clone)]
pub struct Protector {
    rings: Arc<KeyRingProvider>,
    deriver: Arc<dyn PurposeDeriver>,
    cipher: Arc<dyn AeadCipher>,
    chain: PurposeChain,
}

impl Protector {
    pub fn new(
        rings: Arc<KeyRingProvider>,
        deriver: Arc<dyn PurposeDeriver>,
        cipher: Arc<dyn AeadCipher>,
        chain: PurposeChain,
    ) -> Self {
        Self {
            rings,
            deriver,
            cipher,
            chain,
        }
    }

    pub fn purpose_chain(&self) -> &PurposeChain {
        &self.chain
    }

    /// A protector for a sub-purpose of this one, sharing its key ring.
    pub fn create_protector(&self, purpose: &str) -> Result<Self> {
        Ok(Self {
            chain: self.chain.extend(purpose)?,
            ..self.clone()
        })
    }

    /// Encrypt `plaintext` under the active key and this protector's purpose.
    pub fn protect(&self, plaintext: &[u8]) -> Result<ProtectedPayload> {
        if plaintext.is_empty() {
            return Err(ProtectorError::EmptyInput { what: "plaintext" });
        }

        let ring = self.rings.get_ring()?;
        let entry = ring
            .active()
            .ok_or_else(|| ProtectorError::KeyGenerationFailed {
                reason: "key ring has no active key".into(),
            })?;

        let derived = self.deriver.derive(&entry.key, &self.chain)?;
        let nonce = self.cipher.generate_nonce();
        let aad = ProtectedPayload::header_bytes(&entry.record.id, derived.fingerprint(), &nonce)?;
        let (ciphertext, tag) = self.cipher.seal(derived.key(), &nonce, &aad, plaintext)?;

        Ok(ProtectedPayload {
            key_id: entry.record.id,
            purpose_fingerprint: *derived.fingerprint(),
            nonce,
            ciphertext,
            tag,
        })
    }

    /// Verify and decrypt a payload produced for this protector's purpose.
    ///
    /// Read-only: a failed unprotect leaves the key store untouched.
    pub fn unprotect(&self, payload: &ProtectedPayload) -> Result<Vec<u8>> {
        let ring = self.rings.load_current()?;
        let entry = match ring.find(&payload.key_id) {
            Some(entry) => entry.clone(),
            None => self.find_after_refresh(&payload.key_id)?,
        };

        if entry.record.status == KeyStatus::Revoked {
            return Err(ProtectorError::KeyRevoked {
                id: entry.record.id,
            });
        }

        let derived = self.deriver.derive(&entry.key, &self.chain)?;
        if !derived.fingerprint_matches(&payload.purpose_fingerprint) {
            return Err(ProtectorError::PurposeMismatch);
        }

        let aad = payload.aad()?;
        self.cipher.open(
            derived.key(),
            &payload.nonce,
            &aad,
            &payload.ciphertext,
            &payload.tag,
        )
    }

    /// Text convenience: protect a UTF-8 string and return the encoded payload.
    pub fn protect_str(&self, plaintext: &str) -> Result<String> {
        self.protect(plaintext.as_bytes())?.encode()
    }

    /// Text convenience: decode, unprotect and return UTF-8 plaintext.
    pub fn unprotect_str(&self, encoded: &str) -> Result<String> {
        if encoded.trim().is_empty() {
            return Err(ProtectorError::EmptyInput { what: "ciphertext" });
        }
        let payload = ProtectedPayload::decode(encoded)?;
        let plaintext = self.unprotect(&payload)?;
        String::from_utf8(plaintext)
            .map_err(|_| ProtectorError::tampered("plaintext is not valid UTF-8"))
    }

    /// The key may have been created by another process after our ring
    /// was cached; reload once before declaring it unknown.
    fn find_after_refresh(&self, id: &uuid::Uuid) -> Result<RingEntry> {
        debug!(key_id = %id, "key not in cached ring, reloading from store");
        let ring: Arc<KeyRing> = self.rings.refresh()?;
        ring.find(id)
            .cloned()
            .ok_or(ProtectorError::UnknownKey { id: *id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cipher::xchacha_backend::XChaChaBackend;
    use crate::adapters::derivers::hkdf_deriver::HkdfPurposeDeriver;
    use crate::adapters::key_stores::file_key_store::FileKeyStore;
    use crate::adapters::key_stores::memory_key_store::MemoryKeyStore;
    use crate::core::services::key_ring_provider::RotationPolicy;
    use crate::core::services::key_wrapping::KeyWrapper;
    use crate::core::models::key_material::MasterKey;
    use crate::core::models::key_record::{KeyRecord, KeyWrapping};
    use crate::core::traits::key_store::KeyStore;
    use chrono::{Duration, Utc};

    fn rings(store: Arc<dyn KeyStore>) -> Arc<KeyRingProvider> {
        let cipher = Arc::new(XChaChaBackend::new());
        Arc::new(KeyRingProvider::new(
            store,
            Arc::new(KeyWrapper::new(None, cipher)),
            RotationPolicy::default(),
        ))
    }

    fn protector_on(rings: &Arc<KeyRingProvider>, namespace: &str) -> Protector {
        Protector::new(
            Arc::clone(rings),
            Arc::new(HkdfPurposeDeriver::new()),
            Arc::new(XChaChaBackend::new()),
            PurposeChain::new([namespace]).unwrap(),
        )
    }

    fn memory_rings() -> Arc<KeyRingProvider> {
        rings(Arc::new(MemoryKeyStore::new()))
    }

    #[test]
    fn billing_round_trip_and_shipping_rejection() {
        let rings = memory_rings();
        let billing = protector_on(&rings, "billing");
        let shipping = protector_on(&rings, "shipping");

        let payload = billing.protect_str("4111-invoice-9").unwrap();
        assert_eq!(billing.unprotect_str(&payload).unwrap(), "4111-invoice-9");

        let err = shipping.unprotect_str(&payload).unwrap_err();
        assert!(matches!(err, ProtectorError::PurposeMismatch));
    }

    #[test]
    fn round_trip_various_plaintexts() {
        let rings = memory_rings();
        let p = protector_on(&rings, "ns");
        for text in ["a", "héllo wörld", "🔐 unicode", "x".repeat(10_000).as_str()] {
            let payload = p.protect_str(text).unwrap();
            assert_eq!(p.unprotect_str(&payload).unwrap(), text);
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        let rings = memory_rings();
        let p = protector_on(&rings, "ns");
        assert!(matches!(
            p.protect(b"").unwrap_err(),
            ProtectorError::EmptyInput { what: "plaintext" }
        ));
        assert!(matches!(
            p.unprotect_str("  ").unwrap_err(),
            ProtectorError::EmptyInput { what: "ciphertext" }
        ));
    }

    #[test]
    fn empty_plaintext_is_rejected_before_touching_the_store() {
        let store = Arc::new(MemoryKeyStore::new());
        let p = protector_on(&rings(store.clone()), "ns");
        assert!(p.protect(b"").is_err());
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn same_plaintext_gives_different_payloads() {
        let rings = memory_rings();
        let p = protector_on(&rings, "ns");
        let a = p.protect(b"same").unwrap();
        let b = p.protect(b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_eq!(a.purpose_fingerprint, b.purpose_fingerprint);
    }

    #[test]
    fn every_single_bit_flip_is_rejected() {
        let rings = memory_rings();
        let p = protector_on(&rings, "billing");
        let bytes = p.protect(b"4111-invoice-9").unwrap().to_bytes().unwrap();

        // Bytes after the fixed header prefix: nonce, ciphertext, tag.
        let authenticated_from = 1 + 16 + 16 + 1;
        let mut tampered_count = 0;
        let total = bytes.len() * 8;

        for bit in 0..total {
            let mut flipped = bytes.clone();
            flipped[bit / 8] ^= 1 << (bit % 8);

            let result =
                ProtectedPayload::from_bytes(&flipped).and_then(|payload| p.unprotect(&payload));
            let err = result.expect_err("tampered payload must not decrypt");

            match &err {
                ProtectorError::TamperedOrInvalidCiphertext { .. } => tampered_count += 1,
                ProtectorError::UnknownKey { .. } | ProtectorError::PurposeMismatch => {
                    assert!(bit / 8 < authenticated_from, "bit {bit}: {err}");
                }
                other => panic!("bit {bit}: unexpected error {other}"),
            }
        }

        // Only key-id and fingerprint bits resolve to a different error.
        assert_eq!(tampered_count, total - (16 + 16) * 8);
    }

    #[test]
    fn payload_from_rotated_key_still_decrypts() {
        let rings = memory_rings();
        let p = protector_on(&rings, "ns");
        let before = p.protect_str("old secret").unwrap();

        rings.rotate().unwrap();
        let after = p.protect(b"new secret").unwrap();
        let old_key = ProtectedPayload::decode(&before).unwrap().key_id;
        assert_ne!(after.key_id, old_key);

        assert_eq!(p.unprotect_str(&before).unwrap(), "old secret");
    }

    #[test]
    fn revoked_key_cannot_unprotect() {
        let store = Arc::new(MemoryKeyStore::new());
        let rings = rings(store.clone());
        let p = protector_on(&rings, "ns");
        let payload = p.protect(b"secret").unwrap();

        let record = store.get(&payload.key_id).unwrap().unwrap();
        store.put(&record.with_status(KeyStatus::Revoked)).unwrap();
        rings.refresh().unwrap();

        assert!(matches!(
            p.unprotect(&payload).unwrap_err(),
            ProtectorError::KeyRevoked { .. }
        ));
    }

    #[test]
    fn payload_from_foreign_store_is_unknown_key() {
        let mine = protector_on(&memory_rings(), "ns");
        let theirs = protector_on(&memory_rings(), "ns");
        let payload = theirs.protect(b"secret").unwrap();

        assert!(matches!(
            mine.unprotect(&payload).unwrap_err(),
            ProtectorError::UnknownKey { .. }
        ));
    }

    #[test]
    fn independent_providers_share_keys_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let open = || rings(Arc::new(FileKeyStore::open(dir.path().to_path_buf()).unwrap()));

        let writer = protector_on(&open(), "billing");
        let payload = writer.protect_str("4111-invoice-9").unwrap();

        let reader = protector_on(&open(), "billing");
        assert_eq!(reader.unprotect_str(&payload).unwrap(), "4111-invoice-9");
    }

    #[test]
    fn cached_ring_picks_up_keys_from_another_writer() {
        let dir = tempfile::tempdir().unwrap();
        let open = || rings(Arc::new(FileKeyStore::open(dir.path().to_path_buf()).unwrap()));

        let reader_rings = open();
        let reader = protector_on(&reader_rings, "ns");
        reader.protect(b"warm the cache").unwrap();

        let writer_rings = open();
        writer_rings.rotate().unwrap();
        let payload = protector_on(&writer_rings, "ns").protect(b"fresh").unwrap();

        assert_eq!(reader.unprotect(&payload).unwrap(), b"fresh");
    }

    #[test]
    fn sub_protectors_are_isolated_from_parent() {
        let rings = memory_rings();
        let parent = protector_on(&rings, "app");
        let child = parent.create_protector("billing").unwrap();
        assert_eq!(child.purpose_chain().purposes(), ["app", "billing"]);

        let payload = child.protect(b"secret").unwrap();
        assert_eq!(child.unprotect(&payload).unwrap(), b"secret");
        assert!(parent.unprotect(&payload).is_err());
    }

    #[test]
    fn failed_unprotect_leaves_an_empty_store_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileKeyStore::open(dir.path().to_path_buf()).unwrap());
        let mine = protector_on(&rings(store.clone()), "ns");
        let payload = protector_on(&memory_rings(), "ns").protect(b"secret").unwrap();

        assert!(matches!(
            mine.unprotect(&payload).unwrap_err(),
            ProtectorError::UnknownKey { .. }
        ));
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn failed_unprotect_does_not_replace_an_expired_key() {
        let store = Arc::new(MemoryKeyStore::new());
        let expired = KeyRecord::new_active(
            1,
            Utc::now() - Duration::days(10),
            Some(Duration::days(1)),
            KeyWrapping::None,
            MasterKey::generate().as_bytes().to_vec(),
        );
        store.insert(&expired).unwrap();

        let p = protector_on(&rings(store.clone()), "ns");
        let payload = protector_on(&memory_rings(), "ns").protect(b"secret").unwrap();
        assert!(p.unprotect(&payload).is_err());

        assert_eq!(store.list_all().unwrap(), vec![expired]);
    }
}
