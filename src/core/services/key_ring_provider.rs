use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_material::MasterKey;
use crate::core::models::key_record::{KeyRecord, KeyStatus};
use crate::core::models::key_ring::{KeyRing, RingEntry};
use crate::core::services::key_wrapping::KeyWrapper;
use crate::core::traits::key_store::{InsertOutcome, KeyStore};

/// Upper bound on reload/generate rounds before giving up on a ring.
/// Each lost race means another writer made progress, so a handful
/// of rounds is plenty.
const MAX_ROTATION_ATTEMPTS: usize = 8;

/// When to generate new keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Lifetime of each key. `None` means keys never expire, so a new
    /// key is only generated when the ring has no usable active key.
    pub key_lifetime: Option<Duration>,
}

/// Builds [`KeyRing`]s for one application identity from its store,
/// generating and retiring keys as the [`RotationPolicy`] requires.
///
/// The built ring is cached and reused until the store holds a newer
/// generation or the active key expires.
pub struct KeyRingProvider {
    store: Arc<dyn KeyStore>,
    wrapper: Arc<KeyWrapper>,
    policy: RotationPolicy,
    cached: Mutex<Option<Arc<KeyRing>>>,
}

impl KeyRingProvider {
    pub fn new(store: Arc<dyn KeyStore>, wrapper: Arc<KeyWrapper>, policy: RotationPolicy) -> Self {
        Self {
            store,
            wrapper,
            policy,
            cached: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    /// Current ring, generating a first or replacement key if needed.
    pub fn get_ring(&self) -> Result<Arc<KeyRing>> {
        self.get_ring_at(Utc::now())
    }

    pub(crate) fn get_ring_at(&self, now: DateTime<Utc>) -> Result<Arc<KeyRing>> {
        if let Some(ring) = self.cached_ring() {
            let latest = self.store.max_generation()?;
            if latest <= ring.max_generation() && !ring.needs_new_key(now) {
                return Ok(ring);
            }
            debug!(
                store = %self.store.location(),
                cached_generation = ring.max_generation(),
                latest_generation = latest,
                "key ring is stale, rebuilding"
            );
        }
        self.rebuild_at(now)
    }

    /// Current ring for read paths. Never generates or retires keys, so
    /// the ring may have no active key.
    pub fn load_current(&self) -> Result<Arc<KeyRing>> {
        if let Some(ring) = self.cached_ring() {
            if self.store.max_generation()? <= ring.max_generation() {
                return Ok(ring);
            }
        }
        self.refresh()
    }

    /// Reload from the store, ignoring the cache. Read-only.
    pub fn refresh(&self) -> Result<Arc<KeyRing>> {
        let ring = Arc::new(self.load_ring(Utc::now())?);
        self.store_cache(Arc::clone(&ring));
        Ok(ring)
    }

    /// Generate a new active key now, retiring the current one.
    /// Used for operator-driven rotation.
    pub fn rotate(&self) -> Result<KeyRecord> {
        let now = Utc::now();
        for _ in 0..MAX_ROTATION_ATTEMPTS {
            let ring = self.load_ring(now)?;
            if let Some(record) = self.try_rotate(&ring, now)? {
                let ring = self.rebuild_at(now)?;
                debug!(ring_size = ring.len(), "key ring rebuilt after rotation");
                return Ok(record);
            }
        }
        Err(self.gave_up())
    }

    fn cached_ring(&self) -> Option<Arc<KeyRing>> {
        self.cached.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn store_cache(&self, ring: Arc<KeyRing>) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = Some(ring);
    }

    fn rebuild_at(&self, now: DateTime<Utc>) -> Result<Arc<KeyRing>> {
        for _ in 0..MAX_ROTATION_ATTEMPTS {
            let ring = self.load_ring(now)?;
            if !ring.needs_new_key(now) {
                let ring = Arc::new(ring);
                self.store_cache(Arc::clone(&ring));
                return Ok(ring);
            }
            // Whether we won or lost the race, the next round reloads.
            self.try_rotate(&ring, now)?;
        }
        Err(self.gave_up())
    }

    fn load_ring(&self, now: DateTime<Utc>) -> Result<KeyRing> {
        // Read before listing: a record inserted in between only makes
        // the snapshot look newer than this value, never older.
        let store_generation = self.store.max_generation()?;
        let entries = self
            .store
            .list_all()?
            .into_iter()
            .map(|record| {
                let key = self.wrapper.open_key(&record)?;
                Ok(RingEntry { record, key })
            })
            .collect::<Result<Vec<_>>>()?;

        let ring = KeyRing::new(entries, now).with_store_generation(store_generation);
        debug!(
            store = %self.store.location(),
            records = ring.len(),
            max_generation = ring.max_generation(),
            "key ring loaded"
        );
        Ok(ring)
    }

    /// Claim the next generation with a fresh key. Returns `None` when
    /// another writer claimed it first; that writer's key is canonical.
    fn try_rotate(&self, ring: &KeyRing, now: DateTime<Utc>) -> Result<Option<KeyRecord>> {
        let latest = self.store.max_generation()?;
        if latest > ring.max_generation() {
            debug!(
                snapshot_generation = ring.max_generation(),
                latest_generation = latest,
                "another writer rotated since the ring was loaded, reloading"
            );
            return Ok(None);
        }
        let generation = ring.max_generation() + 1;
        let key = MasterKey::generate();
        let mut record = KeyRecord::new_active(
            generation,
            now,
            self.policy.key_lifetime,
            self.wrapper.wrapping(),
            Vec::new(),
        );
        record.key_material = self.wrapper.seal_key(&record.id, &key)?;

        match self.store.insert(&record)? {
            InsertOutcome::Inserted => {
                info!(
                    key_id = %record.id,
                    generation,
                    expires = ?record.expiration_at,
                    store = %self.store.location(),
                    "generated new active key"
                );
                // Covers the superseded key as well as expired ones still marked active.
                for previous in ring
                    .entries()
                    .iter()
                    .filter(|e| e.record.status == KeyStatus::Active)
                {
                    self.retire(&previous.record)?;
                }
                Ok(Some(record))
            }
            InsertOutcome::Conflict => {
                debug!(
                    generation,
                    "another writer created this generation first, discarding local key"
                );
                Ok(None)
            }
        }
    }

    /// Retire `record` unless its stored copy has left `Active` since the
    /// snapshot was taken. A concurrent revocation must stand.
    fn retire(&self, record: &KeyRecord) -> Result<()> {
        let current = match self.store.get(&record.id)? {
            Some(current) if current.status == KeyStatus::Active => current,
            Some(current) => {
                debug!(
                    key_id = %record.id,
                    status = %current.status,
                    "key changed status since the ring was loaded, not retiring"
                );
                return Ok(());
            }
            None => return Ok(()),
        };
        self.store.put(&current.with_status(KeyStatus::Retired))?;
        info!(key_id = %record.id, generation = record.generation, "retired key");
        Ok(())
    }

    fn gave_up(&self) -> ProtectorError {
        ProtectorError::KeyGenerationFailed {
            reason: format!(
                "no usable active key in {} after {MAX_ROTATION_ATTEMPTS} attempts",
                self.store.location()
            ),
        }
    }
}
