use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_record::KeyRecord;
use crate::core::traits::key_store::{InsertOutcome, KeyStore, KeyStoreFactory};

/// Process-local key store used when no storage location is configured.
///
/// Keys vanish when the process exits, so payloads protected with this
/// store can only be unprotected by the same process.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    records: Mutex<BTreeMap<u64, KeyRecord>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<u64, KeyRecord>> {
        // A panic while holding the lock cannot leave a half-written record.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyStore for MemoryKeyStore {
    fn insert(&self, record: &KeyRecord) -> Result<InsertOutcome> {
        let mut records = self.records();
        if records.contains_key(&record.generation) {
            return Ok(InsertOutcome::Conflict);
        }
        records.insert(record.generation, record.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn put(&self, record: &KeyRecord) -> Result<()> {
        let mut records = self.records();
        match records.get_mut(&record.generation) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(ProtectorError::StoreUnavailable {
                path: self.location().into(),
                reason: format!("no record to update for key {}", record.id),
            }),
        }
    }

    fn list_all(&self) -> Result<Vec<KeyRecord>> {
        Ok(self.records().values().cloned().collect())
    }

    fn max_generation(&self) -> Result<u64> {
        Ok(self.records().keys().next_back().copied().unwrap_or(0))
    }

    fn location(&self) -> String {
        "<ephemeral>".to_string()
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

/// Hands out a fresh [`MemoryKeyStore`] per application identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryKeyStoreFactory;

impl KeyStoreFactory for MemoryKeyStoreFactory {
    fn open(&self, _application: Option<&str>) -> Result<Arc<dyn KeyStore>> {
        Ok(Arc::new(MemoryKeyStore::new()))
    }
}
