use std::sync::Arc;

use uuid::Uuid;

use crate::core::errors::Result;
use crate::core::models::key_record::KeyRecord;

/// Result of claiming a generation slot for a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record is now durable and canonical for its generation.
    Inserted,
    /// Another writer already holds this generation; the record was discarded.
    Conflict,
}

/// Port for durable key record storage.
///
/// Implementations live in `adapters::key_stores` (e.g. FileKeyStore,
/// MemoryKeyStore). Every write must be atomic per record: readers see
/// either the old record or the new one, never a partial write.
pub trait KeyStore: Send + Sync {
    /// Store a new record, unless its generation is already taken.
    fn insert(&self, record: &KeyRecord) -> Result<InsertOutcome>;

    /// Overwrite an existing record (status changes only).
    fn put(&self, record: &KeyRecord) -> Result<()>;

    /// All readable records, in no particular order.
    /// Corrupt records are skipped, never returned.
    fn list_all(&self) -> Result<Vec<KeyRecord>>;

    /// Highest generation present, or 0 for an empty store.
    fn max_generation(&self) -> Result<u64>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;

    /// Whether records outlive the current process.
    fn is_persistent(&self) -> bool {
        true
    }

    /// Look up one record by id.
    fn get(&self, id: &Uuid) -> Result<Option<KeyRecord>> {
        Ok(self.list_all()?.into_iter().find(|r| r.id == *id))
    }
}

/// Opens the key store backing one application identity.
pub trait KeyStoreFactory: Send + Sync {
    /// `None` selects the shared, implicit ring.
    fn open(&self, application: Option<&str>) -> Result<Arc<dyn KeyStore>>;
}
