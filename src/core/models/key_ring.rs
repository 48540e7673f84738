use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::models::key_material::MasterKey;
use crate::core::models::key_record::KeyRecord;

/// A key record together with its usable (unwrapped) master key.
#[derive(Debug, Clone)]
pub struct RingEntry {
    pub record: KeyRecord,
    pub key: MasterKey,
}

/// Immutable snapshot of every key record for one application identity.
///
/// Entries are ordered by activation time (then generation). The active
/// entry is the eligible record with the highest generation, so a ring
/// observed mid-rotation, with both the old and new record still marked
/// active on disk, still resolves to a single active key.
#[derive(Debug)]
pub struct KeyRing {
    entries: Vec<RingEntry>,
    active: Option<usize>,
    max_generation: u64,
}

impl KeyRing {
    pub fn new(mut entries: Vec<RingEntry>, now: DateTime<Utc>) -> Self {
        entries.sort_by(|a, b| {
            a.record
                .activation_at
                .cmp(&b.record.activation_at)
                .then(a.record.generation.cmp(&b.record.generation))
        });

        let active = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.record.is_eligible_at(now))
            .max_by_key(|(_, e)| e.record.generation)
            .map(|(i, _)| i);

        let max_generation = entries
            .iter()
            .map(|e| e.record.generation)
            .max()
            .unwrap_or(0);

        Self {
            entries,
            active,
            max_generation,
        }
    }

    /// The key new payloads are protected with, if any.
    pub fn active(&self) -> Option<&RingEntry> {
        self.active.map(|i| &self.entries[i])
    }

    /// Resolve any record (active, retired or revoked) by id.
    pub fn find(&self, id: &Uuid) -> Option<&RingEntry> {
        self.entries.iter().find(|e| e.record.id == *id)
    }

    /// Whether a new key must be generated before protecting at `now`.
    pub fn needs_new_key(&self, now: DateTime<Utc>) -> bool {
        match self.active() {
            Some(entry) => !entry.record.is_eligible_at(now),
            None => true,
        }
    }

    /// Raise the generation this ring accounts for to `generation`, the
    /// highest slot the store held when the ring was loaded. Slots taken
    /// by unreadable records count, so they are never claimed again.
    pub fn with_store_generation(mut self, generation: u64) -> Self {
        self.max_generation = self.max_generation.max(generation);
        self
    }

    /// Highest generation this ring has seen.
    pub fn max_generation(&self) -> u64 {
        self.max_generation
    }

    pub fn entries(&self) -> &[RingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
