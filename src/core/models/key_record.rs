use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Active,
    Retired,
    Revoked,
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Retired => "retired",
            Self::Revoked => "revoked",
        };
        f.pad(name)
    }
}

/// How `key_material` is protected at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyWrapping {
    /// Raw key bytes.
    None,
    /// Sealed with a key-encryption key using XChaCha20-Poly1305.
    Xchacha20poly1305,
}

impl std::fmt::Display for KeyWrapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Xchacha20poly1305 => "xchacha20poly1305",
        };
        f.pad(name)
    }
}

/// One persisted master key and its lifecycle metadata.
///
/// `generation` orders rotations: every new key claims the next
/// generation, and at most one record can hold a given generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub id: Uuid,
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub activation_at: DateTime<Utc>,
    /// `None` means the key never expires.
    pub expiration_at: Option<DateTime<Utc>>,
    pub status: KeyStatus,
    pub wrapping: KeyWrapping,
    pub key_material: Vec<u8>,
}

impl KeyRecord {
    /// Build a fresh active record activated at `now`.
    pub fn new_active(
        generation: u64,
        now: DateTime<Utc>,
        lifetime: Option<Duration>,
        wrapping: KeyWrapping,
        key_material: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            created_at: now,
            activation_at: now,
            expiration_at: lifetime.map(|l| now + l),
            status: KeyStatus::Active,
            wrapping,
            key_material,
        }
    }

    /// Copy of this record with a different status.
    pub fn with_status(&self, status: KeyStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_at.is_some_and(|exp| now >= exp)
    }

    /// Whether this record may serve as the active key at `now`.
    pub fn is_eligible_at(&self, now: DateTime<Utc>) -> bool {
        self.status == KeyStatus::Active && self.activation_at <= now && !self.is_expired_at(now)
    }
}
