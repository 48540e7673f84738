use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_record::{KeyRecord, KeyStatus, KeyWrapping};
use crate::core::traits::key_store::{InsertOutcome, KeyStore, KeyStoreFactory};

const RECORD_PREFIX: &str = "key-";
const RECORD_SUFFIX: &str = ".json";
const TEMP_PREFIX: &str = ".tmp-";

/// Directory-backed key store, one JSON file per record.
///
/// Files are named after the record's generation so that claiming a
/// generation is a single no-clobber rename:
///
/// ```text
/// keys/
///   key-0000000001.json
///   key-0000000002.json
/// ```
///
/// Every write goes to a temp file in the same directory first and is
/// then renamed into place, so readers in other processes never see a
/// partially written record.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    dir: PathBuf,
}

/// On-disk representation of a [`KeyRecord`].
#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    id: Uuid,
    generation: u64,
    created_at: DateTime<Utc>,
    activation_at: DateTime<Utc>,
    expiration_at: Option<DateTime<Utc>>,
    status: KeyStatus,
    wrapping: KeyWrapping,
    key_material: String,
    checksum: String,
}

impl RecordFile {
    fn from_record(record: &KeyRecord) -> Self {
        let key_material = STANDARD.encode(&record.key_material);
        let mut file = Self {
            id: record.id,
            generation: record.generation,
            created_at: record.created_at,
            activation_at: record.activation_at,
            expiration_at: record.expiration_at,
            status: record.status,
            wrapping: record.wrapping,
            key_material,
            checksum: String::new(),
        };
        file.checksum = file.compute_checksum();
        file
    }

    /// Hex SHA-256 over a canonical rendering of every other field.
    fn compute_checksum(&self) -> String {
        let ts = |t: &DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let canonical = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            self.id,
            self.generation,
            ts(&self.created_at),
            ts(&self.activation_at),
            self.expiration_at.as_ref().map(ts).unwrap_or_default(),
            self.status,
            self.wrapping,
            self.key_material,
        );
        let digest = Sha256::digest(canonical.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn into_record(self, path: &Path) -> Result<KeyRecord> {
        let corrupt = |reason: String| ProtectorError::RecordCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        if self.compute_checksum() != self.checksum {
            return Err(corrupt("checksum mismatch".into()));
        }
        if FileKeyStore::generation_from_name(path) != Some(self.generation) {
            return Err(corrupt(format!(
                "generation {} does not match the file name",
                self.generation
            )));
        }
        let key_material = STANDARD
            .decode(&self.key_material)
            .map_err(|e| corrupt(format!("key material is not valid base64: {e}")))?;

        Ok(KeyRecord {
            id: self.id,
            generation: self.generation,
            created_at: self.created_at,
            activation_at: self.activation_at,
            expiration_at: self.expiration_at,
            status: self.status,
            wrapping: self.wrapping,
            key_material,
        })
    }
}

impl FileKeyStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir).map_err(|e| ProtectorError::StoreUnavailable {
            path: dir.clone(),
            reason: e.to_string(),
        })?;
        if !dir.is_dir() {
            return Err(ProtectorError::StoreUnavailable {
                path: dir,
                reason: "not a directory".into(),
            });
        }
        Ok(Self { dir })
    }

    /// Return the directory this store reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, generation: u64) -> PathBuf {
        self.dir
            .join(format!("{RECORD_PREFIX}{generation:010}{RECORD_SUFFIX}"))
    }

    /// Parse the generation out of a `key-NNNNNNNNNN.json` file name.
    fn generation_from_name(path: &Path) -> Option<u64> {
        let name = path.file_name()?.to_str()?;
        let digits = name
            .strip_prefix(RECORD_PREFIX)?
            .strip_suffix(RECORD_SUFFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> ProtectorError {
        ProtectorError::StoreUnavailable {
            path: self.dir.clone(),
            reason: e.to_string(),
        }
    }

    /// Paths of all record files currently in the directory.
    fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| self.unavailable(e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| self.unavailable(e))?.path();
            if Self::generation_from_name(&path).is_some() {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn read_record(path: &Path) -> Result<KeyRecord> {
        let content = std::fs::read_to_string(path)?;
        let file: RecordFile =
            serde_json::from_str(&content).map_err(|e| ProtectorError::RecordCorrupt {
                path: path.to_path_buf(),
                reason: format!("invalid JSON: {e}"),
            })?;
        file.into_record(path)
    }

    /// Write `record` to a temp file next to its final path.
    fn stage(&self, record: &KeyRecord) -> Result<tempfile::NamedTempFile> {
        let json = serde_json::to_string_pretty(&RecordFile::from_record(record)).map_err(|e| {
            ProtectorError::RecordCorrupt {
                path: self.record_path(record.generation),
                reason: format!("failed to serialize record: {e}"),
            }
        })?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(RECORD_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| self.unavailable(e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| self.unavailable(e))?;
        tmp.as_file().sync_all().map_err(|e| self.unavailable(e))?;
        Ok(tmp)
    }
}

impl KeyStore for FileKeyStore {
    fn insert(&self, record: &KeyRecord) -> Result<InsertOutcome> {
        let path = self.record_path(record.generation);
        let tmp = self.stage(record)?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(path = %path.display(), key_id = %record.id, "key record persisted");
                Ok(InsertOutcome::Inserted)
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(
                    path = %path.display(),
                    key_id = %record.id,
                    "generation already claimed by another writer"
                );
                Ok(InsertOutcome::Conflict)
            }
            Err(e) => Err(self.unavailable(e.error)),
        }
    }

    fn put(&self, record: &KeyRecord) -> Result<()> {
        let path = self.record_path(record.generation);
        if !path.exists() {
            return Err(ProtectorError::StoreUnavailable {
                path,
                reason: format!("no record to update for key {}", record.id),
            });
        }

        let tmp = self.stage(record)?;
        tmp.persist(&path).map_err(|e| self.unavailable(e.error))?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<KeyRecord>> {
        let mut records = Vec::new();
        for path in self.record_paths()? {
            match Self::read_record(&path) {
                Ok(record) => records.push(record),
                Err(e @ ProtectorError::RecordCorrupt { .. }) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt key record");
                }
                Err(ProtectorError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "key record vanished while listing");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    fn max_generation(&self) -> Result<u64> {
        Ok(self
            .record_paths()?
            .iter()
            .filter_map(|p| Self::generation_from_name(p))
            .max()
            .unwrap_or(0))
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Opens one [`FileKeyStore`] per application identity under a root directory.
///
/// The shared ring lives directly in the root; a named application gets
/// its own sub-directory (see [`application_dir_name`]).
#[derive(Debug, Clone)]
pub struct FileKeyStoreFactory {
    root: PathBuf,
}

impl FileKeyStoreFactory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl KeyStoreFactory for FileKeyStoreFactory {
    fn open(&self, application: Option<&str>) -> Result<Arc<dyn KeyStore>> {
        let dir = match application {
            Some(name) => self.root.join(application_dir_name(name)),
            None => self.root.clone(),
        };
        Ok(Arc::new(FileKeyStore::open(dir)?))
    }
}

/// Directory name for an application identity: the name with unsafe
/// characters replaced by `_`, then `-` and 8 hex chars of its SHA-256.
///
/// The hash suffix keeps names that sanitize identically apart.
pub fn application_dir_name(application: &str) -> String {
    let sanitized: String = application
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = Sha256::digest(application.as_bytes());
    let suffix: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("{sanitized}-{suffix}")
}
