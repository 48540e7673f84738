use std::path::PathBuf;

use uuid::Uuid;

/// Broad class of a [`ProtectorError`], used to keep store failures and
/// cryptographic failures apart in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Input,
    Cryptographic,
    Store,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Input => "input",
            Self::Cryptographic => "cryptographic",
            Self::Store => "store",
        };
        f.write_str(name)
    }
}

/// All domain errors for data-protector.
///
/// Each variant provides enough context to diagnose the issue
/// without needing a debugger.
#[derive(Debug, thiserror::Error)]
pub enum ProtectorError {
    #[error("Invalid configuration: {detail}")]
    ConfigurationError { detail: String },

    #[error("Refusing to process an empty {what}")]
    EmptyInput { what: &'static str },

    #[error(
        "Key {id} was not found in the key ring\n\n  \
         The payload was produced with a key this key store does not hold.\n\n  \
         Solutions:\n    \
         → Point KeyOutputLocation at the directory used when the payload was created\n    \
         → Check that ApplicationName matches the one used for encryption"
    )]
    UnknownKey { id: Uuid },

    #[error("Key {id} has been revoked and can no longer unprotect payloads")]
    KeyRevoked { id: Uuid },

    #[error("Payload was protected for a different purpose")]
    PurposeMismatch,

    #[error("Payload is tampered or not a valid protected payload: {reason}")]
    TamperedOrInvalidCiphertext { reason: String },

    #[error(
        "Key store unavailable at {path}: {reason}\n\n  \
         Check that the directory exists and is writable by the current user."
    )]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("Key record {path} is corrupt: {reason}")]
    RecordCorrupt { path: PathBuf, reason: String },

    #[error("Encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    #[error("Key generation failed: {reason}")]
    KeyGenerationFailed { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProtectorError {
    /// Classify this error for logging and exit-code decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigurationError { .. } => ErrorKind::Configuration,
            Self::EmptyInput { .. } => ErrorKind::Input,
            Self::UnknownKey { .. }
            | Self::KeyRevoked { .. }
            | Self::PurposeMismatch
            | Self::TamperedOrInvalidCiphertext { .. }
            | Self::EncryptionFailed { .. }
            | Self::KeyGenerationFailed { .. } => ErrorKind::Cryptographic,
            Self::StoreUnavailable { .. } | Self::RecordCorrupt { .. } | Self::Io(_) => {
                ErrorKind::Store
            }
        }
    }

    /// Shorthand for a structural or authentication failure.
    pub fn tampered(reason: impl Into<String>) -> Self {
        Self::TamperedOrInvalidCiphertext {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtectorError>;
