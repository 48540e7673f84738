use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;
use zeroize::Zeroizing;

use crate::adapters::cipher::xchacha_backend::XChaChaBackend;
use crate::adapters::derivers::hkdf_deriver::HkdfPurposeDeriver;
use crate::adapters::key_stores::file_key_store::FileKeyStoreFactory;
use crate::adapters::key_stores::memory_key_store::MemoryKeyStoreFactory;
use crate::cli::context::Settings;
use crate::config::app_config::AppConfig;
use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_material::{KEY_LEN, MasterKey};
use crate::core::services::key_ring_provider::RotationPolicy;
use crate::core::services::key_wrapping::KeyWrapper;
use crate::core::services::protection_provider::{ProtectionProvider, ProviderOptions};
use crate::core::traits::cipher::AeadCipher;
use crate::core::traits::key_store::KeyStoreFactory;

/// Load `dp.json`, apply overrides from `settings`, and wire up a provider.
pub fn build_provider(settings: &Settings) -> Result<ProtectionProvider> {
    let config = AppConfig::load(settings.config.as_deref())?
        .with_overrides(settings.key_location.clone(), settings.application.clone());
    if let Some(source) = &config.source {
        debug!(config = %source.display(), "loaded configuration");
    }

    let stores: Arc<dyn KeyStoreFactory> = match config.key_location() {
        Some(dir) => Arc::new(FileKeyStoreFactory::new(dir.to_path_buf())),
        None => {
            debug!("no key location configured, keys live only as long as this process");
            Arc::new(MemoryKeyStoreFactory)
        }
    };

    let application = config.application_name().map(str::to_string);
    if application.is_none() {
        debug!("no application name configured, using the shared key ring");
    }

    let kek = settings
        .key_encryption_key
        .as_deref()
        .map(parse_key_encryption_key)
        .transpose()?;

    let cipher: Arc<dyn AeadCipher> = Arc::new(XChaChaBackend::new());
    Ok(ProtectionProvider::new(
        ProviderOptions {
            application,
            rotation: RotationPolicy {
                key_lifetime: config.key_lifetime()?,
            },
        },
        stores,
        Arc::new(HkdfPurposeDeriver::new()),
        Arc::clone(&cipher),
        KeyWrapper::new(kek, cipher),
    ))
}

/// Decode a base64 key-encryption key of exactly [`KEY_LEN`] bytes.
pub fn parse_key_encryption_key(encoded: &str) -> Result<MasterKey> {
    let bytes = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|e| {
        ProtectorError::ConfigurationError {
            detail: format!("DP_KEY_ENCRYPTION_KEY is not valid base64: {e}"),
        }
    })?);
    if bytes.len() != KEY_LEN {
        return Err(ProtectorError::ConfigurationError {
            detail: format!(
                "DP_KEY_ENCRYPTION_KEY must decode to {KEY_LEN} bytes, got {}",
                bytes.len()
            ),
        });
    }
    MasterKey::from_slice(bytes.as_slice())
}
