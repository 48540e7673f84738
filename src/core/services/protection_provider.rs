use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_ring::KeyRing;
use crate::core::models::purpose_chain::PurposeChain;
use crate::core::services::key_ring_provider::{KeyRingProvider, RotationPolicy};
use crate::core::services::key_wrapping::KeyWrapper;
use crate::core::services::protector::Protector;
use crate::core::traits::cipher::AeadCipher;
use crate::core::traits::deriver::PurposeDeriver;
use crate::core::traits::key_store::KeyStoreFactory;

/// Settings the provider is constructed with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Application identity. `None` means every caller on the machine
    /// shares one implicit ring.
    pub application: Option<String>,
    pub rotation: RotationPolicy,
}

/// Entry point of the core: hands out [`Protector`]s and shares one
/// [`KeyRingProvider`] per application identity for the process lifetime.
pub struct ProtectionProvider {
    options: ProviderOptions,
    stores: Arc<dyn KeyStoreFactory>,
    deriver: Arc<dyn PurposeDeriver>,
    cipher: Arc<dyn AeadCipher>,
    wrapper: Arc<KeyWrapper>,
    rings: Mutex<HashMap<Option<String>, Arc<KeyRingProvider>>>,
}

impl ProtectionProvider {
    pub fn new(
        options: ProviderOptions,
        stores: Arc<dyn KeyStoreFactory>,
        deriver: Arc<dyn PurposeDeriver>,
        cipher: Arc<dyn AeadCipher>,
        wrapper: KeyWrapper,
    ) -> Self {
        Self {
            options,
            stores,
            deriver,
            cipher,
            wrapper: Arc::new(wrapper),
            rings: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// The ring provider for `application`, created on first use.
    pub fn ring_provider(&self, application: Option<&str>) -> Result<Arc<KeyRingProvider>> {
        let mut rings = self.rings.lock().unwrap_or_else(|e| e.into_inner());
        let key = application.map(str::to_string);
        if let Some(existing) = rings.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let store = self.stores.open(application)?;
        debug!(
            application = application.unwrap_or("<shared>"),
            store = %store.location(),
            "opened key store"
        );
        let provider = Arc::new(KeyRingProvider::new(
            store,
            Arc::clone(&self.wrapper),
            self.options.rotation,
        ));
        rings.insert(key, Arc::clone(&provider));
        Ok(provider)
    }

    /// Current key ring for `application`.
    pub fn get_ring(&self, application: Option<&str>) -> Result<Arc<KeyRing>> {
        self.ring_provider(application)?.get_ring()
    }

    /// A protector for `namespace` under the configured application.
    ///
    /// The application identity, when set, is the first purpose in the
    /// chain, so two applications never share derived keys even if they
    /// are pointed at the same ring.
    pub fn create_protector(&self, namespace: &str) -> Result<Protector> {
        if namespace.is_empty() {
            return Err(ProtectorError::EmptyInput { what: "namespace" });
        }
        let application = self.options.application.as_deref();
        let chain = match application {
            Some(app) => PurposeChain::new([app, namespace])?,
            None => PurposeChain::new([namespace])?,
        };

        Ok(Protector::new(
            self.ring_provider(application)?,
            Arc::clone(&self.deriver),
            Arc::clone(&self.cipher),
            chain,
        ))
    }
}
