use crate::core::errors::Result;
use crate::core::models::key_material::{DerivedKey, MasterKey};
use crate::core::models::purpose_chain::PurposeChain;

/// Port for purpose-specific key derivation.
///
/// Must be deterministic and one-way: the same master key and chain
/// always give the same [`DerivedKey`], and distinct chains give
/// independent keys and fingerprints.
pub trait PurposeDeriver: Send + Sync {
    fn derive(&self, master: &MasterKey, chain: &PurposeChain) -> Result<DerivedKey>;
}
