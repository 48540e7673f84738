use tracing::warn;

use crate::core::errors::{ProtectorError, Result};
use crate::core::services::protection_provider::ProtectionProvider;

/// Execute `data-protector D <namespace> <payload>`.
///
/// A payload that cannot be opened (unknown or revoked key, other
/// purpose, tampered bytes) yields "no plaintext recovered": a warning
/// on stderr and an empty line on stdout. Configuration and store
/// failures are returned to the caller.
pub fn execute(provider: &ProtectionProvider, namespace: &str, payload: &str) -> Result<()> {
    if payload.is_empty() {
        return Err(ProtectorError::EmptyInput { what: "ciphertext" });
    }
    let protector = provider.create_protector(namespace)?;

    match protector.unprotect_str(payload) {
        Ok(plaintext) => println!("{plaintext}"),
        Err(e) if is_unrecoverable_payload(&e) => {
            warn!(kind = %e.kind(), error = %e, "no plaintext recovered");
            println!();
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

fn is_unrecoverable_payload(e: &ProtectorError) -> bool {
    matches!(
        e,
        ProtectorError::UnknownKey { .. }
            | ProtectorError::KeyRevoked { .. }
            | ProtectorError::PurposeMismatch
            | ProtectorError::TamperedOrInvalidCiphertext { .. }
    )
}
