use crate::core::errors::{ProtectorError, Result};
use crate::core::services::protection_provider::ProtectionProvider;

/// Execute `data-protector E <namespace> <plaintext>`.
///
/// Prints the payload alone on stdout so it can be captured by scripts.
pub fn execute(provider: &ProtectionProvider, namespace: &str, plaintext: &str) -> Result<()> {
    // Checked here as well so an empty input never opens the store.
    if plaintext.is_empty() {
        return Err(ProtectorError::EmptyInput { what: "plaintext" });
    }
    let protector = provider.create_protector(namespace)?;
    let payload = protector.protect_str(plaintext)?;
    println!("{payload}");
    Ok(())
}
