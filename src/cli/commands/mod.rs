pub mod keys;
pub mod protect;
pub mod provider_helpers;
pub mod unprotect;
