pub mod key_ring_provider;
pub mod key_wrapping;
pub mod protection_provider;
pub mod protector;
