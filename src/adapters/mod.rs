pub mod cipher;
pub mod derivers;
pub mod key_stores;
