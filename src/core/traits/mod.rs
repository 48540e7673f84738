pub mod cipher;
pub mod deriver;
pub mod key_store;
