pub mod hkdf_deriver;
