pub mod key_material;
pub mod key_record;
pub mod key_ring;
pub mod protected_payload;
pub mod purpose_chain;
