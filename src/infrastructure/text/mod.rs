pub mod domain_extractor;
pub mod encoding_repair;

pub use domain_extractor::extract_registrable_domain;
pub use encoding_repair::{repair_encoding, repair_encoding_bytes};
