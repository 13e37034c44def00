//! Application layer: business logic orchestrating domain ports, free of
//! any concrete infrastructure (database, browser, HTTP) beyond the trait
//! boundaries those ports define.

pub mod normalizer;
pub mod task_engine;

pub use normalizer::{normalize, to_citation_inputs};
pub use task_engine::TaskEngine;
