//! GEO Citation Monitor — Task Execution Engine
//!
//! Drives chat-platform search sessions (DeepSeek, Doubao, Bocha),
//! intercepts the streaming citations they surface for a batch of
//! keywords, normalizes them, and persists the results with referential
//! integrity for status views and CSV export.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::TaskEngine;
pub use infrastructure::database::DatabaseConnection;
