//! Infrastructure layer: database, browser automation, network parsing,
//! configuration, and logging adapters for the domain ports.

pub mod browser;
pub mod config;
pub mod database;
pub mod http;
pub mod logging;
pub mod providers;
pub mod sse;
pub mod text;
