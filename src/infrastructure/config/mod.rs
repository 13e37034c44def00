pub mod config;
pub mod loader;

pub use config::{BrowserConfig, Config, DatabaseConfig, LogFormat, LoggingConfig, ProvidersConfig};
pub use loader::{ConfigError, ConfigLoader};
