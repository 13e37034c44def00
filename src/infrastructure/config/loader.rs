use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use super::config::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("database host must not be empty")]
    EmptyDatabaseHost,

    #[error("invalid max_connections: {0}, must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid log level: {0}, must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("http_port must be nonzero")]
    InvalidHttpPort,
}

/// Hierarchical config loader: defaults -> `config.yaml` -> environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults.
    /// 2. `config.yaml` in the working directory.
    /// 3. Environment variables prefixed `GEO_`, with `__` for nesting
    ///    (e.g. `GEO_DATABASE__HOST`).
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("config.yaml"))
            .merge(Env::prefixed("GEO_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.host.is_empty() {
            return Err(ConfigError::EmptyDatabaseHost);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        if config.http_port == 0 {
            return Err(ConfigError::InvalidHttpPort);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.http_port, 8080);
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn rejects_zero_http_port() {
        let mut config = Config::default();
        config.http_port = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidHttpPort)
        ));
    }

    #[test]
    fn rejects_bad_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn database_url_sets_client_encoding() {
        let config = Config::default();
        assert!(config.database_url().contains("client_encoding=UTF8"));
    }
}
