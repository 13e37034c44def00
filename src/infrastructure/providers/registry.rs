//! Provider registry — spec.md section 4.2.
//!
//! Platform name is matched case-insensitively against the registered
//! providers (`deepseek`, `doubao`, `bocha`); an unknown platform yields a
//! per-unit failure, never a panic or a silent no-op.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::ProviderError;
use crate::domain::ports::provider::Provider;

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_lowercase(), p))
            .collect();
        Self { providers }
    }

    /// Looks up a provider by platform name, matched case-insensitively.
    /// Returns `no provider for <name>` (spec.md section 4.2) rather than
    /// panicking on an unregistered platform.
    pub fn get(&self, platform: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        self.providers
            .get(&platform.to_lowercase())
            .cloned()
            .ok_or_else(|| ProviderError::NoSuchProvider(platform.to_string()))
    }

    #[must_use]
    pub fn platform_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::domain::models::{SearchOutput, TaskSettings};

    struct FakeProvider(&'static str);

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn search(
            &self,
            _keyword: &str,
            _prompt: &str,
            _settings: &TaskSettings,
            _cancel: CancellationToken,
        ) -> Result<SearchOutput, ProviderError> {
            Ok(SearchOutput::default())
        }
    }

    #[test]
    fn looks_up_case_insensitively() {
        let registry = ProviderRegistry::new(vec![Arc::new(FakeProvider("bocha"))]);
        assert!(registry.get("BOCHA").is_ok());
        assert!(registry.get("Bocha").is_ok());
    }

    #[test]
    fn unknown_platform_yields_no_such_provider() {
        let registry = ProviderRegistry::new(vec![Arc::new(FakeProvider("bocha"))]);
        match registry.get("unknown") {
            Err(ProviderError::NoSuchProvider(name)) => assert_eq!(name, "unknown"),
            other => panic!("expected NoSuchProvider, got {other:?}"),
        }
    }
}
