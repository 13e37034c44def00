//! Search-provider port — spec.md section 4.2.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::ProviderError;
use crate::domain::models::{SearchOutput, TaskSettings};

/// One GEO search surface (a chat platform driven through a browser, or a
/// direct HTTP API). Implementations own their own authentication and
/// network access; callers only see the neutral `SearchOutput` triple.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The name this provider registers under (case-insensitively matched
    /// against a task's `platforms` list).
    fn name(&self) -> &'static str;

    /// Runs one keyword/prompt search to completion or failure. `settings`
    /// carries the task's per-unit headless/timeout choice (spec.md
    /// section 3); `cancel` is observed at every suspension point so a
    /// task-level cancellation can abort a unit of work without leaking
    /// its browser session.
    async fn search(
        &self,
        keyword: &str,
        prompt: &str,
        settings: &TaskSettings,
        cancel: CancellationToken,
    ) -> Result<SearchOutput, ProviderError>;
}
