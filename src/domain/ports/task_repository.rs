//! Task repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{SubmitTask, TaskJob, TaskQuery, TaskStatus};

/// Filter criteria for listing task jobs.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub ids: Option<Vec<i64>>,
}

/// Repository interface for `TaskJob` and `TaskQuery` persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Inserts a new task job plus its `TaskQuery` rows (one per keyword),
    /// returning the persisted job with its assigned id.
    async fn submit(&self, input: SubmitTask) -> DomainResult<TaskJob>;

    async fn get(&self, id: i64) -> DomainResult<Option<TaskJob>>;

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<TaskJob>>;

    async fn queries_for_task(&self, task_id: i64) -> DomainResult<Vec<TaskQuery>>;

    /// Marks a task done and stores its aggregated `result_data` snapshot.
    /// Monotonic: once `done`, calling this again is a no-op.
    async fn mark_done(&self, id: i64, result_data: serde_json::Value) -> DomainResult<()>;
}
