//! Status-projection port — spec.md section 4.8.

use async_trait::async_trait;

use crate::domain::errors::ProjectionError;
use crate::domain::models::TaskStatusView;

/// Builds the read-model views served by `GET /status`. Separated from
/// `SearchRepository` because it composes several tables into one
/// denormalized view and is the one place `table_not_found` is handled.
#[async_trait]
pub trait StatusProjector: Send + Sync {
    async fn project(&self, task_ids: &[i64]) -> Result<Vec<TaskStatusView>, ProjectionError>;
}
