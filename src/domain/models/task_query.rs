//! `TaskQuery` domain model — one row per (task, keyword).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskQuery {
    pub id: i64,
    pub task_id: i64,
    pub query: String,
}
