//! `SearchRecord` domain model — one row per executed unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Completed,
    Failed,
}

impl SearchStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SearchStatus::Completed => "completed",
            SearchStatus::Failed => "failed",
        }
    }

    /// Derives status from the invariant in spec.md section 3:
    /// `search_status = completed` iff the answer text is non-empty AND no
    /// error was recorded.
    #[must_use]
    pub fn derive(answer_text: &str, error: Option<&str>) -> Self {
        if !answer_text.is_empty() && error.is_none() {
            SearchStatus::Completed
        } else {
            SearchStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: i64,
    pub keyword: String,
    /// Lower-cased canonical platform name.
    pub platform: String,
    pub prompt_type: String,
    pub prompt: String,
    pub full_answer: String,
    pub response_time_ms: Option<i64>,
    pub search_status: SearchStatus,
    pub error_message: Option<String>,
    pub task_id: Option<i64>,
    pub task_query_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a new `SearchRecord`; `id`/`created_at` are
/// assigned by storage.
#[derive(Debug, Clone)]
pub struct NewSearchRecord {
    pub keyword: String,
    pub platform: String,
    pub prompt_type: String,
    pub prompt: String,
    pub full_answer: String,
    pub response_time_ms: Option<i64>,
    pub search_status: SearchStatus,
    pub error_message: Option<String>,
    pub task_id: Option<i64>,
    pub task_query_id: Option<i64>,
}
