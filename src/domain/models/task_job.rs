//! `TaskJob` domain model — see spec.md section 3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a `TaskJob`. Monotonic: pending -> done, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Done,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Done => "done",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

/// Per-task execution settings (headless flag, per-unit timeout, inter-unit
/// delay). Stored as JSON on `TaskJob`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskSettings {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Per-operation timeout, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay applied after each unit (except the last), in seconds.
    #[serde(default = "default_delay_secs")]
    pub delay_between_tasks: u64,
}

const fn default_headless() -> bool {
    true
}

const fn default_timeout_ms() -> u64 {
    60_000
}

const fn default_delay_secs() -> u64 {
    5
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout_ms: default_timeout_ms(),
            delay_between_tasks: default_delay_secs(),
        }
    }
}

/// A submitted monitoring task: a keyword list x platform list x round
/// count cross-product of units of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskJob {
    pub id: i64,
    pub keywords: Vec<String>,
    pub platforms: Vec<String>,
    pub query_count: u32,
    pub status: TaskStatus,
    pub settings: TaskSettings,
    pub result_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inputs accepted by `TaskEngine::submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTask {
    pub keywords: Vec<String>,
    pub platforms: Vec<String>,
    pub query_count: u32,
    pub settings: TaskSettings,
}

impl SubmitTask {
    /// Validates the non-empty / `query_count >= 1` invariants from
    /// spec.md section 4.1. Returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.keywords.is_empty() {
            return Err("keywords must not be empty".to_string());
        }
        if self.platforms.is_empty() {
            return Err("platforms must not be empty".to_string());
        }
        if self.query_count < 1 {
            return Err("query_count must be >= 1".to_string());
        }
        Ok(())
    }
}
