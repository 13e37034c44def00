//! Read-model types returned by the Status Projector — spec.md section 4.8.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::task_job::{TaskSettings, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressCounts {
    pub completed: i64,
    pub failed: i64,
    pub pending: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformStatus {
    Completed,
    Pending,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationView {
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub site_name: Option<String>,
    pub cite_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQueryGroup {
    pub sub_query: Option<String>,
    pub citations: Vec<CitationView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformView {
    pub platform: String,
    pub status: PlatformStatus,
    pub sub_query_groups: Vec<SubQueryGroup>,
    pub last_record_id: Option<i64>,
    pub citation_count: i64,
    pub last_latency_ms: Option<i64>,
    pub last_error: Option<String>,
    /// Every sub-query text for this platform joined into one
    /// comma-separated string — a display convenience the original
    /// `status_service.py` (`get_doubao_query_tokens`) computed per
    /// platform; populated via [`PlatformView::query_tokens_joined`] once
    /// `sub_query_groups` is final (SPEC_FULL.md section 4.8).
    pub query_tokens: Option<String>,
}

impl PlatformView {
    /// Joins every sub-query text for this platform into one
    /// comma-separated string — a display convenience the original
    /// `status_service.py` (`get_doubao_query_tokens`) computed per platform;
    /// folded here as a general derived field (SPEC_FULL.md section 4.8).
    #[must_use]
    pub fn query_tokens_joined(&self) -> Option<String> {
        let tokens: Vec<&str> = self
            .sub_query_groups
            .iter()
            .filter_map(|g| g.sub_query.as_deref())
            .filter(|s| !s.is_empty())
            .collect();
        if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(", "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRow {
    pub keyword: String,
    pub platform: String,
    pub sub_query: Option<String>,
    pub distinct_citation_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailRow {
    pub task_id: i64,
    pub keyword: String,
    pub round: i64,
    pub platform: String,
    pub sub_query: Option<String>,
    pub created_at: DateTime<Utc>,
    pub domain: String,
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub task_id: i64,
    pub keywords: Vec<String>,
    pub platforms: Vec<String>,
    pub query_count: u32,
    pub status: TaskStatus,
    pub settings: TaskSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub metadata: TaskMetadata,
    pub progress: ProgressCounts,
    pub platforms: Vec<PlatformView>,
    pub summary: Vec<SummaryRow>,
    pub detail: Vec<DetailRow>,
}

/// The external `GET /status` shape, spec.md section 6: `none | pending |
/// done | multiple`, the last used when a caller asked for more than one
/// task id (the projector's unified path, see DESIGN.md open-question 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusResponse {
    None,
    Pending { data: Box<TaskStatusView> },
    Done { data: Box<TaskStatusView> },
    Multiple { data: Vec<TaskStatusView> },
    TableNotFound { data: Value },
}
