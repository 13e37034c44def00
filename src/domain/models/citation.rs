//! Citation and sub-query domain models — spec.md section 3 / 4.3 / 4.6.

use serde::{Deserialize, Serialize};

/// A sub-query the platform issued while answering, as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: i64,
    pub record_id: i64,
    pub query: String,
    pub query_order: i32,
}

/// A citation as it travels through interception/normalization, before it
/// is assigned a stable id by persistence. `url` is the only required
/// field; everything else has a documented fallback chain (spec.md 4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawCitation {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub site_name: Option<String>,
    /// Platform-assigned numeric anchor, or position-assigned fallback.
    pub cite_index: i32,
    /// Offsets into the record's sub-query list that this citation binds to.
    pub query_indexes: Vec<i32>,
}

impl RawCitation {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            snippet: None,
            site_name: None,
            cite_index: 0,
            query_indexes: Vec::new(),
        }
    }
}

/// A citation with its registrable domain resolved, ready to be persisted —
/// the Result Normalizer's output shape, before storage assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationInput {
    pub cite_index: i32,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub site_name: Option<String>,
    pub query_indexes: Option<Vec<i32>>,
}

/// A citation as persisted, with its assigned surrogate id and resolved
/// registrable domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: i64,
    pub record_id: i64,
    pub cite_index: i32,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub site_name: Option<String>,
    pub query_indexes: Option<Vec<i32>>,
}

/// One row per (citation, originating sub-query) — spec.md section 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSubQueryLog {
    pub id: i64,
    pub task_query_id: Option<i64>,
    pub sub_query: Option<String>,
    pub record_id: i64,
    pub citation_id: Option<i64>,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub site_name: Option<String>,
    pub cite_index: i32,
}

/// Rolling per-domain statistics — spec.md section 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainStats {
    pub domain: String,
    pub total_citations: i64,
    pub keyword_coverage: i64,
    pub platforms: serde_json::Value,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

/// One CSV row for `GET /export` — spec.md section 6's header
/// `[task_id, query, platforms, sub_query, url, domain, title, snippet,
/// site_name, cite_index, created_at]`. Denormalized across
/// `search_records` and `executor_sub_query_log` so export needs no
/// further joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRow {
    pub task_id: i64,
    pub keyword: String,
    pub platform: String,
    pub sub_query: Option<String>,
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub site_name: Option<String>,
    pub cite_index: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
