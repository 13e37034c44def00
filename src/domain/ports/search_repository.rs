//! Search result repository port — `search_records`, `search_queries`,
//! `citations`, `executor_sub_query_log`, `domain_stats`.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Citation, CitationInput, DomainStats, ExecutorSubQueryLog, ExportRow, NewSearchRecord, SearchRecord,
};

/// Everything the Persistence Orchestrator writes for a single completed
/// (or failed) unit of work, committed together in one transaction —
/// spec.md section 4.7.
#[derive(Debug, Clone)]
pub struct PersistUnit {
    pub record: NewSearchRecord,
    pub sub_queries: Vec<String>,
    pub citations: Vec<CitationInput>,
}

/// Repository interface for search-result persistence.
#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// Persists one unit of work's record, sub-queries, citations, the
    /// denormalized sub-query log rows, and rolls `domain_stats` forward,
    /// all inside a single transaction.
    async fn persist_unit(&self, unit: PersistUnit) -> DomainResult<SearchRecord>;

    async fn records_for_task(&self, task_id: i64) -> DomainResult<Vec<SearchRecord>>;

    async fn citations_for_record(&self, record_id: i64) -> DomainResult<Vec<Citation>>;

    async fn sub_query_log_for_task(&self, task_id: i64) -> DomainResult<Vec<ExecutorSubQueryLog>>;

    async fn domain_stats(&self, domain: &str) -> DomainResult<Option<DomainStats>>;

    /// Every citation row for a task, denormalized and ordered by
    /// `(task_id, task_query_id, created_at)`, ready to stream out as CSV —
    /// spec.md section 6.
    async fn export_rows_for_task(&self, task_id: i64) -> DomainResult<Vec<ExportRow>>;
}
