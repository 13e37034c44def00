//! Domain models
//!
//! Pure domain entities for the task engine. These models are
//! framework-agnostic and contain no infrastructure concerns.

pub mod citation;
pub mod provider;
pub mod search_record;
pub mod status;
pub mod task_job;
pub mod task_query;

pub use citation::{
    Citation, CitationInput, DomainStats, ExecutorSubQueryLog, ExportRow, RawCitation, SearchQuery,
};
pub use provider::{NormalizedOutput, SearchOutput};
pub use search_record::{NewSearchRecord, SearchRecord, SearchStatus};
pub use status::{
    CitationView, DetailRow, PlatformStatus, PlatformView, ProgressCounts, StatusResponse,
    SubQueryGroup, SummaryRow, TaskMetadata, TaskStatusView,
};
pub use task_job::{SubmitTask, TaskJob, TaskSettings, TaskStatus};
pub use task_query::TaskQuery;
