//! Domain-level errors shared across the task engine.

use thiserror::Error;

/// Errors raised by domain logic that is not tied to any particular
/// infrastructure (database, browser, HTTP).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task not found: {0}")]
    TaskNotFound(i64),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

/// Errors a provider (or the interceptor underneath it) can raise for a
/// single unit of work. These map 1:1 onto the taxonomy in spec.md section 7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("no provider for {0}")]
    NoSuchProvider(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("operation timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,
}

impl ProviderError {
    /// The stable error-kind tag persisted alongside a failed `SearchRecord`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NoSuchProvider(_) => "provider_error",
            ProviderError::AuthRequired => "auth_required",
            ProviderError::Provider(_) => "provider_error",
            ProviderError::Timeout => "timeout",
            ProviderError::Cancelled => "cancelled",
        }
    }
}

/// Errors that can escape the Task Engine's `execute` loop. Per spec.md
/// section 7, only persistence failures are fatal to a task; everything
/// else is captured per-unit and recorded as a failed `SearchRecord`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("persistence error: {0}")]
    Persistence(#[from] DomainError),
}

/// Errors the Status Projector can surface instead of propagating.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
