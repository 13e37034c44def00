//! Task Engine — spec.md section 4.1. Expands a submitted task into its
//! round x keyword x platform cross-product (outer to inner, spec.md
//! section 4.1's ordering, grounded on
//! `original_source/llm_sentry_monitor/core/task_executor.py`'s
//! `execute_task_job`), drives each unit through the provider registry,
//! normalizes the result, and persists it. Per-unit provider failures
//! become a failed `SearchRecord` and the task continues; only persistence
//! failures abort the remaining units.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::normalizer::{normalize, to_citation_inputs};
use crate::domain::errors::{DomainError, EngineError, ProviderError};
use crate::domain::models::{
    NewSearchRecord, NormalizedOutput, SearchRecord, SearchStatus, SubmitTask, TaskJob, TaskQuery,
    TaskSettings,
};
use crate::domain::ports::search_repository::{PersistUnit, SearchRepository};
use crate::domain::ports::task_repository::TaskRepository;
use crate::infrastructure::providers::ProviderRegistry;

const PROMPT_TYPE: &str = "api_task";

/// Per-platform single-writer enforcement (spec.md section 5): a mutex per
/// lower-cased platform name, created lazily and shared by every task this
/// engine drives, so two tasks never hold the same browser profile open at
/// once.
#[derive(Default)]
struct PlatformLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PlatformLocks {
    async fn get(&self, platform: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(platform.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

pub struct TaskEngine {
    tasks: Arc<dyn TaskRepository>,
    search: Arc<dyn SearchRepository>,
    providers: Arc<ProviderRegistry>,
    platform_locks: Arc<PlatformLocks>,
}

impl TaskEngine {
    #[must_use]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        search: Arc<dyn SearchRepository>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            tasks,
            search,
            providers,
            platform_locks: Arc::new(PlatformLocks::default()),
        }
    }

    /// Validates the submission and persists the `TaskJob` plus its
    /// `TaskQuery` rows. Does not run any unit — the caller spawns
    /// `execute` for background execution (spec.md section 5).
    pub async fn submit(&self, input: SubmitTask) -> Result<i64, DomainError> {
        input.validate().map_err(DomainError::InvalidArgument)?;
        let job = self.tasks.submit(input).await?;
        Ok(job.id)
    }

    /// Drains every unit of work for `task_id` in round -> keyword ->
    /// platform order. Only a persistence failure escapes this method; a
    /// provider/interceptor failure is recorded as a failed `SearchRecord`
    /// and execution moves on to the next unit.
    pub async fn execute(&self, task_id: i64, cancel: CancellationToken) -> Result<(), EngineError> {
        let job = match self.tasks.get(task_id).await.map_err(EngineError::from)? {
            Some(job) => job,
            None => {
                warn!(task_id, "execute called for an unknown task");
                return Ok(());
            }
        };

        let queries = self
            .tasks
            .queries_for_task(task_id)
            .await
            .map_err(EngineError::from)?;

        let total_units = queries.len() * job.platforms.len() * job.query_count as usize;
        let mut units_run = 0usize;
        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut was_cancelled = false;

        'rounds: for round_num in 1..=job.query_count {
            info!(task_id, round_num, query_count = job.query_count, "starting round");

            for task_query in &queries {
                for platform in &job.platforms {
                    if cancel.is_cancelled() {
                        was_cancelled = true;
                        break 'rounds;
                    }

                    units_run += 1;
                    let is_last_unit = units_run == total_units;

                    let record = self.run_unit(&job, task_query, platform, cancel.clone()).await?;
                    if record.search_status == SearchStatus::Completed {
                        completed += 1;
                    } else {
                        failed += 1;
                    }

                    if !is_last_unit {
                        let delay = Duration::from_secs(job.settings.delay_between_tasks);
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = cancel.cancelled() => {
                                was_cancelled = true;
                                break 'rounds;
                            }
                        }
                    }
                }
            }
        }

        let result_data = serde_json::json!({
            "completed": completed,
            "failed": failed,
            "cancelled": was_cancelled,
        });
        self.tasks
            .mark_done(task_id, result_data)
            .await
            .map_err(EngineError::from)?;

        info!(task_id, completed, failed, was_cancelled, "task execution finished");
        Ok(())
    }

    /// Runs one (keyword x platform x round) unit under the platform's
    /// single-writer lock and persists exactly one `SearchRecord`,
    /// regardless of whether the provider succeeded.
    async fn run_unit(
        &self,
        job: &TaskJob,
        task_query: &TaskQuery,
        platform: &str,
        cancel: CancellationToken,
    ) -> Result<SearchRecord, EngineError> {
        let platform_lock = self.platform_locks.get(platform).await;
        let _guard = platform_lock.lock().await;

        let started = Instant::now();
        let outcome = self
            .call_provider(&task_query.query, platform, &job.settings, cancel)
            .await;
        let elapsed_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let (full_answer, sub_queries, citations, error_message) = match outcome {
            Ok(normalized) => (
                normalized.answer_text,
                normalized.sub_queries,
                normalized.citations,
                None,
            ),
            Err(provider_err) => {
                warn!(
                    platform,
                    keyword = %task_query.query,
                    error = %provider_err,
                    "unit failed"
                );
                (
                    String::new(),
                    Vec::new(),
                    Vec::new(),
                    Some(format!("{}: {provider_err}", provider_err.kind())),
                )
            }
        };

        let search_status = SearchStatus::derive(&full_answer, error_message.as_deref());
        let record = NewSearchRecord {
            keyword: task_query.query.clone(),
            platform: platform.to_lowercase(),
            prompt_type: PROMPT_TYPE.to_string(),
            prompt: task_query.query.clone(),
            full_answer,
            response_time_ms: Some(elapsed_ms),
            search_status,
            error_message,
            task_id: Some(job.id),
            task_query_id: Some(task_query.id),
        };

        let unit = PersistUnit {
            record,
            sub_queries,
            citations: to_citation_inputs(&citations),
        };

        self.search.persist_unit(unit).await.map_err(EngineError::from)
    }

    async fn call_provider(
        &self,
        keyword: &str,
        platform: &str,
        settings: &TaskSettings,
        cancel: CancellationToken,
    ) -> Result<NormalizedOutput, ProviderError> {
        let provider = self.providers.get(platform)?;
        let output = provider.search(keyword, keyword, settings, cancel).await?;
        Ok(normalize(output))
    }
}
