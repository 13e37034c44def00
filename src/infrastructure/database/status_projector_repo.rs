use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::errors::ProjectionError;
use crate::domain::models::{
    CitationView, DetailRow, PlatformStatus, PlatformView, ProgressCounts, SubQueryGroup,
    SummaryRow, TaskMetadata, TaskStatus, TaskStatusView,
};
use crate::domain::ports::status_projector::StatusProjector;

pub struct StatusProjectorImpl {
    pool: PgPool,
}

impl StatusProjectorImpl {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn project_one(&self, task_id: i64) -> Result<Option<TaskStatusView>, ProjectionError> {
        let job: Option<(
            i64,
            serde_json::Value,
            serde_json::Value,
            i32,
            String,
            serde_json::Value,
            chrono::DateTime<chrono::Utc>,
            chrono::DateTime<chrono::Utc>,
        )> = sqlx::query_as(
            r#"
            SELECT id, keywords, platforms, query_count, status, settings, created_at, updated_at
            FROM task_jobs WHERE id = $1
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(as_projection_error)?;

        let Some(job) = job else {
            return Ok(None);
        };

        let keywords: Vec<String> = serde_json::from_value(job.1).unwrap_or_default();
        let platforms: Vec<String> = serde_json::from_value(job.2).unwrap_or_default();
        let settings = serde_json::from_value(job.5).unwrap_or_default();
        let status = TaskStatus::from_str(&job.4).unwrap_or(TaskStatus::Pending);

        let records: Vec<(
            i64,
            String,
            Option<i64>,
            String,
            Option<String>,
            i64,
            chrono::DateTime<chrono::Utc>,
        )> = sqlx::query_as(
            r#"
            SELECT id, platform, task_query_id, search_status, error_message,
                   COALESCE(response_time_ms, 0), created_at
            FROM search_records WHERE task_id = $1
            ORDER BY task_query_id, platform, created_at
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(as_projection_error)?;

        let expected_rounds = keywords.len() as i64 * platforms.len() as i64 * job.3 as i64;
        let completed = records
            .iter()
            .filter(|r| r.3 == "completed")
            .count() as i64;
        let failed = records.iter().filter(|r| r.3 == "failed").count() as i64;
        let total = records.len() as i64;
        let progress = ProgressCounts {
            completed,
            failed,
            pending: (expected_rounds - total).max(0),
            total: expected_rounds,
        };

        let mut by_platform: BTreeMap<String, Vec<&(
            i64,
            String,
            Option<i64>,
            String,
            Option<String>,
            i64,
            chrono::DateTime<chrono::Utc>,
        )>> = BTreeMap::new();
        for record in &records {
            by_platform.entry(record.1.clone()).or_default().push(record);
        }

        let mut platform_views = Vec::new();
        for (platform, recs) in &by_platform {
            let last = recs.last().expect("non-empty group");
            let platform_status = if recs.iter().any(|r| r.3 == "failed") && !recs.iter().any(|r| r.3 == "completed") {
                PlatformStatus::Failed
            } else if recs.iter().all(|r| r.3 == "completed") {
                PlatformStatus::Completed
            } else {
                PlatformStatus::Pending
            };

            let mut citation_count = 0i64;
            let mut groups: HashMap<Option<String>, Vec<CitationView>> = HashMap::new();
            for record in recs {
                let rows: Vec<(
                    Option<String>,
                    String,
                    String,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                    i32,
                )> = sqlx::query_as(
                    r#"
                    SELECT sub_query, url, domain, title, snippet, site_name, cite_index
                    FROM executor_sub_query_log WHERE record_id = $1
                    ORDER BY cite_index, id
                    "#,
                )
                .bind(record.0)
                .fetch_all(&self.pool)
                .await
                .map_err(as_projection_error)?;

                citation_count += rows.len() as i64;
                for row in rows {
                    groups.entry(row.0.clone()).or_default().push(CitationView {
                        url: row.1,
                        domain: row.2,
                        title: row.3,
                        snippet: row.4,
                        site_name: row.5,
                        cite_index: row.6,
                    });
                }
            }

            let mut platform_view = PlatformView {
                platform: platform.clone(),
                status: platform_status,
                sub_query_groups: groups
                    .into_iter()
                    .map(|(sub_query, citations)| SubQueryGroup {
                        sub_query,
                        citations,
                    })
                    .collect(),
                last_record_id: Some(last.0),
                citation_count,
                last_latency_ms: Some(last.5),
                last_error: last.4.clone(),
                query_tokens: None,
            };
            platform_view.query_tokens = platform_view.query_tokens_joined();
            platform_views.push(platform_view);
        }

        let summary_rows: Vec<(String, String, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT r.keyword, r.platform, l.sub_query, COUNT(DISTINCT l.url)
            FROM executor_sub_query_log l
            JOIN search_records r ON r.id = l.record_id
            WHERE r.task_id = $1
            GROUP BY r.keyword, r.platform, l.sub_query
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(as_projection_error)?;

        let summary = summary_rows
            .into_iter()
            .map(|(keyword, platform, sub_query, count)| SummaryRow {
                keyword,
                platform,
                sub_query,
                distinct_citation_count: count,
            })
            .collect();

        // Round numbers: the k-th SearchRecord by created_at within
        // (task_query_id, platform) is round k (spec.md section 4.8),
        // relying on the engine's sequential single-writer execution order.
        let mut round_counters: HashMap<(Option<i64>, String), i64> = HashMap::new();
        let mut round_by_record: HashMap<i64, i64> = HashMap::new();
        for record in &records {
            let key = (record.2, record.1.clone());
            let counter = round_counters.entry(key).or_insert(0);
            *counter += 1;
            round_by_record.insert(record.0, *counter);
        }

        let detail_rows: Vec<(
            i64,
            i64,
            String,
            String,
            Option<String>,
            chrono::DateTime<chrono::Utc>,
            String,
            String,
            Option<String>,
            Option<String>,
        )> = sqlx::query_as(
            r#"
            SELECT r.id, r.task_id, r.keyword, r.platform, l.sub_query, r.created_at,
                   l.domain, l.url, l.title, l.snippet
            FROM executor_sub_query_log l
            JOIN search_records r ON r.id = l.record_id
            WHERE r.task_id = $1
            ORDER BY r.task_query_id, r.created_at
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(as_projection_error)?;

        let detail = detail_rows
            .into_iter()
            .map(|row| DetailRow {
                task_id: row.1,
                keyword: row.2,
                round: round_by_record.get(&row.0).copied().unwrap_or(0),
                platform: row.3,
                sub_query: row.4,
                created_at: row.5,
                domain: row.6,
                url: row.7,
                title: row.8,
                snippet: row.9,
            })
            .collect();

        Ok(Some(TaskStatusView {
            metadata: TaskMetadata {
                task_id: job.0,
                keywords,
                platforms,
                query_count: job.3 as u32,
                status,
                settings,
                created_at: job.6,
                updated_at: job.7,
            },
            progress,
            platforms: platform_views,
            summary,
            detail,
        }))
    }
}

#[async_trait]
impl StatusProjector for StatusProjectorImpl {
    async fn project(&self, task_ids: &[i64]) -> Result<Vec<TaskStatusView>, ProjectionError> {
        let mut views = Vec::with_capacity(task_ids.len());
        for &id in task_ids {
            if let Some(view) = self.project_one(id).await? {
                views.push(view);
            }
        }
        Ok(views)
    }
}

/// Maps Postgres's undefined-table code (42P01) onto `table_not_found`
/// instead of propagating a raw database error — spec.md section 4.8.
fn as_projection_error(err: sqlx::Error) -> ProjectionError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("42P01") {
            return ProjectionError::TableNotFound(db_err.message().to_string());
        }
    }
    ProjectionError::Database(err)
}
