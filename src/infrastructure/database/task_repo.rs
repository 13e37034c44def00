use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::{SubmitTask, TaskJob, TaskQuery, TaskStatus};
use crate::domain::ports::task_repository::{TaskFilter, TaskRepository};

pub struct TaskRepositoryImpl {
    pool: PgPool,
}

impl TaskRepositoryImpl {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: TaskJobRow) -> Result<TaskJob, serde_json::Error> {
        Ok(TaskJob {
            id: row.id,
            keywords: serde_json::from_value(row.keywords)?,
            platforms: serde_json::from_value(row.platforms)?,
            query_count: row.query_count as u32,
            status: TaskStatus::from_str(&row.status).unwrap_or(TaskStatus::Pending),
            settings: serde_json::from_value(row.settings)?,
            result_data: row.result_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskJobRow {
    id: i64,
    keywords: serde_json::Value,
    platforms: serde_json::Value,
    query_count: i32,
    status: String,
    settings: serde_json::Value,
    result_data: Option<serde_json::Value>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn submit(&self, input: SubmitTask) -> DomainResult<TaskJob> {
        let platforms: Vec<String> = input
            .platforms
            .iter()
            .map(|p| p.to_lowercase())
            .collect();
        let settings_value = serde_json::to_value(&input.settings)?;

        let mut tx = self.pool.begin().await?;

        let row: TaskJobRow = sqlx::query_as(
            r#"
            INSERT INTO task_jobs (keywords, platforms, query_count, status, settings)
            VALUES ($1, $2, $3, 'pending', $4)
            RETURNING id, keywords, platforms, query_count, status, settings,
                      result_data, created_at, updated_at
            "#,
        )
        .bind(serde_json::to_value(&input.keywords)?)
        .bind(serde_json::to_value(&platforms)?)
        .bind(input.query_count as i32)
        .bind(settings_value)
        .fetch_one(&mut *tx)
        .await?;

        for keyword in &input.keywords {
            sqlx::query("INSERT INTO task_query (task_id, query) VALUES ($1, $2)")
                .bind(row.id)
                .bind(keyword)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(task_id = row.id, "task submitted");
        Ok(Self::row_to_job(row)?)
    }

    async fn get(&self, id: i64) -> DomainResult<Option<TaskJob>> {
        let row: Option<TaskJobRow> = sqlx::query_as(
            r#"
            SELECT id, keywords, platforms, query_count, status, settings,
                   result_data, created_at, updated_at
            FROM task_jobs WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_job).transpose().map_err(Into::into)
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<TaskJob>> {
        let status_filter = filter.status.map(|s| s.as_str().to_string());
        let ids_filter = filter.ids;

        let rows: Vec<TaskJobRow> = sqlx::query_as(
            r#"
            SELECT id, keywords, platforms, query_count, status, settings,
                   result_data, created_at, updated_at
            FROM task_jobs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::bigint[] IS NULL OR id = ANY($2))
            ORDER BY id
            "#,
        )
        .bind(status_filter)
        .bind(ids_filter)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_job)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn queries_for_task(&self, task_id: i64) -> DomainResult<Vec<TaskQuery>> {
        let rows: Vec<(i64, i64, String)> = sqlx::query_as(
            "SELECT id, task_id, query FROM task_query WHERE task_id = $1 ORDER BY id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, task_id, query)| TaskQuery { id, task_id, query })
            .collect())
    }

    async fn mark_done(&self, id: i64, result_data: serde_json::Value) -> DomainResult<()> {
        sqlx::query(
            r#"
            UPDATE task_jobs
            SET status = 'done', result_data = $2, updated_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(result_data)
        .execute(&self.pool)
        .await?;

        debug!(task_id = id, "task marked done");
        Ok(())
    }
}
