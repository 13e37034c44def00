//! `POST /mock`, `GET /status`, `GET /export` — spec.md section 6.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::domain::errors::ProjectionError;
use crate::domain::models::{StatusResponse, SubmitTask, TaskSettings, TaskStatus};

use super::error::ApiError;
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MockRequest {
    pub keywords: Vec<String>,
    pub platforms: Vec<String>,
    #[serde(default = "default_query_count")]
    pub query_count: u32,
    #[serde(default)]
    pub settings: Option<PartialSettings>,
}

const fn default_query_count() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub headless: Option<bool>,
    pub timeout: Option<u64>,
    pub delay_between_tasks: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MockResponse {
    pub task_id: i64,
}

/// Persists the task and hands execution to a background task, returning
/// the id immediately — the engine runs independently of this request
/// (spec.md section 5).
pub async fn post_mock(
    State(state): State<AppState>,
    Json(body): Json<MockRequest>,
) -> Result<Json<MockResponse>, ApiError> {
    let mut settings = TaskSettings::default();
    if let Some(partial) = body.settings {
        if let Some(headless) = partial.headless {
            settings.headless = headless;
        }
        if let Some(timeout) = partial.timeout {
            settings.timeout_ms = timeout;
        }
        if let Some(delay) = partial.delay_between_tasks {
            settings.delay_between_tasks = delay;
        }
    }

    let input = SubmitTask {
        keywords: body.keywords,
        platforms: body.platforms,
        query_count: body.query_count,
        settings,
    };

    let task_id = state.engine.submit(input).await?;

    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.execute(task_id, CancellationToken::new()).await {
            error!(task_id, error = %e, "task execution aborted");
        }
    });

    Ok(Json(MockResponse { task_id }))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub id: Option<i64>,
    pub ids: Option<String>,
}

pub async fn get_status(State(state): State<AppState>, Query(params): Query<StatusQuery>) -> Response {
    let task_ids = parse_ids(params.id, params.ids);
    if task_ids.is_empty() {
        return Json(StatusResponse::None).into_response();
    }

    match state.status_projector.project(&task_ids).await {
        Ok(views) if views.is_empty() => Json(StatusResponse::None).into_response(),
        Ok(mut views) => {
            if task_ids.len() > 1 {
                Json(StatusResponse::Multiple { data: views }).into_response()
            } else {
                let view = views.remove(0);
                let response = match view.metadata.status {
                    TaskStatus::Done => StatusResponse::Done { data: Box::new(view) },
                    TaskStatus::Pending => StatusResponse::Pending { data: Box::new(view) },
                };
                Json(response).into_response()
            }
        }
        Err(ProjectionError::TableNotFound(message)) => {
            Json(StatusResponse::TableNotFound {
                data: serde_json::json!({ "message": message }),
            })
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "status projection failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub ids: String,
}

/// Streams a UTF-8-with-BOM CSV, one row per `ExecutorSubQueryLog` entry,
/// ordered by (task_id, task_query_id, created_at) — spec.md section 6.
pub async fn get_export(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let task_ids = parse_ids(None, Some(params.ids));

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record([
            "task_id",
            "query",
            "platforms",
            "sub_query",
            "url",
            "domain",
            "title",
            "snippet",
            "site_name",
            "cite_index",
            "created_at",
        ])
        .map_err(csv_error)?;

    for task_id in task_ids {
        let rows = state.search_repo.export_rows_for_task(task_id).await?;
        for row in rows {
            writer
                .write_record([
                    row.task_id.to_string(),
                    row.keyword,
                    row.platform,
                    row.sub_query.unwrap_or_default(),
                    row.url,
                    row.domain,
                    row.title.unwrap_or_default(),
                    row.snippet.unwrap_or_default(),
                    row.site_name.unwrap_or_default(),
                    row.cite_index.to_string(),
                    row.created_at.to_rfc3339(),
                ])
                .map_err(csv_error)?;
        }
    }

    let csv_bytes = writer.into_inner().map_err(|e| ApiError::from_message(e.to_string()))?;
    let mut body = vec![0xEF, 0xBB, 0xBF];
    body.extend(csv_bytes);

    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response())
}

fn parse_ids(id: Option<i64>, ids: Option<String>) -> Vec<i64> {
    if let Some(csv_ids) = ids {
        return csv_ids.split(',').filter_map(|s| s.trim().parse::<i64>().ok()).collect();
    }
    id.into_iter().collect()
}

fn csv_error(e: csv::Error) -> ApiError {
    ApiError::from_message(format!("csv encode error: {e}"))
}
