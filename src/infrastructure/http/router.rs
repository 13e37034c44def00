//! Router wiring — spec.md section 6.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers::{get_export, get_status, post_mock};
use super::state::AppState;

#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/mock", post(post_mock))
        .route("/status", get(get_status))
        .route("/export", get(get_export))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
