//! Shared state for the HTTP surface — spec.md section 6.

use std::sync::Arc;

use crate::application::TaskEngine;
use crate::domain::ports::{SearchRepository, StatusProjector};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TaskEngine>,
    pub search_repo: Arc<dyn SearchRepository>,
    pub status_projector: Arc<dyn StatusProjector>,
}
