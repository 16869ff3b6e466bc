//! Prometheus exposition

use axum::extract::State;
use std::sync::Arc;

use crate::{ApiError, AppState};

pub async fn render(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or(ApiError::MetricsDisabled)
}
