//! Prediction Routes

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use inference_engine::{ExplanationResult, PredictionResult};
use metrics::{counter, histogram};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use utoipa::ToSchema;

use crate::error::ErrorBody;
use crate::{ApiError, AppState};

/// Request body shared by `/predict` and `/explain`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FeatureRequest {
    /// Arbitrary feature mapping; unknown names are ignored, missing ones default to 0
    pub features: HashMap<String, f64>,
}

/// Score one reading
#[utoipa::path(
    post,
    path = "/predict",
    tag = "inference",
    request_body = FeatureRequest,
    responses(
        (status = 200, description = "Failure probability and decision", body = PredictionResult),
        (status = 422, description = "Body is not a feature mapping", body = ErrorBody),
        (status = 500, description = "Scoring failed", body = ErrorBody)
    )
)]
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FeatureRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(request) = payload?;
    let start = Instant::now();

    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || engine.predict(&request.features)).await??;

    counter!("predictions_total").increment(1);
    histogram!("inference_latency_seconds", "endpoint" => "predict")
        .record(start.elapsed().as_secs_f64());
    debug!("Served prediction: fail_soon={}", result.fail_soon);

    Ok(Json(result))
}

/// Attribute the failure probability of one reading to its features
#[utoipa::path(
    post,
    path = "/explain",
    tag = "inference",
    request_body = FeatureRequest,
    responses(
        (status = 200, description = "Per-feature attributions in model order", body = ExplanationResult),
        (status = 422, description = "Body is not a feature mapping", body = ErrorBody),
        (status = 500, description = "Attribution failed", body = ErrorBody)
    )
)]
pub async fn explain(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FeatureRequest>, JsonRejection>,
) -> Result<Json<ExplanationResult>, ApiError> {
    let Json(request) = payload?;
    let start = Instant::now();

    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || engine.explain(&request.features)).await??;

    counter!("explanations_total").increment(1);
    histogram!("inference_latency_seconds", "endpoint" => "explain")
        .record(start.elapsed().as_secs_f64());

    Ok(Json(result))
}
