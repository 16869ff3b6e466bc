//! Route gateway

use axum::routing::{get, post};
use axum::Router;
use inference_engine::{ExplanationResult, PredictionResult};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::ErrorBody;
use crate::AppState;

mod docs;
mod health;
mod landing;
mod predictions;
mod telemetry;

pub use health::HealthResponse;
pub use predictions::FeatureRequest;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Walbrydge IoT Predictive Maintenance",
        description = "Internal service for predicting upcoming equipment failures using NASA turbofan sensor data."
    ),
    paths(health::health, predictions::predict, predictions::explain),
    components(schemas(
        FeatureRequest,
        PredictionResult,
        ExplanationResult,
        HealthResponse,
        ErrorBody
    )),
    tags((name = "inference", description = "Failure-risk scoring and attributions"))
)]
pub struct ApiDoc;

pub(crate) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(landing::index))
        .route("/health", get(health::health).post(health::health))
        .route("/predict", post(predictions::predict))
        .route("/explain", post(predictions::explain))
        .route("/metrics", get(telemetry::render))
        .route("/api/openapi.json", get(docs::openapi))
        .route("/api/docs", get(docs::swagger_ui))
}
