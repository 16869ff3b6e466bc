//! Turbofan Failure-Risk API Server
//!
//! HTTP surface over the inference engine: scoring, explanations, health,
//! Prometheus metrics and an OpenAPI document. The artifact bundle is
//! loaded once before the listener binds and is shared read-only by every
//! handler.

use axum::Router;
use feature_engine::FeatureVector;
use inference_engine::{InferenceEngine, PredictionResult, PredictionSink, RandomForest};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use storage::PredictionLog;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod error;
mod routes;

pub use config::{LogFormat, ServerConfig};
pub use error::{ApiError, ErrorBody};
pub use routes::{ApiDoc, FeatureRequest, HealthResponse};

/// Application state shared across handlers
pub struct AppState {
    /// Loaded artifact bundle and prediction sink
    pub engine: Arc<InferenceEngine>,
    /// Prometheus handle when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(engine: InferenceEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Counts failed writes of the wrapped sink
pub struct MeteredSink<S> {
    inner: S,
}

impl<S: PredictionSink> MeteredSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: PredictionSink> PredictionSink for MeteredSink<S> {
    fn record(
        &self,
        input: &FeatureVector,
        output: &PredictionResult,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let result = self.inner.record(input, output);
        if result.is_err() {
            metrics::counter!("prediction_log_failures_total").increment(1);
        }
        result
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging
pub fn init_logging(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let level: Level = config.log_level.parse()?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    match config.log_format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

/// Load the model, open the prediction log and serve until shutdown
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log = PredictionLog::open(&config.prediction_log)?;
    let sink: Arc<dyn PredictionSink> = Arc::new(MeteredSink::new(log));

    let engine = InferenceEngine::<RandomForest>::load(&config.models_dir, sink)?
        .with_decision_threshold(config.decision_threshold)?;
    info!(
        "Model ready: {} features, decision threshold {}",
        engine.feature_names().len(),
        engine.decision_threshold()
    );

    let mut state = AppState::new(engine);
    if config.metrics {
        state = state.with_metrics(PrometheusBuilder::new().install_recorder()?);
    }
    let app = create_router(Arc::new(state));

    info!("Starting API server on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
