//! Service configuration

use inference_engine::DECISION_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MODELS_DIR: &str = "models";
pub const DEFAULT_PREDICTION_LOG: &str = "logs/predictions.jsonl";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Serving shell settings, fixed for the lifetime of the process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub models_dir: PathBuf,
    pub prediction_log: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Probability at or above which `fail_soon` is 1
    pub decision_threshold: f64,
    /// Install the Prometheus recorder and serve `/metrics`
    pub metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            prediction_log: PathBuf::from(DEFAULT_PREDICTION_LOG),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::Text,
            decision_threshold: DECISION_THRESHOLD,
            metrics: true,
        }
    }
}

impl ServerConfig {
    /// Load defaults, then `config/service.*` if present, then `TURBOFAN_*` variables
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .set_default("models_dir", DEFAULT_MODELS_DIR)?
            .set_default("prediction_log", DEFAULT_PREDICTION_LOG)?
            .set_default("log_level", DEFAULT_LOG_LEVEL)?
            .set_default("log_format", "text")?
            .set_default("decision_threshold", DECISION_THRESHOLD)?
            .set_default("metrics", true)?
            .add_source(config::File::with_name("config/service").required(false))
            .add_source(config::Environment::with_prefix("TURBOFAN").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn log_config(&self) {
        info!("Service configuration:");
        info!("  bind_addr          : {}", self.bind_addr);
        info!("  models_dir         : {}", self.models_dir.display());
        info!("  prediction_log     : {}", self.prediction_log.display());
        info!("  decision_threshold : {}", self.decision_threshold);
        info!("  metrics            : {}", self.metrics);
    }
}
