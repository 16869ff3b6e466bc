//! Offline pipeline configuration

use crate::labels::DEFAULT_RUL_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Raw sensor log consumed by feature engineering
pub const DEFAULT_RAW_PATH: &str = "data/raw/nasa_turbofan_train.csv";
/// Labeled table produced by feature engineering and consumed by training
pub const DEFAULT_PROCESSED_PATH: &str = "data/processed/features_train.csv";
/// Directory holding the trained artifact bundle
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Paths and policy shared by the feature-engineering and training CLIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub raw_path: PathBuf,
    pub processed_path: PathBuf,
    pub models_dir: PathBuf,
    /// RUL at or below which a reading is labeled `fail_soon`
    pub rul_threshold: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from(DEFAULT_RAW_PATH),
            processed_path: PathBuf::from(DEFAULT_PROCESSED_PATH),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            rul_threshold: DEFAULT_RUL_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Load defaults, then `config/pipeline.*` if present, then `TURBOFAN_*` variables
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("raw_path", DEFAULT_RAW_PATH)?
            .set_default("processed_path", DEFAULT_PROCESSED_PATH)?
            .set_default("models_dir", DEFAULT_MODELS_DIR)?
            .set_default("rul_threshold", i64::from(DEFAULT_RUL_THRESHOLD))?
            .add_source(config::File::with_name("config/pipeline").required(false))
            .add_source(config::Environment::with_prefix("TURBOFAN").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn log_config(&self) {
        info!("Pipeline configuration:");
        info!("  raw_path       : {}", self.raw_path.display());
        info!("  processed_path : {}", self.processed_path.display());
        info!("  models_dir     : {}", self.models_dir.display());
        info!("  rul_threshold  : {}", self.rul_threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.rul_threshold, 30);
        assert_eq!(config.models_dir, PathBuf::from("models"));
        assert_eq!(
            config.processed_path,
            PathBuf::from("data/processed/features_train.csv")
        );
    }
}
