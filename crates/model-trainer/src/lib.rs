//! Model Trainer
//!
//! Fits the scaler and random forest on the labeled training table,
//! evaluates on a stratified hold-out split and persists the artifact
//! bundle the inference engine loads.

mod report;
mod split;
mod trainer;

pub use report::{ClassMetrics, ClassificationReport};
pub use split::{stratified_split, Split};
pub use trainer::{
    prepare, train, train_from_csv, TrainConfig, TrainingData, TrainingOutcome, DROPPED_COLUMNS,
};

use feature_engine::FeatureError;
use inference_engine::{ArtifactError, ModelError};
use thiserror::Error;

/// Training errors
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Column '{0}' not found in processed data")]
    MissingLabel(String),
    #[error("Invalid label {value} at row {row}; expected 0 or 1")]
    InvalidLabel { row: usize, value: f64 },
    #[error("No feature columns left after dropping label columns")]
    NoFeatures,
    #[error("Invalid train/test split: {0}")]
    InvalidSplit(String),
    #[error("Data error: {0}")]
    Feature(#[from] FeatureError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}
