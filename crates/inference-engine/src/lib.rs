//! Failure-Risk Inference Engine
//!
//! Scores canonical feature vectors with a random forest and explains the
//! score with exact TreeSHAP attributions. The trained artifact bundle is
//! loaded once and shared read-only between requests.

mod artifacts;
mod classifier;
mod engine;
mod forest;
mod scaler;
mod shap;

pub use artifacts::{ArtifactBundle, ArtifactPaths, FEATURES_FILE, MODEL_FILE, SCALER_FILE};
pub use classifier::{Attribution, Classifier, NEGATIVE_CLASS, POSITIVE_CLASS};
pub use engine::{
    ExplanationResult, InferenceEngine, PredictionResult, PredictionSink, DECISION_THRESHOLD,
};
pub use forest::{DecisionTree, ForestConfig, MaxFeatures, Node, RandomForest};
pub use scaler::StandardScaler;

use std::path::PathBuf;
use thiserror::Error;

/// Classifier and scaler contract violations
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model has not been fitted")]
    NotFitted,
    #[error("Training data is empty")]
    EmptyDataset,
    #[error("Invalid input shape: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Label count {labels} does not match row count {rows}")]
    LabelMismatch { rows: usize, labels: usize },
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
    #[error("Malformed model structure: {0}")]
    Malformed(String),
    #[error("Unsupported attribution layout: {0}")]
    UnsupportedAttribution(String),
}

/// Errors while persisting or loading the artifact bundle
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {0}")]
    Missing(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Artifacts come from different training runs: {0}")]
    Mismatch(String),
    #[error("Artifacts disagree on feature count: {0}")]
    Inconsistent(String),
}

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Artifact load failed: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("Inference failed: {0}")]
    Model(#[from] ModelError),
}
