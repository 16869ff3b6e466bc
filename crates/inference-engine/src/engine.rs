//! Inference Engine Implementation

use crate::artifacts::ArtifactBundle;
use crate::classifier::{Classifier, POSITIVE_CLASS};
use crate::forest::RandomForest;
use crate::{InferenceError, ModelError};
use feature_engine::FeatureVector;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Positive-class probability at or above which an engine is flagged
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Scored request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PredictionResult {
    /// Probability of the "fails soon" class
    pub fail_probability: f64,
    /// 1 when `fail_probability` reaches the decision threshold
    pub fail_soon: u8,
}

/// Per-feature contributions to the failure probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExplanationResult {
    pub feature_names: Vec<String>,
    pub shap_values: Vec<f64>,
}

/// Destination for completed predictions.
///
/// Recording is best effort: the engine logs a failed write and still
/// returns the prediction.
pub trait PredictionSink: Send + Sync {
    fn record(
        &self,
        input: &FeatureVector,
        output: &PredictionResult,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Scores and explains raw feature dictionaries against a loaded bundle
pub struct InferenceEngine<C = RandomForest> {
    bundle: ArtifactBundle<C>,
    sink: Arc<dyn PredictionSink>,
    decision_threshold: f64,
}

impl<C> InferenceEngine<C>
where
    C: Classifier + Serialize + DeserializeOwned,
{
    /// Load the artifact bundle from `models_dir`; any missing or
    /// inconsistent file is an error
    pub fn load(
        models_dir: impl AsRef<Path>,
        sink: Arc<dyn PredictionSink>,
    ) -> Result<Self, InferenceError> {
        let models_dir = models_dir.as_ref();
        info!("Loading inference artifacts from {}", models_dir.display());
        let bundle = ArtifactBundle::load(models_dir)?;
        Ok(Self::new(bundle, sink))
    }
}

impl<C: Classifier> InferenceEngine<C> {
    /// Create an engine around an in-memory bundle
    pub fn new(bundle: ArtifactBundle<C>, sink: Arc<dyn PredictionSink>) -> Self {
        Self {
            bundle,
            sink,
            decision_threshold: DECISION_THRESHOLD,
        }
    }

    /// Override the decision threshold; must lie in [0, 1]
    pub fn with_decision_threshold(mut self, threshold: f64) -> Result<Self, ModelError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ModelError::InvalidConfig(format!(
                "decision threshold {threshold} outside [0, 1]"
            )));
        }
        self.decision_threshold = threshold;
        Ok(self)
    }

    /// Score one feature dictionary and record the outcome
    pub fn predict(&self, input: &HashMap<String, f64>) -> Result<PredictionResult, InferenceError> {
        let start = Instant::now();
        let vector = self.bundle.schema().build(input);
        let scaled = self.bundle.scaler().transform_row(vector.values())?;
        let proba = self.bundle.model().predict_proba(&scaled)?;

        let fail_probability = proba[POSITIVE_CLASS];
        let result = PredictionResult {
            fail_probability,
            fail_soon: u8::from(fail_probability >= self.decision_threshold),
        };
        debug!(
            "Prediction p={:.4} fail_soon={} in {}us",
            result.fail_probability,
            result.fail_soon,
            start.elapsed().as_micros()
        );

        if let Err(e) = self.sink.record(&vector, &result) {
            warn!("Failed to record prediction: {}", e);
        }

        Ok(result)
    }

    /// Per-feature attributions for the positive class, in schema order
    pub fn explain(&self, input: &HashMap<String, f64>) -> Result<ExplanationResult, InferenceError> {
        let start = Instant::now();
        let vector = self.bundle.schema().build(input);
        let scaled = self.bundle.scaler().transform_row(vector.values())?;
        let shap_values = self.bundle.model().attribute(&scaled)?.into_positive()?;

        if shap_values.len() != vector.len() {
            return Err(ModelError::DimensionMismatch {
                expected: vector.len(),
                actual: shap_values.len(),
            }
            .into());
        }
        debug!("Explanation computed in {}us", start.elapsed().as_micros());

        Ok(ExplanationResult {
            feature_names: vector.names().to_vec(),
            shap_values,
        })
    }

    /// An engine only exists once its bundle has loaded
    pub fn is_loaded(&self) -> bool {
        true
    }

    pub fn feature_names(&self) -> &[String] {
        self.bundle.feature_names()
    }

    pub fn decision_threshold(&self) -> f64 {
        self.decision_threshold
    }

    pub fn bundle(&self) -> &ArtifactBundle<C> {
        &self.bundle
    }
}
