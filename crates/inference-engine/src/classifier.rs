//! Classifier seam between the pipeline and the statistical model

use crate::ModelError;
use ndarray::ArrayView2;

/// Index of the "healthy" class
pub const NEGATIVE_CLASS: usize = 0;
/// Index of the "fails soon" class
pub const POSITIVE_CLASS: usize = 1;

/// Per-feature contributions for one scored row
#[derive(Debug, Clone, PartialEq)]
pub enum Attribution {
    /// One attribution row per class, indexed by class
    PerClass(Vec<Vec<f64>>),
    /// A single row already expressed for the positive class
    Single(Vec<f64>),
}

impl Attribution {
    /// Contributions towards the positive class
    pub fn into_positive(self) -> Result<Vec<f64>, ModelError> {
        match self {
            Attribution::PerClass(mut rows) if rows.len() == 2 => {
                Ok(rows.swap_remove(POSITIVE_CLASS))
            }
            Attribution::PerClass(rows) => Err(ModelError::UnsupportedAttribution(format!(
                "expected 2 class rows, got {}",
                rows.len()
            ))),
            Attribution::Single(values) => Ok(values),
        }
    }
}

/// Binary probabilistic classifier with exact per-feature attributions
pub trait Classifier {
    /// Fit on a scaled feature matrix and 0/1 labels
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[u8]) -> Result<(), ModelError>;

    /// Class probabilities `[negative, positive]` for one scaled row
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2], ModelError>;

    /// Per-feature attributions for one scaled row
    fn attribute(&self, row: &[f64]) -> Result<Attribution, ModelError>;

    /// Width of the rows this classifier accepts
    fn n_features(&self) -> usize;

    /// Structural check run after deserialization
    fn validate(&self) -> Result<(), ModelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_class_selects_positive_row() {
        let attribution = Attribution::PerClass(vec![vec![-0.2, 0.1], vec![0.2, -0.1]]);
        assert_eq!(attribution.into_positive().unwrap(), vec![0.2, -0.1]);
    }

    #[test]
    fn test_single_row_used_directly() {
        let attribution = Attribution::Single(vec![0.5, 0.25]);
        assert_eq!(attribution.into_positive().unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn test_multiclass_rows_rejected() {
        let attribution = Attribution::PerClass(vec![vec![0.0]; 3]);
        assert!(attribution.into_positive().is_err());
    }
}
