//! Z-score feature standardization

use crate::ModelError;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Columns with a spread below this keep a unit scale
const MIN_SCALE: f64 = 10.0 * f64::EPSILON;

/// Per-feature standardizer fitted once on the training matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self, ModelError> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyDataset);
        }

        let n = x.nrows() as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());

        for column in x.axis_iter(Axis(1)) {
            let mu = column.sum() / n;
            let variance = column.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / n;
            let std_dev = variance.sqrt();
            mean.push(mu);
            scale.push(if std_dev < MIN_SCALE { 1.0 } else { std_dev });
        }

        Ok(Self { mean, scale })
    }

    /// Standardize a single row with the fitted statistics
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        if row.len() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (mu, sigma))| (v - mu) / sigma)
            .collect())
    }

    /// Standardize every row of a matrix
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.mean.len(),
                actual: x.ncols(),
            });
        }
        let mut out = x.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (idx, value) in row.iter_mut().enumerate() {
                *value = (*value - self.mean[idx]) / self.scale[idx];
            }
        }
        Ok(out)
    }

    /// Reject statistics that cannot come from `fit`
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.mean.is_empty() || self.mean.len() != self.scale.len() {
            return Err(ModelError::Malformed(format!(
                "scaler has {} means and {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(idx) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(ModelError::Malformed(format!(
                "mean of feature {idx} is {}",
                self.mean[idx]
            )));
        }
        if let Some(idx) = self
            .scale
            .iter()
            .position(|s| !s.is_finite() || *s <= 0.0)
        {
            return Err(ModelError::Malformed(format!(
                "scale of feature {idx} is {}",
                self.scale[idx]
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_parts(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { mean, scale }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}
