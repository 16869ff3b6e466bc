//! Training pipeline: labeled table -> fitted artifact bundle

use crate::report::ClassificationReport;
use crate::split::stratified_split;
use crate::TrainError;
use feature_engine::{NumericTable, LABEL_COLUMN, MAX_CYCLE_COLUMN, RUL_COLUMN};
use inference_engine::{
    ArtifactBundle, Classifier, ForestConfig, RandomForest, StandardScaler, DECISION_THRESHOLD,
    POSITIVE_CLASS,
};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Columns that are never used as model inputs
pub const DROPPED_COLUMNS: [&str; 3] = [LABEL_COLUMN, RUL_COLUMN, MAX_CYCLE_COLUMN];

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub forest: ForestConfig,
    /// Share of each class held out for evaluation
    pub test_fraction: f64,
    /// Seed of the train/test split
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            forest: ForestConfig::default(),
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Feature matrix and labels extracted from the labeled table
#[derive(Debug, Clone)]
pub struct TrainingData {
    /// Feature columns in table order; this becomes the canonical order
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
    pub y: Vec<u8>,
}

/// Fitted bundle plus its hold-out evaluation
#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ArtifactBundle,
    pub report: ClassificationReport,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Split the labeled table into features and the `fail_soon` target
pub fn prepare(table: &NumericTable) -> Result<TrainingData, TrainError> {
    let label_idx = table
        .column_index(LABEL_COLUMN)
        .ok_or_else(|| TrainError::MissingLabel(LABEL_COLUMN.to_string()))?;

    let feature_idx: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| !DROPPED_COLUMNS.contains(&name.as_str()))
        .map(|(idx, _)| idx)
        .collect();
    if feature_idx.is_empty() {
        return Err(TrainError::NoFeatures);
    }

    let y = table
        .rows()
        .iter()
        .enumerate()
        .map(|(row, values)| match values[label_idx] {
            v if v == 0.0 => Ok(0u8),
            v if v == 1.0 => Ok(1u8),
            value => Err(TrainError::InvalidLabel { row, value }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rows = table.rows();
    let x = Array2::from_shape_fn((rows.len(), feature_idx.len()), |(i, j)| {
        rows[i][feature_idx[j]]
    });
    let feature_names = feature_idx
        .iter()
        .map(|&idx| table.columns()[idx].clone())
        .collect();

    Ok(TrainingData {
        feature_names,
        x,
        y,
    })
}

/// Fit scaler and forest, evaluate on the stratified hold-out
pub fn train(table: &NumericTable, config: &TrainConfig) -> Result<TrainingOutcome, TrainError> {
    info!(
        "Data shape: ({}, {})",
        table.len(),
        table.columns().len()
    );
    let data = prepare(table)?;
    let positives = data.y.iter().filter(|&&l| l == 1).count();
    info!(
        "Features shape: ({}, {})",
        data.x.nrows(),
        data.feature_names.len()
    );
    info!(
        "Target distribution: 0 -> {}, 1 -> {}",
        data.y.len() - positives,
        positives
    );

    // Scaler statistics come from the full table
    let scaler = StandardScaler::fit(data.x.view())?;
    let scaled = scaler.transform(data.x.view())?;

    let split = stratified_split(&data.y, config.test_fraction, config.seed)?;
    let x_train = scaled.select(Axis(0), &split.train);
    let y_train: Vec<u8> = split.train.iter().map(|&i| data.y[i]).collect();
    info!(
        "Split: {} training rows, {} hold-out rows",
        split.train.len(),
        split.test.len()
    );

    info!("Training random forest model...");
    let mut forest = RandomForest::new(config.forest.clone());
    forest.fit(x_train.view(), &y_train)?;

    info!("Evaluating model...");
    let y_test: Vec<u8> = split.test.iter().map(|&i| data.y[i]).collect();
    let y_pred = split
        .test
        .iter()
        .map(|&i| -> Result<u8, TrainError> {
            let row = scaled.row(i).to_vec();
            let proba = forest.predict_proba(&row)?;
            Ok(u8::from(proba[POSITIVE_CLASS] >= DECISION_THRESHOLD))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let report = ClassificationReport::from_predictions(&y_test, &y_pred);
    info!("Hold-out accuracy: {:.4}", report.accuracy);

    let bundle = ArtifactBundle::new(forest, scaler, data.feature_names)?;
    Ok(TrainingOutcome {
        bundle,
        report,
        train_rows: split.train.len(),
        test_rows: split.test.len(),
    })
}

/// Read the processed CSV, train, and write the bundle into `models_dir`
pub fn train_from_csv(
    processed_path: impl AsRef<Path>,
    models_dir: impl AsRef<Path>,
    config: &TrainConfig,
) -> Result<TrainingOutcome, TrainError> {
    let processed_path = processed_path.as_ref();
    info!("Loading processed data from {}", processed_path.display());
    let table = NumericTable::read_csv(processed_path)?;

    let outcome = train(&table, config)?;
    let paths = outcome.bundle.save(models_dir)?;
    info!("Saved model artifacts:");
    info!("  - {}", paths.model.display());
    info!("  - {}", paths.scaler.display());
    info!("  - {}", paths.features.display());

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::{CYCLE_COLUMN, ENGINE_ID_COLUMN};

    fn columns() -> Vec<String> {
        [
            ENGINE_ID_COLUMN,
            CYCLE_COLUMN,
            "sensor_1",
            "sensor_2",
            MAX_CYCLE_COLUMN,
            RUL_COLUMN,
            LABEL_COLUMN,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Four engines of 60 cycles; sensor_1 tracks remaining life
    fn labeled_table() -> NumericTable {
        let mut rows = Vec::new();
        for engine in 1..=4 {
            let max_cycle = 60.0;
            for cycle in 1..=60 {
                let rul = max_cycle - cycle as f64;
                let sensor_1 = 500.0 + 2.0 * rul;
                let sensor_2 = ((engine * cycle) % 7) as f64;
                let label = if rul <= 30.0 { 1.0 } else { 0.0 };
                rows.push(vec![
                    engine as f64,
                    cycle as f64,
                    sensor_1,
                    sensor_2,
                    max_cycle,
                    rul,
                    label,
                ]);
            }
        }
        NumericTable::new(columns(), rows).unwrap()
    }

    fn quick_config() -> TrainConfig {
        TrainConfig {
            forest: ForestConfig {
                n_trees: 20,
                max_depth: 6,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = TrainConfig::default();
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.forest.n_trees, 200);
    }

    #[test]
    fn test_prepare_keeps_column_order() {
        let data = prepare(&labeled_table()).unwrap();
        assert_eq!(
            data.feature_names,
            vec!["engine_id", "cycle", "sensor_1", "sensor_2"]
        );
        assert_eq!(data.x.dim(), (240, 4));
        assert_eq!(data.x[[0, 2]], 618.0);
        assert_eq!(data.y.iter().filter(|&&l| l == 1).count(), 4 * 31);
    }

    #[test]
    fn test_missing_label_column() {
        let table = NumericTable::new(
            vec!["sensor_1".into(), "RUL".into()],
            vec![vec![1.0, 5.0]],
        )
        .unwrap();
        assert!(matches!(
            prepare(&table),
            Err(TrainError::MissingLabel(column)) if column == "fail_soon"
        ));
    }

    #[test]
    fn test_invalid_label_value() {
        let table = NumericTable::new(
            vec!["sensor_1".into(), "fail_soon".into()],
            vec![vec![1.0, 0.0], vec![2.0, 2.0]],
        )
        .unwrap();
        assert!(matches!(
            prepare(&table),
            Err(TrainError::InvalidLabel { row: 1, .. })
        ));
    }

    #[test]
    fn test_no_feature_columns() {
        let table = NumericTable::new(
            vec!["RUL".into(), "max_cycle".into(), "fail_soon".into()],
            vec![vec![1.0, 2.0, 1.0]],
        )
        .unwrap();
        assert!(matches!(prepare(&table), Err(TrainError::NoFeatures)));
    }

    #[test]
    fn test_train_learns_separable_target() {
        let outcome = train(&labeled_table(), &quick_config()).unwrap();

        assert_eq!(outcome.train_rows + outcome.test_rows, 240);
        assert_eq!(outcome.report.classes[1].support, 25);
        assert!(outcome.report.accuracy > 0.9, "{}", outcome.report);
        assert_eq!(outcome.bundle.feature_names().len(), 4);
    }

    #[test]
    fn test_train_is_reproducible() {
        let a = train(&labeled_table(), &quick_config()).unwrap();
        let b = train(&labeled_table(), &quick_config()).unwrap();
        assert_eq!(a.bundle.model(), b.bundle.model());
        assert_eq!(a.report, b.report);
    }

    #[test]
    fn test_train_from_csv_writes_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("features_train.csv");
        let mut text = columns().join(",");
        text.push('\n');
        for row in labeled_table().rows() {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            text.push_str(&cells.join(","));
            text.push('\n');
        }
        std::fs::write(&csv, text).unwrap();

        let models = dir.path().join("models");
        train_from_csv(&csv, &models, &quick_config()).unwrap();

        let loaded: ArtifactBundle = ArtifactBundle::load(&models).unwrap();
        assert_eq!(loaded.feature_names()[0], "engine_id");
    }

    #[test]
    fn test_missing_csv() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            train_from_csv(dir.path().join("nope.csv"), dir.path(), &quick_config()),
            Err(TrainError::Feature(_))
        ));
    }
}
