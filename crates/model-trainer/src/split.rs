//! Stratified train/test split

use crate::TrainError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of each partition, ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold out `test_fraction` of every class, keeping at least one row of
/// each class for training. Same labels and seed give the same split.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Result<Split, TrainError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainError::InvalidSplit(format!(
            "test fraction {test_fraction} must be strictly between 0 and 1"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == class)
            .map(|(idx, _)| idx)
            .collect();
        if members.is_empty() {
            continue;
        }

        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_fraction).round() as usize)
            .min(members.len() - 1);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    if test.is_empty() {
        return Err(TrainError::InvalidSplit(format!(
            "{} rows leave no hold-out rows at fraction {}",
            labels.len(),
            test_fraction
        )));
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}
