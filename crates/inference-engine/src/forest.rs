//! Random forest of CART trees

use crate::classifier::{Attribution, Classifier, NEGATIVE_CLASS, POSITIVE_CLASS};
use crate::shap;
use crate::ModelError;
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Smallest gini decrease worth a split
const MIN_IMPURITY_DECREASE: f64 = 1e-12;

/// Number of features examined at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// floor(sqrt(n_features)), at least one
    Sqrt,
    /// Every feature
    All,
    /// A fixed count, capped at n_features
    Count(usize),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    /// Train each tree on a bootstrap resample of the rows
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 10,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Tree node; `weight` is the number of training samples that reached it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        /// Fraction of positive samples in the leaf
        value: f64,
        weight: f64,
    },
    Split {
        feature: usize,
        /// Rows with `x[feature] <= threshold` go left
        threshold: f64,
        left: usize,
        right: usize,
        weight: f64,
    },
}

impl Node {
    pub fn weight(&self) -> f64 {
        match self {
            Node::Leaf { weight, .. } | Node::Split { weight, .. } => *weight,
        }
    }
}

/// Binary classification tree stored as a flat node list, root first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Positive-class probability of the leaf `row` falls into
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Training-weighted mean of the leaf values
    pub fn expected_value(&self) -> f64 {
        let mut expected = vec![0.0; self.nodes.len()];
        // Children always come after their parent
        for idx in (0..self.nodes.len()).rev() {
            expected[idx] = match &self.nodes[idx] {
                Node::Leaf { value, .. } => *value,
                Node::Split { left, right, .. } => {
                    let wl = self.nodes[*left].weight();
                    let wr = self.nodes[*right].weight();
                    (wl * expected[*left] + wr * expected[*right]) / (wl + wr)
                }
            };
        }
        expected.first().copied().unwrap_or(0.0)
    }

    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut deepest = 0;
        for (idx, node) in self.nodes.iter().enumerate() {
            deepest = deepest.max(depths[idx]);
            if let Node::Split { left, right, .. } = node {
                depths[*left] = depths[idx] + 1;
                depths[*right] = depths[idx] + 1;
            }
        }
        deepest
    }

    fn validate(&self, n_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Malformed("tree has no nodes".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value, weight } => {
                    if !(0.0..=1.0).contains(value) || !(*weight > 0.0) {
                        return Err(ModelError::Malformed(format!(
                            "leaf {idx} has value {value} and weight {weight}"
                        )));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    weight,
                } => {
                    let child_ok = |c: usize| c > idx && c < self.nodes.len();
                    if *feature >= n_features || !child_ok(*left) || !child_ok(*right) {
                        return Err(ModelError::Malformed(format!(
                            "split {idx} references feature {feature}, children {left}/{right}"
                        )));
                    }
                    if !(*weight > 0.0) || !weight.is_finite() || threshold.is_nan() {
                        return Err(ModelError::Malformed(format!(
                            "split {idx} has threshold {threshold} and weight {weight}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Bagged ensemble of decision trees with random feature subsets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Unfitted forest
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Mean positive-class probability over the training distribution
    pub fn expected_value(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(DecisionTree::expected_value).sum::<f64>() / self.trees.len() as f64
    }

    fn check_row(&self, row: &[f64]) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        if row.len() != self.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[u8]) -> Result<(), ModelError> {
        let (n_rows, n_features) = x.dim();
        if n_rows == 0 {
            return Err(ModelError::EmptyDataset);
        }
        if y.len() != n_rows {
            return Err(ModelError::LabelMismatch {
                rows: n_rows,
                labels: y.len(),
            });
        }
        if n_features == 0 {
            return Err(ModelError::InvalidConfig("no feature columns".to_string()));
        }
        if self.config.n_trees == 0 {
            return Err(ModelError::InvalidConfig("n_trees must be positive".to_string()));
        }
        if let Some(label) = y.iter().find(|&&label| label > 1) {
            return Err(ModelError::InvalidConfig(format!(
                "labels must be 0 or 1, found {label}"
            )));
        }

        let config = self.config.clone();
        let max_features = config.max_features.resolve(n_features);
        info!(
            "Fitting random forest: trees={}, max_depth={}, max_features={}, rows={}",
            config.n_trees, config.max_depth, max_features, n_rows
        );

        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));
                let samples: Vec<usize> = if config.bootstrap {
                    (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };

                let mut builder = TreeBuilder {
                    x,
                    y,
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split,
                    max_features,
                    rng,
                    nodes: Vec::new(),
                };
                builder.grow(samples, 0);

                let tree = DecisionTree {
                    nodes: builder.nodes,
                };
                debug!("Tree {} grown: {} nodes, depth {}", t, tree.nodes.len(), tree.depth());
                tree
            })
            .collect();

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2], ModelError> {
        self.check_row(row)?;
        let positive =
            self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>() / self.trees.len() as f64;
        Ok([1.0 - positive, positive])
    }

    fn attribute(&self, row: &[f64]) -> Result<Attribution, ModelError> {
        self.check_row(row)?;

        let mut positive = vec![0.0; self.n_features];
        for tree in &self.trees {
            shap::accumulate(tree, row, &mut positive);
        }
        let n_trees = self.trees.len() as f64;
        positive.iter_mut().for_each(|v| *v /= n_trees);

        // P(healthy) = 1 - P(fail), so its contributions are the negation
        let negative: Vec<f64> = positive.iter().map(|v| -v).collect();
        let mut rows = vec![Vec::new(), Vec::new()];
        rows[NEGATIVE_CLASS] = negative;
        rows[POSITIVE_CLASS] = positive;
        Ok(Attribution::PerClass(rows))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() || self.n_features == 0 {
            return Err(ModelError::NotFitted);
        }
        self.trees
            .iter()
            .try_for_each(|tree| tree.validate(self.n_features))
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

struct TreeBuilder<'a, 'b> {
    x: ArrayView2<'a, f64>,
    y: &'b [u8],
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_, '_> {
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let total = samples.len();
        let positives = samples.iter().filter(|&&i| self.y[i] == 1).count();
        let weight = total as f64;

        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: positives as f64 / weight.max(1.0),
            weight,
        });

        let pure = positives == 0 || positives == total;
        if depth >= self.max_depth || total < self.min_samples_split || pure {
            return node_idx;
        }
        let Some(split) = self.best_split(&samples, positives) else {
            return node_idx;
        };

        let x = self.x;
        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| x[[i, split.feature]] <= split.threshold);

        let left_idx = self.grow(left, depth + 1);
        let right_idx = self.grow(right, depth + 1);

        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_idx,
            right: right_idx,
            weight,
        };
        node_idx
    }

    fn best_split(&mut self, samples: &[usize], positives: usize) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        // Random feature order; constant columns do not count towards max_features
        let order = rand::seq::index::sample(&mut self.rng, n_features, n_features);

        let total = samples.len() as f64;
        let parent = gini(positives as f64, total);
        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, u8)> = Vec::with_capacity(samples.len());
        let mut examined = 0;

        for feature in order.into_iter() {
            if examined == self.max_features {
                break;
            }
            column.clear();
            column.extend(samples.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));
            match (column.first(), column.last()) {
                (Some(first), Some(last)) if first.0 != last.0 => examined += 1,
                _ => continue,
            }

            let mut left_pos = 0usize;
            for k in 1..column.len() {
                left_pos += usize::from(column[k - 1].1);
                let (lo, hi) = (column[k - 1].0, column[k].0);
                if lo == hi {
                    continue;
                }

                let left_n = k as f64;
                let right_n = total - left_n;
                let impurity = (left_n * gini(left_pos as f64, left_n)
                    + right_n * gini((positives - left_pos) as f64, right_n))
                    / total;
                let decrease = parent - impurity;

                if decrease > best.as_ref().map_or(MIN_IMPURITY_DECREASE, |b| b.decrease) {
                    let mid = lo + (hi - lo) / 2.0;
                    best = Some(SplitCandidate {
                        feature,
                        threshold: if mid < hi { mid } else { lo },
                        decrease,
                    });
                }
            }
        }

        best
    }
}

fn gini(positives: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let p = positives / total;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}
