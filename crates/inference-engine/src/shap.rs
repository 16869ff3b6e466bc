//! Exact path-dependent TreeSHAP
//!
//! Polynomial-time Shapley values for a single tree, using the node
//! training weights as the background distribution. Summing the values of
//! one row and adding the tree's expected value reproduces the tree output.

use crate::forest::{DecisionTree, Node};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

/// Add the Shapley values of `row` under `tree` into `phi`
pub(crate) fn accumulate(tree: &DecisionTree, row: &[f64], phi: &mut [f64]) {
    if tree.nodes().is_empty() {
        return;
    }
    let walker = Walker {
        nodes: tree.nodes(),
        row,
    };
    walker.recurse(0, Vec::with_capacity(tree.depth() + 2), 1.0, 1.0, None, phi);
}

struct Walker<'a> {
    nodes: &'a [Node],
    row: &'a [f64],
}

impl Walker<'_> {
    fn recurse(
        &self,
        idx: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
        phi: &mut [f64],
    ) {
        extend(&mut path, zero_fraction, one_fraction, feature);

        match &self.nodes[idx] {
            Node::Leaf { value, .. } => {
                for i in 1..path.len() {
                    let element = path[i];
                    if let Some(f) = element.feature {
                        let w = unwound_sum(&path, i);
                        phi[f] += w * (element.one_fraction - element.zero_fraction) * value;
                    }
                }
            }
            Node::Split {
                feature: split_feature,
                threshold,
                left,
                right,
                weight,
            } => {
                let (hot, cold) = if self.row[*split_feature] <= *threshold {
                    (*left, *right)
                } else {
                    (*right, *left)
                };

                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                // A feature seen higher up is unwound so it appears once
                if let Some(k) = path
                    .iter()
                    .skip(1)
                    .position(|e| e.feature == Some(*split_feature))
                    .map(|p| p + 1)
                {
                    incoming_zero = path[k].zero_fraction;
                    incoming_one = path[k].one_fraction;
                    unwind(&mut path, k);
                }

                let hot_fraction = self.nodes[hot].weight() / weight;
                let cold_fraction = self.nodes[cold].weight() / weight;

                self.recurse(
                    hot,
                    path.clone(),
                    hot_fraction * incoming_zero,
                    incoming_one,
                    Some(*split_feature),
                    phi,
                );
                self.recurse(
                    cold,
                    path,
                    cold_fraction * incoming_zero,
                    0.0,
                    Some(*split_feature),
                    phi,
                );
            }
        }
    }
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / denom;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / denom;
    }
}

fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for j in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[j].weight;
            path[j].weight = next_one_portion * denom / ((j + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[j].weight * zero_fraction * (depth - j) as f64 / denom;
        } else {
            path[j].weight = path[j].weight * denom / (zero_fraction * (depth - j) as f64);
        }
    }

    for j in index..depth {
        path[j].feature = path[j + 1].feature;
        path[j].zero_fraction = path[j + 1].zero_fraction;
        path[j].one_fraction = path[j + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed
fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    for j in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion / ((j + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[j].weight - tmp * zero_fraction * (depth - j) as f64;
        } else {
            total += path[j].weight / (zero_fraction * (depth - j) as f64);
        }
    }

    total * (depth + 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, POSITIVE_CLASS};
    use crate::forest::{ForestConfig, MaxFeatures, RandomForest};
    use ndarray::Array2;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn fitted_forest(n_features: usize, seed: u64) -> RandomForest {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = 160;
        let mut x = Array2::zeros((n, n_features));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            for j in 0..n_features {
                x[[i, j]] = rng.gen_range(-2.0..2.0);
            }
            let score = x[[i, 0]] + 0.5 * x[[i, 1 % n_features]] + rng.gen_range(-0.5..0.5);
            y.push(u8::from(score > 0.0));
        }

        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 12,
            max_depth: 5,
            max_features: MaxFeatures::Count(2),
            seed,
            ..Default::default()
        });
        forest.fit(x.view(), &y).unwrap();
        forest
    }

    fn positive(forest: &RandomForest, row: &[f64]) -> Vec<f64> {
        forest.attribute(row).unwrap().into_positive().unwrap()
    }

    #[test]
    fn test_single_split_values() {
        // Root split on feature 0 with a 3:1 weight ratio
        let tree: DecisionTree = serde_json::from_value(serde_json::json!({
            "nodes": [
                {"Split": {"feature": 0, "threshold": 0.0, "left": 1, "right": 2, "weight": 4.0}},
                {"Leaf": {"value": 0.0, "weight": 3.0}},
                {"Leaf": {"value": 1.0, "weight": 1.0}}
            ]
        }))
        .unwrap();

        let mut phi = vec![0.0; 2];
        accumulate(&tree, &[1.0, 5.0], &mut phi);
        assert!((phi[0] - 0.75).abs() < 1e-12);
        assert_eq!(phi[1], 0.0);

        let mut phi = vec![0.0; 2];
        accumulate(&tree, &[-1.0, 5.0], &mut phi);
        assert!((phi[0] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_feature_on_path() {
        // Feature 0 splits twice along the same branch
        let tree: DecisionTree = serde_json::from_value(serde_json::json!({
            "nodes": [
                {"Split": {"feature": 0, "threshold": 0.0, "left": 1, "right": 4, "weight": 8.0}},
                {"Split": {"feature": 0, "threshold": -1.0, "left": 2, "right": 3, "weight": 4.0}},
                {"Leaf": {"value": 0.0, "weight": 2.0}},
                {"Leaf": {"value": 0.5, "weight": 2.0}},
                {"Leaf": {"value": 1.0, "weight": 4.0}}
            ]
        }))
        .unwrap();

        for x0 in [-2.0, -0.5, 1.0] {
            let mut phi = vec![0.0; 1];
            accumulate(&tree, &[x0], &mut phi);
            let total = phi[0] + tree.expected_value();
            assert!((total - tree.predict(&[x0])).abs() < 1e-12, "x0={x0}");
        }
    }

    #[test]
    fn test_local_accuracy_on_forest() {
        let forest = fitted_forest(4, 17);
        for row in [[0.3, -1.2, 0.8, 0.0], [-1.5, 1.9, -0.4, 1.1], [2.0, 2.0, 2.0, 2.0]] {
            let phi = positive(&forest, &row);
            let p = forest.predict_proba(&row).unwrap()[POSITIVE_CLASS];
            let reconstructed: f64 = phi.iter().sum::<f64>() + forest.expected_value();
            assert!((reconstructed - p).abs() < 1e-9, "{reconstructed} vs {p}");
        }
    }

    #[test]
    fn test_unused_feature_gets_zero() {
        let tree: DecisionTree = serde_json::from_value(serde_json::json!({
            "nodes": [
                {"Split": {"feature": 1, "threshold": 0.5, "left": 1, "right": 2, "weight": 10.0}},
                {"Leaf": {"value": 0.2, "weight": 5.0}},
                {"Leaf": {"value": 0.9, "weight": 5.0}}
            ]
        }))
        .unwrap();
        let mut phi = vec![0.0; 3];
        accumulate(&tree, &[9.0, 1.0, -9.0], &mut phi);
        assert_eq!(phi[0], 0.0);
        assert_eq!(phi[2], 0.0);
        assert!((phi[1] - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_attribution_is_deterministic() {
        let forest = fitted_forest(3, 5);
        let row = [0.1, -0.7, 1.3];
        assert_eq!(positive(&forest, &row), positive(&forest, &row));
    }

    #[test]
    fn test_negative_class_mirrors_positive() {
        let forest = fitted_forest(3, 9);
        match forest.attribute(&[0.5, 0.5, 0.5]).unwrap() {
            crate::Attribution::PerClass(rows) => {
                assert_eq!(rows.len(), 2);
                for (neg, pos) in rows[0].iter().zip(&rows[1]) {
                    assert_eq!(*neg, -*pos);
                }
            }
            other => panic!("unexpected layout: {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_local_accuracy(row in proptest::collection::vec(-3.0f64..3.0, 3)) {
            let forest = fitted_forest(3, 23);
            let phi = positive(&forest, &row);
            let p = forest.predict_proba(&row).unwrap()[POSITIVE_CLASS];
            let reconstructed: f64 = phi.iter().sum::<f64>() + forest.expected_value();
            prop_assert!((reconstructed - p).abs() < 1e-9);
        }
    }
}
