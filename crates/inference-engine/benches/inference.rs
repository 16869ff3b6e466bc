//! Scoring and attribution benchmarks for a production-sized forest.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use inference_engine::{Classifier, ForestConfig, RandomForest};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FEATURES: usize = 21;

fn trained_forest() -> RandomForest {
    let mut rng = StdRng::seed_from_u64(7);
    let rows = 2000;
    let mut x = Array2::zeros((rows, FEATURES));
    let mut y = Vec::with_capacity(rows);
    for i in 0..rows {
        for j in 0..FEATURES {
            x[[i, j]] = rng.gen_range(-3.0..3.0);
        }
        y.push(u8::from(x[[i, 0]] + x[[i, 3]] > 0.5));
    }

    let mut forest = RandomForest::new(ForestConfig::default());
    forest.fit(x.view(), &y).unwrap();
    forest
}

fn benchmark_predict_proba(c: &mut Criterion) {
    let forest = trained_forest();
    let row = vec![0.25; FEATURES];

    c.bench_function("forest_predict_proba", |b| {
        b.iter(|| black_box(forest.predict_proba(black_box(&row)).unwrap()));
    });
}

fn benchmark_tree_shap(c: &mut Criterion) {
    let forest = trained_forest();
    let row = vec![0.25; FEATURES];

    c.bench_function("forest_tree_shap", |b| {
        b.iter(|| black_box(forest.attribute(black_box(&row)).unwrap()));
    });
}

criterion_group!(benches, benchmark_predict_proba, benchmark_tree_shap);
criterion_main!(benches);
