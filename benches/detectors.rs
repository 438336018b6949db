use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fraudbench::anomaly::{AnomalyDetector, IsolationForest, LocalOutlierFactor, OneClassSvm};
use fraudbench::metrics::ClassificationReport;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

fn create_transactions(n_rows: usize, n_features: usize) -> Array2<f64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 2.0 - 1.0)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10); // Fewer samples for fitting benchmarks

    for n_rows in [500, 2000].iter() {
        let x = create_transactions(*n_rows, 30);

        group.bench_with_input(BenchmarkId::new("isolation_forest", n_rows), &x, |b, x| {
            b.iter(|| {
                let mut model = IsolationForest::new().with_contamination(0.01).with_seed(42);
                model.fit(black_box(x)).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("lof", n_rows), &x, |b, x| {
            b.iter(|| {
                let mut model = LocalOutlierFactor::new(20).with_contamination(0.01);
                model.fit_predict(black_box(x)).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("one_class_svm", n_rows), &x, |b, x| {
            b.iter(|| {
                let mut model = OneClassSvm::default();
                model.fit(black_box(x)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_report(c: &mut Criterion) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    let y_true: Array1<i64> = (0..100_000).map(|_| i64::from(rng.gen_bool(0.002))).collect();
    let y_pred: Array1<i64> = (0..100_000).map(|_| i64::from(rng.gen_bool(0.002))).collect();

    c.bench_function("classification_report", |b| {
        b.iter(|| {
            ClassificationReport::new(black_box(y_true.view()), black_box(y_pred.view()), None)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_fit, bench_report);
criterion_main!(benches);
