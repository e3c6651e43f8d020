use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use exoplanet_classifier::data::{catalog_to_dataframe, Observation};
use exoplanet_classifier::feature_engineering::TransitFeatureEngineer;
use exoplanet_classifier::synthetic::{training_catalog, CatalogGenerator};
use exoplanet_classifier::system::{ClassificationSystem, SystemConfig};

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [300, 800].iter() {
        let catalog = training_catalog(*n_rows, 42).unwrap();

        group.bench_with_input(BenchmarkId::new("system_fit", n_rows), &catalog, |b, catalog| {
            b.iter(|| {
                let mut system = ClassificationSystem::new();
                system.train(black_box(catalog), &SystemConfig::fast()).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_feature_engineering(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_engineering");

    for n_rows in [1000, 5000].iter() {
        let catalog = CatalogGenerator::new().with_n_samples(*n_rows).generate().unwrap();
        let df = catalog_to_dataframe(&catalog).unwrap();

        group.bench_with_input(BenchmarkId::new("transform", n_rows), &df, |b, df| {
            b.iter(|| TransitFeatureEngineer::new().transform(black_box(df)).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let config = SystemConfig::fast();
    let catalog = training_catalog(config.synthetic_samples, config.random_state).unwrap();
    let mut system = ClassificationSystem::new();
    system.train(&catalog, &config).unwrap();

    let single = Observation::from_values([289.9, 7.4, 0.00492, 12.0, 0.97, 5627.0, 11.7]);
    let batch: Vec<Observation> = catalog.entries.iter().take(100).map(|e| e.observation).collect();

    let mut group = c.benchmark_group("prediction");
    group.bench_function("single", |b| b.iter(|| system.predict(black_box(&single)).unwrap()));
    group.bench_function("batch_100", |b| b.iter(|| system.predict_batch(black_box(&batch)).unwrap()));
    group.finish();
}

criterion_group!(benches, bench_training, bench_feature_engineering, bench_prediction);
criterion_main!(benches);
