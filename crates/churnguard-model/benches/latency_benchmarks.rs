//! Latency benchmarks for single-record churn inference
//!
//! Uses the bundled model under `models/best_pipeline_model`.
//!
//! Run with: cargo bench -p churnguard-model

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

use churnguard_core::{validate, CustomerRecord, Gender, Geography};
use churnguard_model::inference::{self, PipelinePredictor, Predictor};
use churnguard_model::{model_loader, ChurnService, Session};

fn records() -> Vec<(&'static str, CustomerRecord)> {
    vec![
        ("default", CustomerRecord::default()),
        (
            "high_risk",
            CustomerRecord {
                credit_score: 500,
                age: 65,
                tenure: 1,
                balance: 150_000.0,
                num_of_products: 1,
                has_cr_card: false,
                is_active_member: false,
                estimated_salary: 80_000.0,
                gender: Gender::Female,
                geography: Geography::Germany,
            },
        ),
        (
            "spain",
            CustomerRecord {
                geography: Geography::Spain,
                ..Default::default()
            },
        ),
    ]
}

/// Benchmark validation alone
fn benchmark_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Validation");
    group.sample_size(100);

    for (name, record) in records() {
        group.bench_with_input(BenchmarkId::new("validate", name), &record, |b, record| {
            b.iter(|| validate(black_box(record)))
        });
    }

    group.finish();
}

/// Benchmark the synchronous pipeline path
fn benchmark_predict(c: &mut Criterion) {
    let session = Session::builder().build().expect("Failed to create session");
    let pipeline = model_loader::load(&session, &model_loader::resolve_path())
        .expect("Failed to load bundled model");

    let mut group = c.benchmark_group("Inference");
    group.significance_level(0.05);
    group.sample_size(100);

    for (name, record) in records() {
        group.bench_with_input(BenchmarkId::new("predict", name), &record, |b, record| {
            b.iter(|| inference::predict(&session, &pipeline, black_box(record)))
        });
    }

    group.finish();
}

/// Benchmark a full request: validation, slot acquisition and inference
fn benchmark_service(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let session = Arc::new(Session::builder().build().expect("Failed to create session"));
    let pipeline = model_loader::load(&session, &model_loader::resolve_path())
        .expect("Failed to load bundled model");
    let predictor: Arc<dyn Predictor> = Arc::new(PipelinePredictor::new(session, pipeline));
    let service = ChurnService::new(predictor);

    let mut group = c.benchmark_group("Service");
    group.sample_size(100);

    for (name, record) in records() {
        group.bench_with_input(BenchmarkId::new("submit", name), &record, |b, record| {
            b.iter(|| rt.block_on(async { service.submit(black_box(record)).await }))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_validation, benchmark_predict, benchmark_service);
criterion_main!(benches);
