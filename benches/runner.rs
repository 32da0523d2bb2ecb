//! Criterion benchmarks for check evaluation.
//!
//! - Row-level stages over generated tables, sequential vs parallel
//! - A full import driven through the pipeline

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stagegate::prelude::*;

fn criterion_config() -> Criterion {
    Criterion::default().configure_from_args()
}

fn config() -> PipelineConfig {
    PipelineConfig::default()
        .with_required_columns(["email", "name"])
        .with_dedup_keys(["email"])
}

fn generated_rows(count: usize) -> RowSet {
    let mut rows = RowSet::new(["name", "email", "amount", "notes"]);
    for i in 0..count {
        let email = if i % 25 == 0 {
            format!("user{}-at-example.com", i)
        } else {
            format!("User{}@Example.com", if i % 50 == 1 { i / 2 } else { i })
        };
        rows.push_values([
            format!(" person {} ", i),
            email,
            format!("{}.{:02}", i * 3, i % 100),
            String::new(),
        ]);
    }
    rows
}

fn generated_csv(count: usize) -> Vec<u8> {
    let mut csv = String::from("name,email,amount\n");
    for i in 0..count {
        csv.push_str(&format!("person {},user{}@example.com,{}\n", i, i, i));
    }
    csv.into_bytes()
}

fn bench_row_stages(c: &mut Criterion) {
    let catalog = Arc::new(ValidationCatalog::with_builtins(&config()));
    let mut group = c.benchmark_group("row_stages");

    for &count in &[100usize, 1_000, 10_000] {
        let input: Arc<ValidationInput> = generated_rows(count).into();
        group.throughput(Throughput::Elements(count as u64));

        for (label, parallel) in [("sequential", false), ("parallel", true)] {
            let runner = ValidationRunner::new(Arc::clone(&catalog)).with_options(RunnerOptions {
                parallel,
                ..RunnerOptions::default()
            });
            group.bench_with_input(BenchmarkId::new(label, count), &input, |b, input| {
                b.iter(|| {
                    for &category in &ValidationCategory::all()[2..] {
                        black_box(runner.run(category, Arc::clone(input)));
                    }
                });
            });
        }
    }
    group.finish();
}

fn bench_full_import(c: &mut Criterion) {
    let bytes = generated_csv(1_000);
    let mut rows = RowSet::new(["name", "email", "amount"]);
    for i in 0..1_000 {
        rows.push_values([
            format!("person {}", i),
            format!("user{}@example.com", i),
            i.to_string(),
        ]);
    }
    let rows: Arc<ValidationInput> = rows.into();
    let file: Arc<ValidationInput> = FileInput::new("people.csv", bytes.clone()).into();

    c.bench_function("full_import_1000_rows", |b| {
        b.iter(|| {
            let pipeline = ImportPipeline::new(config());
            let session = pipeline
                .create_session(FileMetadata::new("people.csv", bytes.len() as u64))
                .unwrap();
            let id = session.id();
            let mut next = None;
            while let Ok(Stage::At(category)) = pipeline.enter(id, next) {
                let input = match category.input_kind() {
                    InputKind::File => Arc::clone(&file),
                    InputKind::Rows => Arc::clone(&rows),
                };
                pipeline.run_stage(id, category, input).unwrap();
                match pipeline.route(id, category).unwrap() {
                    Route::Advance(Stage::At(following)) => next = Some(following),
                    _ => break,
                }
            }
            black_box(pipeline.snapshot(id).unwrap())
        });
    });
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_row_stages, bench_full_import
}
criterion_main!(benches);
