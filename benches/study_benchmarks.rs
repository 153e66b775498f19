//! Study runner benchmarks
//!
//! - Sequential vs parallel trial scheduling
//! - Per-trial cost of the stock pipelines
//! - Arrow conversion of a finished table
//!
//! Toyota Way: Measure before optimizing (Genchi Genbutsu)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trueno_study::factor::{FactorSpec, SamplingRule};
use trueno_study::study::NoFactors;
use trueno_study::synth::{CorrelatedNormalPairs, Correlation, LineFitStatistic, UniformPairs};
use trueno_study::{Execution, Study};

fn factor_spec() -> FactorSpec {
    FactorSpec::new()
        .factor("n", SamplingRule::IntUniform { low: 20, high: 200 })
        .factor("rho", SamplingRule::Uniform { low: -0.9, high: 0.9 })
}

fn study(trials: usize, execution: Execution) -> Study {
    Study::builder()
        .trials(trials)
        .execution(execution)
        .build()
        .unwrap()
}

/// Benchmark scheduling modes on the null-correlation study
fn bench_execution_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution_modes");

    for trials in [100, 1_000, 10_000].iter() {
        for (label, execution) in [
            ("sequential", Execution::Sequential),
            ("parallel", Execution::Parallel),
        ] {
            let runner = study(*trials, execution);
            group.bench_with_input(BenchmarkId::new(label, trials), trials, |b, _| {
                b.iter(|| {
                    let table = runner
                        .run(&NoFactors, &UniformPairs::new(50), &Correlation::new())
                        .unwrap();
                    black_box(table);
                });
            });
        }
    }

    group.finish();
}

/// Benchmark factor sampling + bivariate-normal synthesis
fn bench_factorial_study(c: &mut Criterion) {
    let mut group = c.benchmark_group("factorial_study");
    let factors = factor_spec();

    for trials in [100, 1_000].iter() {
        let runner = study(*trials, Execution::Sequential);
        group.bench_with_input(BenchmarkId::new("correlation", trials), trials, |b, _| {
            b.iter(|| {
                let table = runner
                    .run(&factors, &CorrelatedNormalPairs::new(), &Correlation::new())
                    .unwrap();
                black_box(table);
            });
        });
        group.bench_with_input(BenchmarkId::new("line_fit", trials), trials, |b, _| {
            b.iter(|| {
                let table = runner
                    .run(&factors, &CorrelatedNormalPairs::new(), &LineFitStatistic::new())
                    .unwrap();
                black_box(table);
            });
        });
    }

    group.finish();
}

/// Benchmark results table to Arrow conversion
fn bench_record_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_batch");
    let factors = factor_spec();

    for trials in [1_000, 10_000].iter() {
        let table = study(*trials, Execution::Parallel)
            .run(&factors, &CorrelatedNormalPairs::new(), &Correlation::new())
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(trials), trials, |b, _| {
            b.iter(|| {
                let batch = table.to_record_batch().unwrap();
                black_box(batch);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_execution_modes,
    bench_factorial_study,
    bench_record_batch
);
criterion_main!(benches);
