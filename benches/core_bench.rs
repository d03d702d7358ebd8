//! Benchmarks for frof core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use frof::core::executor::{Executor, ExecutorConfig};
use frof::core::parser;
use frof::core::plan::{compute_plan_id, Plan};
use frof::core::resolver;

/// A chain of `n` jobs, each with a shell body.
fn chain_source(n: usize) -> String {
    let names: Vec<String> = (0..n).map(|i| format!("job{i:04}")).collect();
    let mut src = names.join(" -> ");
    src.push('\n');
    for name in &names {
        src.push_str(&format!("{name}: echo {name}\n"));
    }
    src
}

/// A fan-out of `options` expanded jobs between a setup and a teardown job.
fn fan_out_source(options: usize) -> String {
    format!(
        "&shard: range({options})\nsetup -> work(&shard[8]) -> teardown\n\
         setup: mkdir -p out\nwork: run --shard {{{{&shard}}}} > out/{{{{&shard}}}}.txt\n\
         teardown: cat out/*.txt\n"
    )
}

fn bench_parse_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_chain");
    for n in [10, 100, 1000] {
        let src = chain_source(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &src, |b, src| {
            b.iter(|| black_box(parser::parse(black_box(src)).unwrap()));
        });
    }
    group.finish();
}

fn bench_expand_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_fan_out");
    for options in [10, 100, 1000] {
        let src = fan_out_source(options);
        let parsed = parser::parse_source(&src).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(options), &parsed, |b, parsed| {
            b.iter(|| black_box(resolver::expand(parsed.clone()).unwrap()));
        });
    }
    group.finish();
}

fn bench_plan_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_id");
    for n in [10, 100, 1000] {
        let graph = parser::parse(&chain_source(n)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &graph, |b, graph| {
            b.iter(|| black_box(compute_plan_id(black_box(graph))));
        });
    }
    group.finish();
}

fn bench_predict_rounds(c: &mut Criterion) {
    let plan = Plan::from_source(&fan_out_source(500)).unwrap();
    let executor = Executor::with_config(plan, ExecutorConfig::default().with_parent(None));
    c.bench_function("predict_rounds_fan_out_500", |b| {
        b.iter(|| black_box(executor.predict_rounds()));
    });
}

criterion_group!(
    benches,
    bench_parse_chain,
    bench_expand_fan_out,
    bench_plan_id,
    bench_predict_rounds
);
criterion_main!(benches);
