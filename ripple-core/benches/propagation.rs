//! Benchmarks for trigger propagation
//!
//! Measures the cost of a write reaching its dependents: fan-out to many
//! effects, chains of computeds, and re-runs that must prune stale
//! dependencies.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ripple_core::{computed, create_ref, effect, reactive, Computed, EffectRunner, Observed};
use serde_json::json;

fn observe(json: serde_json::Value) -> Observed {
    reactive(json)
        .into_observed()
        .expect("json objects are observable")
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for effects in [1usize, 10, 100, 1000] {
        let state = observe(json!({"n": 0}));
        let runners: Vec<EffectRunner<()>> = (0..effects)
            .map(|_| {
                let source = state.clone();
                effect(move || {
                    black_box(source.get("n"));
                })
            })
            .collect();

        group.throughput(Throughput::Elements(effects as u64));
        group.bench_with_input(BenchmarkId::from_parameter(effects), &effects, |b, _| {
            let mut n = 0;
            b.iter(|| {
                n += 1;
                state.set("n", n);
            });
        });
        drop(runners);
    }

    group.finish();
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");

    for depth in [1usize, 10, 100] {
        let source = create_ref(0i64);
        let head = source.clone();
        let mut tail: Computed<i64> = computed(move || head.get() + 1);
        for _ in 1..depth {
            let prev = tail.clone();
            tail = computed(move || prev.get() + 1);
        }

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            let mut n = 0;
            b.iter(|| {
                n += 1;
                source.set(n);
                black_box(tail.get())
            });
        });
    }

    group.finish();
}

fn bench_branch_switch(c: &mut Criterion) {
    let state = observe(json!({"flag": true, "a": 1, "b": 2}));
    let source = state.clone();
    let _runner = effect(move || {
        let flag = source.get("flag").and_then(|flag| flag.as_bool()).unwrap_or(false);
        black_box(if flag { source.get("a") } else { source.get("b") });
    });

    c.bench_function("branch_switch", |b| {
        let mut flag = false;
        b.iter(|| {
            state.set("flag", flag);
            flag = !flag;
        });
    });
}

criterion_group!(benches, bench_fan_out, bench_computed_chain, bench_branch_switch);
criterion_main!(benches);
