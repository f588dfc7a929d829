//! Benchmarks for key derivation and envelope encoding

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hoard_cache::{fingerprint, Envelope};
use hoard_core::{Invocation, MethodId, Value};
use std::sync::Arc;

fn call(arg_count: usize) -> Invocation {
    let mut method = MethodId::new("Catalog", "lookup");
    let mut args = Vec::with_capacity(arg_count);
    for i in 0..arg_count {
        method = method.param("String");
        args.push(Value::from(format!("argument-{i}")));
    }
    Invocation::new(Arc::new(method), args)
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for arg_count in [0usize, 4, 16] {
        let call = call(arg_count);
        group.bench_with_input(BenchmarkId::from_parameter(arg_count), &call, |b, call| {
            b.iter(|| fingerprint(black_box(call), Some("v1")));
        });
    }

    let nested = Invocation::new(
        Arc::new(MethodId::new("Catalog", "batch").param("Vec<Vec<i64>>")),
        vec![Value::from(vec![vec![1i64, 2, 3]; 32])],
    );
    group.bench_function("nested_sequence", |b| {
        b.iter(|| fingerprint(black_box(&nested), None));
    });

    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    let payload: Vec<String> = (0..256).map(|i| format!("row-{i}")).collect();
    let envelope: Envelope<Vec<String>, String> = Envelope::value(payload, Utc::now());
    let bytes = envelope.encode("bench").unwrap_or_default();

    group.bench_function("encode", |b| {
        b.iter(|| black_box(&envelope).encode("bench"));
    });
    group.bench_function("decode", |b| {
        b.iter(|| Envelope::<Vec<String>, String>::decode("bench", black_box(&bytes)));
    });

    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_envelope);
criterion_main!(benches);
