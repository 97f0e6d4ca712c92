//! # Micro Benchmarks
//!
//! The pieces under one admission check: bucket arithmetic, client key
//! resolution and clock conversion.
//!
//! Run with: `cargo bench --bench micro_benchmarks`

use axum::http::{HeaderMap, HeaderValue};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::net::SocketAddr;
use std::time::Instant;
use tot_api::{
    bearer_token, client_ip, current_time_ms, hash_identity, instant_millis, ClientIdentifier,
    TokenBucket,
};

fn bench_token_bucket(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_bucket");

    for n in [1u32, 10] {
        group.bench_with_input(BenchmarkId::new("consume", n), &n, |b, &n| {
            let bucket = TokenBucket::new(u32::MAX, 1e9, Instant::now());
            b.iter(|| std::hint::black_box(bucket.consume(n, Instant::now())));
        });
    }

    group.bench_function("remaining_tokens", |b| {
        let bucket = TokenBucket::new(100, 10.0, Instant::now());
        b.iter(|| std::hint::black_box(bucket.remaining_tokens(Instant::now())));
    });

    group.finish();
}

fn bench_identification(c: &mut Criterion) {
    let mut group = c.benchmark_group("identification");

    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
    headers.insert("authorization", HeaderValue::from_static("Bearer not-a-real-token"));
    let remote: SocketAddr = "192.0.2.1:50000".parse().unwrap();

    group.bench_function("client_ip", |b| {
        b.iter(|| std::hint::black_box(client_ip(&headers, Some(remote))));
    });
    group.bench_function("bearer_token", |b| {
        b.iter(|| std::hint::black_box(bearer_token(&headers)));
    });
    group.bench_function("hash_identity", |b| {
        b.iter(|| std::hint::black_box(hash_identity("5f0c8a8e-3f4c-4b7e-9a57-0c1d2e3f4a5b")));
    });

    let identifier = ClientIdentifier::ip_only();
    group.bench_function("identify_parts", |b| {
        b.iter(|| std::hint::black_box(identifier.identify_parts(&headers, Some(remote))));
    });

    group.finish();
}

fn bench_clock(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock");

    group.bench_function("current_time_ms", |b| {
        b.iter(|| std::hint::black_box(current_time_ms()));
    });
    group.bench_function("instant_millis", |b| {
        b.iter(|| std::hint::black_box(instant_millis(Instant::now())));
    });

    group.finish();
}

criterion_group!(benches, bench_token_bucket, bench_identification, bench_clock);
criterion_main!(benches);
