//! # Rate Limiter Benchmarks
//!
//! Admission throughput of [`RateLimiter`] from one client up to many,
//! single- and multi-threaded.
//!
//! Run with: `cargo bench`

use axum::body::Body;
use axum::http::Request;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tot_api::{RateLimiter, RateLimiterConfig};

fn roomy_limiter(max_buckets: usize) -> RateLimiter {
    let config = RateLimiterConfig::new(1_000_000.0, 1_000_000)
        .with_max_buckets(max_buckets)
        .with_cleanup(Duration::from_secs(3600), Duration::from_secs(3600));
    RateLimiter::new(config).unwrap()
}

/// One hot client, always admitted
fn bench_single_client(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_client");
    group.throughput(Throughput::Elements(1));

    let limiter = roomy_limiter(16);
    group.bench_function("check", |b| {
        b.iter(|| std::hint::black_box(limiter.check("ip:198.51.100.1")));
    });

    let now = Instant::now();
    group.bench_function("check_at_fixed_instant", |b| {
        b.iter(|| std::hint::black_box(limiter.check_at("ip:198.51.100.2", now)));
    });

    group.finish();
}

/// Denial path: retry-after computed on every call
fn bench_denied(c: &mut Criterion) {
    let mut group = c.benchmark_group("denied");
    group.throughput(Throughput::Elements(1));

    let limiter = RateLimiter::new(RateLimiterConfig::new(0.001, 1)).unwrap();
    limiter.allow("ip:198.51.100.1");

    group.bench_function("exhausted_bucket", |b| {
        b.iter(|| std::hint::black_box(limiter.check("ip:198.51.100.1")));
    });

    let full = RateLimiter::new(RateLimiterConfig::new(1.0, 1).with_max_buckets(1)).unwrap();
    full.allow("only");
    group.bench_function("registry_full", |b| {
        b.iter(|| std::hint::black_box(full.check("newcomer")));
    });

    group.finish();
}

/// Round-robin over a population of existing clients
fn bench_many_clients(c: &mut Criterion) {
    let mut group = c.benchmark_group("many_clients");

    for clients in [100usize, 1_000, 10_000] {
        let keys: Vec<String> = (0..clients).map(|i| format!("ip:10.{}.{}.1", i / 256, i % 256)).collect();
        let limiter = roomy_limiter(clients);
        for key in &keys {
            limiter.allow(key);
        }

        group.throughput(Throughput::Elements(clients as u64));
        group.bench_with_input(BenchmarkId::from_parameter(clients), &keys, |b, keys| {
            b.iter(|| {
                for key in keys {
                    std::hint::black_box(limiter.check(key));
                }
            });
        });
    }

    group.finish();
}

/// Bucket creation for first-time clients
fn bench_new_clients(c: &mut Criterion) {
    let mut group = c.benchmark_group("new_clients");
    group.throughput(Throughput::Elements(1_000));

    group.bench_function("create_1000", |b| {
        b.iter_batched(
            || roomy_limiter(1_000),
            |limiter| {
                for i in 0..1_000 {
                    std::hint::black_box(limiter.check(&format!("ip:172.16.{}.{}", i / 256, i % 256)));
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Full path from an HTTP request: identification + admission
fn bench_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("decide");
    group.throughput(Throughput::Elements(1));

    let limiter = roomy_limiter(16);
    let request = Request::builder()
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body(Body::empty())
        .unwrap();

    group.bench_function("forwarded_for", |b| {
        b.iter(|| std::hint::black_box(limiter.decide(&request)));
    });

    group.finish();
}

/// Threads hitting either one shared client or one client each
fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64 * 1_000));

        group.bench_with_input(BenchmarkId::new("shared_client", threads), &threads, |b, &threads| {
            let limiter = Arc::new(roomy_limiter(16));
            b.iter(|| run_threads(&limiter, threads, |_| "ip:198.51.100.1".to_string()));
        });

        group.bench_with_input(BenchmarkId::new("client_per_thread", threads), &threads, |b, &threads| {
            let limiter = Arc::new(roomy_limiter(16));
            b.iter(|| run_threads(&limiter, threads, |t| format!("ip:198.51.100.{t}")));
        });
    }

    group.finish();
}

fn run_threads(limiter: &Arc<RateLimiter>, threads: usize, key: impl Fn(usize) -> String) {
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let limiter = limiter.clone();
            let key = key(t);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    std::hint::black_box(limiter.check(&key));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Sweep cost over a populated registry
fn bench_cleanup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cleanup");

    for clients in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(clients), &clients, |b, &clients| {
            b.iter_batched(
                || {
                    let limiter = roomy_limiter(clients);
                    for i in 0..clients {
                        limiter.allow(&format!("client-{i}"));
                    }
                    limiter
                },
                |limiter| std::hint::black_box(limiter.cleanup_expired()),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_client,
    bench_denied,
    bench_many_clients,
    bench_new_clients,
    bench_decide,
    bench_concurrent,
    bench_cleanup,
);

criterion_main!(benches);
