//! Throughput Benchmark for linekv
//!
//! Measures the parser, the storage engine, and the full dispatch path
//! under a few representative workloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use linekv::commands::CommandHandler;
use linekv::protocol::{parse_line, StrictParser};
use linekv::storage::{InMemoryEngine, Storage};
use std::sync::Arc;
use std::time::Duration;

fn create_handler() -> CommandHandler {
    CommandHandler::new(Arc::new(StrictParser::new()), Arc::new(InMemoryEngine::new()))
}

/// Benchmark line parsing
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Elements(1));

    group.bench_function("parse_set", |b| {
        b.iter(|| black_box(parse_line(black_box("SET user_101 some-value"))));
    });

    group.bench_function("parse_invalid", |b| {
        b.iter(|| black_box(parse_line(black_box("SET user:101 some value!"))));
    });

    group.finish();
}

/// Benchmark raw storage operations
fn bench_storage(c: &mut Criterion) {
    let engine = Arc::new(InMemoryEngine::new());

    for i in 0..100_000 {
        engine.set(&format!("key_{}", i), &format!("value_{}", i));
    }

    let mut group = c.benchmark_group("storage");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set(&format!("new_{}", i), "small_value");
            i += 1;
        });
    });

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&format!("key_{}", i % 100_000)));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&format!("missing_{}", i)));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark the full parse -> dispatch -> storage path (80% reads, 20% writes)
fn bench_execute(c: &mut Criterion) {
    let handler = create_handler();

    for i in 0..10_000 {
        let _ = handler.execute(&format!("SET key_{} value_{}", i, i));
    }

    let mut group = c.benchmark_group("execute");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let line = if i % 5 == 0 {
                format!("SET new_{} value", i)
            } else {
                format!("GET key_{}", i % 10_000)
            };
            black_box(handler.execute(&line)).ok();
            i += 1;
        });
    });

    group.bench_function("error_path", |b| {
        b.iter(|| black_box(handler.execute("SET only_one")).ok());
    });

    group.finish();
}

/// Benchmark concurrent dispatch with shared metrics
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let handler = create_handler();
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let handler = handler.clone();
                    thread::spawn(move || {
                        for i in 0..5_000 {
                            let _ = handler.execute(&format!("SET k_{}_{} v", t, i));
                            let _ = handler.execute(&format!("GET k_{}_{}", t, i));
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(handler.metrics());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_storage,
    bench_execute,
    bench_concurrent,
);

criterion_main!(benches);
