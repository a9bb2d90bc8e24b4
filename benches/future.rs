//! Benchmarks for the completion latch.
//!
//! Run with: cargo bench --bench future

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use portico::{BoxError, CompletionFuture, CompletionListener};

struct Noop;

impl CompletionListener<u64> for Noop {
    fn on_complete(&self, _future: &CompletionFuture<u64>) -> Result<(), BoxError> {
        Ok(())
    }
}

fn bench_complete_empty(c: &mut Criterion) {
    c.bench_function("future/complete_no_listeners", |b| {
        b.iter(|| {
            let future: CompletionFuture<u64> = CompletionFuture::new();
            black_box(future.complete(1))
        })
    });
}

fn bench_complete_with_listeners(c: &mut Criterion) {
    let mut group = c.benchmark_group("future/complete_with_listeners");

    for listeners in [1usize, 8, 64].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(listeners),
            listeners,
            |b, &listeners| {
                b.iter(|| {
                    let future: CompletionFuture<u64> = CompletionFuture::new();
                    for _ in 0..listeners {
                        future.add_listener(Arc::new(Noop));
                    }
                    black_box(future.complete(1))
                })
            },
        );
    }

    group.finish();
}

fn bench_add_remove_listener(c: &mut Criterion) {
    let future: CompletionFuture<u64> = CompletionFuture::new();
    let listener: Arc<dyn CompletionListener<u64>> = Arc::new(Noop);

    c.bench_function("future/add_remove_listener", |b| {
        b.iter(|| {
            future.add_listener(Arc::clone(&listener));
            black_box(future.remove_listener(&listener))
        })
    });
}

fn bench_value_read(c: &mut Criterion) {
    let future: CompletionFuture<u64> = CompletionFuture::new();
    future.complete(7);

    c.bench_function("future/value_read", |b| {
        b.iter(|| black_box(future.value()))
    });
}

criterion_group!(
    benches,
    bench_complete_empty,
    bench_complete_with_listeners,
    bench_add_remove_listener,
    bench_value_read
);
criterion_main!(benches);
