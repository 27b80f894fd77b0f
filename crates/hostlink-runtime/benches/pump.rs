//! Pump throughput: enqueue a batch, run one cycle, repeat.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hostlink_core::notification::{KindRange, QueueClass};
use hostlink_core::traits::sink_fn;
use hostlink_module::LocalService;
use hostlink_runtime::{Runtime, RuntimeConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn bench_pump(c: &mut Criterion) {
    let rt = Runtime::with_module(RuntimeConfig::new(), LocalService::builder().build());
    if !rt.init() {
        return;
    }
    let pipe = rt.current_pipe();
    let user = rt.current_user();
    let hits = Arc::new(AtomicU64::new(0));
    for base in [100u32, 300, 700] {
        let h = hits.clone();
        let _ = rt.register_callback(
            pipe,
            KindRange::new(base, base + 99),
            sink_fn(move |n| {
                h.fetch_add(n.payload.len() as u64, Ordering::Relaxed);
                Ok(())
            }),
        );
    }

    let mut group = c.benchmark_group("run_callbacks");
    for batch in [1usize, 64, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                for i in 0..batch {
                    let kind = [100, 304, 712][i % 3];
                    rt.enqueue(pipe, user, kind, vec![0u8; 16], QueueClass::Foreground);
                }
                black_box(rt.run_callbacks(pipe, false))
            });
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let rt = Runtime::with_module(RuntimeConfig::new(), LocalService::builder().build());
    if !rt.init() {
        return;
    }
    c.bench_function("resolve_cached", |b| {
        b.iter(|| black_box(rt.resolve(black_box("Friends"), black_box("015"))))
    });
}

criterion_group!(benches, bench_pump, bench_resolve);
criterion_main!(benches);
