//! Benchmarks for the per-frame force pass.
//!
//! Run with: cargo bench -p tagcube-core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tagcube_core::{ClusterConfig, Mutation, TagCluster, TokenRecord};

const DT: f64 = 1.0 / 60.0;

/// Engine with `n` tags already pulled into the cluster.
fn settled_engine(n: usize) -> TagCluster {
    let mut engine = TagCluster::new(ClusterConfig {
        seed: Some(7),
        max_capacity: n,
        ..Default::default()
    })
    .unwrap();
    let batch = (0..n)
        .map(|i| TokenRecord::new(&format!("t{i}"), &format!("T{i}"), (i % 10) as f64 / 10.0))
        .collect();
    engine.enqueue(Mutation::Reconcile(batch));
    for _ in 0..240 {
        engine.step(DT);
    }
    engine
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_step");

    for n in [16, 64, 256] {
        let mut engine = settled_engine(n);
        group.bench_with_input(BenchmarkId::new("settled", n), &n, |b, _| {
            b.iter(|| black_box(engine.step(black_box(DT))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
