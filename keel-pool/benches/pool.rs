//! Benchmarks comparing keel-pool against the global allocator.
//!
//! Run with: cargo bench -p keel-pool

use std::alloc::Layout;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use keel_pool::PoolBuilder;

const COUNT: usize = 100_000;
const BLOCK: usize = 64;

// ============================================================================
// Allocate + free in bulk
// ============================================================================

fn bench_bulk(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk");
    group.throughput(Throughput::Elements(COUNT as u64));

    let mut pool = PoolBuilder::default()
        .block_size(BLOCK)
        .reserve(COUNT.div_ceil(1000))
        .build()
        .unwrap();
    let mut blocks = Vec::with_capacity(COUNT);

    group.bench_function("keel-pool", |b| {
        b.iter(|| {
            for _ in 0..COUNT {
                blocks.push(pool.allocate().unwrap());
            }
            for block in blocks.drain(..) {
                unsafe { pool.free(black_box(block)) };
            }
        });
    });

    let layout = Layout::from_size_align(BLOCK, 8).unwrap();
    let mut raw = Vec::with_capacity(COUNT);

    group.bench_function("std::alloc", |b| {
        b.iter(|| {
            for _ in 0..COUNT {
                raw.push(unsafe { std::alloc::alloc(layout) });
            }
            for ptr in raw.drain(..) {
                unsafe { std::alloc::dealloc(black_box(ptr), layout) };
            }
        });
    });

    group.finish();
}

// ============================================================================
// Steady state churn: one free, one allocate
// ============================================================================

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    group.throughput(Throughput::Elements(COUNT as u64));

    let mut pool = PoolBuilder::default().block_size(BLOCK).build().unwrap();
    let mut blocks: Vec<_> = (0..COUNT).map(|_| pool.allocate().unwrap()).collect();

    group.bench_function("keel-pool", |b| {
        b.iter(|| {
            for i in (0..COUNT).step_by(7) {
                unsafe { pool.free(blocks[i]) };
                blocks[i] = black_box(pool.allocate().unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_bulk, bench_churn);
criterion_main!(benches);
