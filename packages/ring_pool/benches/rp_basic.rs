//! Basic benchmarks for the `ring_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use criterion::{Criterion, criterion_group, criterion_main};
use ring_pool::{ReserveOptions, RingPool};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

type TestItem = Vec<u8>;
const CAPACITY: usize = 64;

fn new_item() -> TestItem {
    Vec::with_capacity(256)
}

fn warm_pool() -> RingPool<TestItem> {
    RingPool::new(new_item, CAPACITY, CAPACITY).unwrap()
}

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_basic");

    group.bench_function("build_cold", |b| {
        b.iter(|| drop(black_box(RingPool::new(new_item, CAPACITY, 0).unwrap())));
    });

    group.bench_function("build_warm", |b| {
        b.iter(|| drop(black_box(warm_pool())));
    });

    group.bench_function("next_first", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(|| RingPool::new(new_item, CAPACITY, 0).unwrap())
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.next().unwrap());
            }

            start.elapsed()
        });
    });

    group.bench_function("next_warm", |b| {
        let mut pool = warm_pool();

        b.iter(|| {
            _ = black_box(pool.next().unwrap());
        });
    });

    group.bench_function("reserve_release", |b| {
        let mut pool = warm_pool();

        b.iter(|| {
            let (item, reservation) = pool.reserve_next(ReserveOptions::new()).unwrap();
            _ = black_box(item);
            pool.release(reservation).unwrap();
        });
    });

    group.bench_function("reserve_release_optimized", |b| {
        let mut pool = warm_pool();

        b.iter(|| {
            let (item, reservation) = pool
                .reserve_next(ReserveOptions::new().optimize())
                .unwrap();
            _ = black_box(item);
            pool.release(reservation).unwrap();
        });
    });

    group.bench_function("next_nearly_full", |b| {
        let mut pool = warm_pool();

        // Everything but one slot is reserved, so a typical scan walks most of the ring.
        let reservations = iter::repeat_with(|| pool.reserve_next(ReserveOptions::new()).unwrap().1)
            .take(CAPACITY - 1)
            .collect::<Vec<_>>();

        b.iter(|| {
            _ = black_box(pool.next().unwrap());
        });

        for reservation in reservations {
            pool.release(reservation).unwrap();
        }
    });

    group.finish();
}
