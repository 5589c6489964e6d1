//! Benchmarks for write propagation.
//!
//! Run with: `cargo bench --package weft-store --bench propagation`
//!
//! Covers:
//! - Fan-out: one container read by many effects
//! - Chains: a line of derived values over one container
//! - Diamonds: many derived branches joined by one effect

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use weft_store::{write, Container, Derived, Store, Subscription};

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for width in [1usize, 16, 256] {
        let store = Store::new();
        let source = Container::new(0u64);
        let sink = Arc::new(AtomicU64::new(0));
        let _subscriptions: Vec<Subscription> = (0..width)
            .map(|_| {
                let (source, sink) = (source.clone(), Arc::clone(&sink));
                store.effect(move |get| {
                    sink.fetch_add(get.get(&source), Ordering::Relaxed);
                })
            })
            .collect();

        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                store.dispatch(write(&source, black_box(next))).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");
    for depth in [1usize, 16, 128] {
        let store = Store::new();
        let source = Container::new(0u64);
        let mut tail = {
            let source = source.clone();
            Derived::new(move |get| get.get(&source) + 1)
        };
        for _ in 1..depth {
            let previous = tail.clone();
            tail = Derived::new(move |get| get.get(&previous) + 1);
        }
        let _subscription = {
            let tail = tail.clone();
            store.effect(move |get| {
                black_box(get.get(&tail));
            })
        };

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                store.dispatch(write(&source, next)).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_diamond(c: &mut Criterion) {
    let mut group = c.benchmark_group("diamond");
    for branches in [2usize, 32, 256] {
        let store = Store::new();
        let source = Container::new(0u64);
        let derived: Vec<Derived<u64>> = (0..branches as u64)
            .map(|offset| {
                let source = source.clone();
                Derived::new(move |get| get.get(&source) + offset)
            })
            .collect();
        let runs = Arc::new(AtomicU64::new(0));
        let _subscription = {
            let runs = Arc::clone(&runs);
            store.effect(move |get| {
                let total: u64 = derived.iter().map(|branch| get.get(branch)).sum();
                black_box(total);
                runs.fetch_add(1, Ordering::Relaxed);
            })
        };

        group.bench_with_input(BenchmarkId::from_parameter(branches), &branches, |b, _| {
            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                store.dispatch(write(&source, next)).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_chain, bench_diamond);
criterion_main!(benches);
