use core::hint::black_box;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pichord::{
    Allocator, DigitSequence, MemoryStore, Renderer, Resolution, ResolutionSet, render,
    render::geometry::scatter,
};
use std::{sync::Arc, thread::scope, time::Instant};

const PI: &str = "3.14159265358979323846264338327950288419716939937510\
                  58209749445923078164062862089986280348253421170679\
                  82148086513282306647093844609550582231725359408128\
                  48111745028410270193852110555964462294895493038196";

/// Full render of the default resolution set at increasing assigned counts.
fn bench_render(c: &mut Criterion) {
    let digits = DigitSequence::from_text(PI);
    let resolutions = ResolutionSet::default();

    let mut group = c.benchmark_group("render/default_set");
    group.sample_size(10);
    for count in [0_u64, 100, 1_000, 5_000] {
        group.throughput(Throughput::Elements(count.max(1)));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(render(count, &digits, &resolutions).unwrap()));
        });
    }
    group.finish();
}

/// A single small canvas, isolating per-chord cost from PNG encoding of
/// large images.
fn bench_render_small(c: &mut Criterion) {
    let digits = DigitSequence::from_text(PI);
    let resolutions = ResolutionSet::new(vec![Resolution::new(256, 256)], "256x256").unwrap();

    let mut group = c.benchmark_group("render/256x256");
    for count in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(render(count, &digits, &resolutions).unwrap()));
        });
    }
    group.finish();
}

/// One new position on top of a warm renderer, the cost paid per first-time
/// assignment.
fn bench_render_incremental(c: &mut Criterion) {
    let digits = DigitSequence::from_text(PI);

    let mut group = c.benchmark_group("render/incremental");
    group.sample_size(10);
    for start in [1_000_u64, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(start), &start, |b, &start| {
            let mut renderer = Renderer::new(ResolutionSet::default());
            renderer.render(start, &digits).unwrap();
            let mut count = start;
            b.iter(|| {
                count += 1;
                black_box(renderer.render(count, &digits).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_scatter(c: &mut Criterion) {
    const N: u64 = 4096;
    let mut group = c.benchmark_group("geometry");
    group.throughput(Throughput::Elements(N));
    group.bench_function(format!("scatter/{N}"), |b| {
        b.iter(|| {
            for i in 0..N {
                black_box(scatter(black_box(i)));
            }
        });
    });
    group.finish();
}

/// Contended first-time claims against the in-memory store.
fn bench_assign_contended(c: &mut Criterion) {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 512;

    let mut group = c.benchmark_group("allocator/memory");
    group.throughput(Throughput::Elements((THREADS * PER_THREAD) as u64));
    group.bench_function(format!("threads/{THREADS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let allocator = Arc::new(Allocator::new(
                    MemoryStore::new(),
                    DigitSequence::from_text(PI),
                ));
                scope(|s| {
                    for t in 0..THREADS {
                        let allocator = Arc::clone(&allocator);
                        s.spawn(move || {
                            for i in 0..PER_THREAD {
                                black_box(allocator.assign(&format!("{t}-{i}")).unwrap());
                            }
                        });
                    }
                });
            }
            start.elapsed()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_render,
    bench_render_small,
    bench_render_incremental,
    bench_scatter,
    bench_assign_contended
);
criterion_main!(benches);
