//! Delta building and location transform benchmarks

use anchor_core::{diff_text, transform, transform_chain, Location, SnapshotRef};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn source(lines: usize, every: usize, tag: &str) -> String {
    (0..lines)
        .map(|i| {
            if every > 0 && i % every == 0 {
                format!("{} edited line {}\n", tag, i)
            } else {
                format!("fn item_{}() {{ body({}); }}\n", i, i)
            }
        })
        .collect()
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_text");
    for size in [100usize, 1_000, 10_000] {
        let old = source(size, 0, "");
        let new = source(size, 25, "v2");
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                diff_text(
                    SnapshotRef::commit("old"),
                    black_box(&old),
                    SnapshotRef::commit("new"),
                    black_box(&new),
                )
            });
        });
    }
    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let old = source(5_000, 0, "");
    let new = source(5_000, 10, "v2");
    let delta = diff_text(SnapshotRef::commit("old"), &old, SnapshotRef::commit("new"), &new);
    let location = Location::new(4_001, 3, 4_020, 12);

    c.bench_function("transform_single", |b| {
        b.iter(|| transform(black_box(location), black_box(&delta)));
    });
}

fn bench_chain(c: &mut Criterion) {
    let versions: Vec<String> = (0..16).map(|v| source(2_000, 50 + v, &format!("v{}", v))).collect();
    let deltas: Vec<_> = versions
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            diff_text(
                SnapshotRef::commit(format!("c{}", i)),
                &pair[0],
                SnapshotRef::commit(format!("c{}", i + 1)),
                &pair[1],
            )
        })
        .collect();
    let location = Location::lines(1_500, 1_510);

    c.bench_function("transform_chain_15", |b| {
        b.iter(|| transform_chain(black_box(location), deltas.iter()));
    });
}

criterion_group!(benches, bench_diff, bench_transform, bench_chain);
criterion_main!(benches);
