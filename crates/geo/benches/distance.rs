//! Benchmarks for geo crate distance calculations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sow_geo::{haversine_distance, parse_coordinate_label, rank_by_distance, Coordinate};

fn create_test_sites(count: usize) -> Vec<(String, Option<Coordinate>)> {
    (0..count)
        .map(|i| {
            // Generate points in a grid around Taipei
            let lat = 24.5 + (i as f64 * 0.01) % 1.0;
            let lng = 121.0 + (i as f64 * 0.01) % 1.0;
            (format!("site-{i}"), Some(Coordinate::new(lat, lng)))
        })
        .collect()
}

fn bench_single_distance(c: &mut Criterion) {
    let site = Coordinate::new(25.0330, 121.5654);
    let sample = Coordinate::new(25.0510, 121.5654);

    c.bench_function("haversine_single", |b| {
        b.iter(|| haversine_distance(black_box(&site), black_box(&sample)))
    });
}

fn bench_rank_sites(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_sites");
    let origin = Coordinate::new(25.0330, 121.5654);

    for size in [10, 100, 1000].iter() {
        let sites = create_test_sites(*size);
        group.bench_with_input(BenchmarkId::new("sorted", size), size, |b, _| {
            b.iter(|| rank_by_distance(black_box(&origin), black_box(&sites), None))
        });
    }

    group.finish();
}

fn bench_label_parsing(c: &mut Criterion) {
    c.bench_function("parse_label", |b| {
        b.iter(|| parse_coordinate_label(black_box("25.033000, 121.565400")))
    });
}

criterion_group!(benches, bench_single_distance, bench_rank_sites, bench_label_parsing);
criterion_main!(benches);
