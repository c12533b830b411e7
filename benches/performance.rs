// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector3;
use polyframe_features::geometry::MeshAdjacency;
use polyframe_features::recognition::{SurfaceSegmenter, Topology};
use polyframe_features::{analyze, AnalysisConfig, Mesh, Part};

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");

    for spacing in [5.0, 2.5, 1.0] {
        let buffers = Part::block(Vector3::new(40.0, 30.0, 20.0)).to_buffers_with(spacing, 32);
        group.bench_with_input(
            BenchmarkId::new("block", buffers.triangle_count()),
            &buffers,
            |b, buffers| b.iter(|| Mesh::ingest(black_box(buffers)).unwrap()),
        );
    }

    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");
    let part = Part::pocket_with_hole(
        Vector3::new(60.0, 50.0, 20.0),
        Vector3::new(20.0, 30.0, 10.0),
        6.0,
    );
    let mesh = Mesh::ingest(&part.to_buffers()).unwrap();
    let adjacency = MeshAdjacency::build(&mesh);
    let segmentation = SurfaceSegmenter::new(0.9).segment(&mesh, &adjacency);

    group.bench_function("adjacency", |b| {
        b.iter(|| MeshAdjacency::build(black_box(&mesh)))
    });

    group.bench_function("segment", |b| {
        b.iter(|| SurfaceSegmenter::new(0.9).segment(black_box(&mesh), &adjacency))
    });

    group.bench_function("topology", |b| {
        b.iter(|| Topology::build(black_box(&mesh), &adjacency, &segmentation, 1.0))
    });

    group.finish();
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");

    for name in ["bore", "pocket-hole", "counterbore", "fillet"] {
        if let Some(part) = Part::named(name) {
            let buffers = part.to_buffers();
            group.bench_with_input(BenchmarkId::new("part", name), &buffers, |b, buffers| {
                b.iter(|| analyze(black_box(buffers), AnalysisConfig::default()).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_stages, bench_analyze);
criterion_main!(benches);
