// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Properties that hold for every reference part

use polyframe_features::geometry::MeshAdjacency;
use polyframe_features::recognition::SurfaceSegmenter;
use polyframe_features::{analyze, AnalysisConfig, FeatureId, Mesh, Part};
use std::collections::BTreeSet;

fn parts() -> Vec<(&'static str, Part)> {
    Part::names()
        .iter()
        .filter_map(|&name| Part::named(name).map(|part| (name, part)))
        .collect()
}

#[test]
fn test_segmentation_partitions_faces() {
    for (name, part) in parts() {
        let mesh = Mesh::ingest(&part.to_buffers()).unwrap();
        let adjacency = MeshAdjacency::build(&mesh);
        let segmentation = SurfaceSegmenter::new(0.9).segment(&mesh, &adjacency);
        assert!(segmentation.check_partition(mesh.face_count()).is_ok(), "{name}");

        let mut seen = vec![0usize; mesh.face_count()];
        for surface in &segmentation.surfaces {
            for &face in &surface.faces {
                seen[face] += 1;
            }
        }
        for noise in &segmentation.noise {
            for &face in noise {
                seen[face] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 1), "{name}");
    }
}

#[test]
fn test_reported_values_in_range() {
    for (name, part) in parts() {
        let config = AnalysisConfig::default();
        let report = analyze(&part.to_buffers(), config.clone()).unwrap();
        for feature in &report.features {
            assert!(feature.confidence >= config.confidence_threshold, "{name}");
            assert!(feature.confidence <= 1.0, "{name}");
            assert!(!feature.dimensions.is_empty(), "{name}");
            assert!(feature.dimensions.iter().all(|(_, v)| v.is_finite() && v > 0.0), "{name}");
            assert!(feature.position.coords.iter().all(|c| c.is_finite()), "{name}");
        }

        let ids: BTreeSet<FeatureId> = report.features.iter().map(|f| f.id).collect();
        assert_eq!(ids.len(), report.features.len(), "{name}");

        for pair in report.features.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence, "{name}");
        }
    }
}

#[test]
fn test_raising_threshold_only_removes() {
    for (name, part) in parts() {
        let buffers = part.to_buffers();
        let loose = analyze(&buffers, AnalysisConfig::default().with_threshold(0.3)).unwrap();
        let strict = analyze(&buffers, AnalysisConfig::default().with_threshold(0.8)).unwrap();

        let loose_ids: BTreeSet<FeatureId> = loose.features.iter().map(|f| f.id).collect();
        assert!(strict.features.len() <= loose.features.len(), "{name}");
        assert!(strict.features.iter().all(|f| loose_ids.contains(&f.id)), "{name}");
    }
}

#[test]
fn test_analysis_is_deterministic() {
    for (name, part) in parts() {
        let buffers = part.to_buffers();
        let first = analyze(&buffers, AnalysisConfig::default()).unwrap();
        let second = analyze(&buffers, AnalysisConfig::default()).unwrap();
        assert_eq!(
            serde_json::to_value(&first.features).unwrap(),
            serde_json::to_value(&second.features).unwrap(),
            "{name}"
        );
        assert_eq!(first.statistics, second.statistics, "{name}");
    }
}
