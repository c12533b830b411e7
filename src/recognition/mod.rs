// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Recognition pipeline: segmentation, topology, detection, resolution and ranking

pub mod compound;
pub mod detectors;
pub mod pipeline;
pub mod segment;
pub mod topology;
pub mod validate;

pub use compound::CompoundResolver;
pub use detectors::{DetectionContext, EdgeDetector, FeatureClassifier, SurfaceDetector};
pub use pipeline::{
    spawn_analysis, AnalysisHandle, AnalysisReport, CancellationToken, FeatureRecognizer, Stage,
    StageTiming,
};
pub use segment::{CylinderFit, Segmentation, Surface, SurfaceKind, SurfaceSegmenter};
pub use topology::{AdjacencyEdge, Crease, EdgeKind, Topology};
pub use validate::{rank, FeatureValidator};
