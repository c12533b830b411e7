// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe Features
//!
//! Machining feature recognition for triangle meshes. A mesh is grouped into
//! surfaces, the surfaces into an adjacency graph, and detectors read holes,
//! pockets, slots, steps, bosses, fillets and chamfers off that graph before
//! nested features are merged and the result is ranked by confidence.
//!
//! Coordinates are millimetres with +Z as the machining direction.

pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod geometry;
pub mod io;
pub mod recognition;
pub mod stats;
pub mod utils;

pub use config::{AnalysisConfig, AnalysisMode};
pub use error::{AnalysisError, AnalysisResult, ConfigError, GeometryError};
pub use features::{Dimensions, Feature, FeatureId, FeatureKind};
pub use geometry::{Mesh, MeshBuffers, Part};
pub use io::{export_report_json, load_stl};
pub use recognition::{
    spawn_analysis, AnalysisHandle, AnalysisReport, CancellationToken, FeatureRecognizer, Stage,
};
pub use stats::FeatureStatistics;

/// Run a single analysis with `config`
pub fn analyze(buffers: &MeshBuffers, config: AnalysisConfig) -> AnalysisResult<AnalysisReport> {
    FeatureRecognizer::new(config)?.analyze(buffers)
}
