// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for feature recognition
//!
//! Only [`GeometryError`] and the caller-driven [`AnalysisError`] variants cross
//! the library boundary. [`DetectorSkip`] stays inside the classifier: a skipped
//! candidate is logged and the pipeline carries on.

use thiserror::Error;

use crate::recognition::Stage;

/// Fatal problems with the input mesh.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum GeometryError {
    /// The vertex buffer holds no coordinates.
    #[error("mesh has no vertices")]
    EmptyMesh,

    /// The vertex buffer length is not a multiple of 3.
    #[error("vertex buffer length {len} is not a multiple of 3")]
    MalformedVertexBuffer {
        /// Length of the offending buffer.
        len: usize,
    },

    /// The index buffer length is not a multiple of 3.
    #[error("index buffer length {len} is not a multiple of 3")]
    MalformedIndexBuffer {
        /// Length of the offending buffer.
        len: usize,
    },

    /// A non-indexed mesh whose vertex count does not form whole triangles.
    #[error("triangle soup has {vertex_count} vertices, not a multiple of 3")]
    IncompleteTriangle {
        /// Number of vertices in the soup.
        vertex_count: usize,
    },

    /// An index points past the end of the vertex buffer.
    #[error("index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// The offending index.
        index: u32,
        /// Number of vertices available.
        vertex_count: usize,
    },

    /// A coordinate is NaN or infinite.
    #[error("non-finite coordinate {value} at buffer offset {offset}")]
    NonFiniteCoordinate {
        /// Offset into the flat position buffer.
        offset: usize,
        /// The coordinate value.
        value: f64,
    },

    /// Every triangle was dropped as degenerate.
    #[error("mesh contains only degenerate triangles ({skipped} skipped)")]
    AllDegenerate {
        /// Number of degenerate triangles skipped.
        skipped: usize,
    },

    /// The bounding box is flat along at least one axis.
    #[error("zero-volume bounding box ({x} x {y} x {z})")]
    ZeroVolume {
        /// Extent along X.
        x: f64,
        /// Extent along Y.
        y: f64,
        /// Extent along Z.
        z: f64,
    },
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("feature size multiplier must be positive and finite, got {0}")]
    InvalidMultiplier(f64),

    #[error("confidence threshold must lie in [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("surface grouping tolerance must lie in [0.5, 0.95], got {0}")]
    ToleranceOutOfRange(f64),
}

/// Errors returned by an analysis run.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum AnalysisError {
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The caller cancelled the run.
    #[error("analysis cancelled after {stage}")]
    Cancelled { stage: Stage },

    /// The run outlived its deadline.
    #[error("analysis deadline exceeded after {stage}")]
    DeadlineExceeded { stage: Stage },

    /// An internal consistency check failed.
    #[error("invariant violated during {stage}: {detail}")]
    Invariant { stage: Stage, detail: String },

    /// A background worker went away without reporting.
    #[error("analysis worker terminated without a result")]
    WorkerLost,
}

impl AnalysisError {
    /// Stage the run was in when it stopped, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AnalysisError::Geometry(_) => Some(Stage::Ingest),
            AnalysisError::Config(_) | AnalysisError::WorkerLost => None,
            AnalysisError::Cancelled { stage }
            | AnalysisError::DeadlineExceeded { stage }
            | AnalysisError::Invariant { stage, .. } => Some(*stage),
        }
    }
}

/// A detector declined a degenerate candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("candidate skipped: {reason}")]
pub struct DetectorSkip {
    pub reason: &'static str,
}

impl DetectorSkip {
    pub const fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Result alias for analysis runs.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
