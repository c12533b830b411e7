// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation, spatial lookup and reference parts

mod adjacency;
mod bbox;
mod mesh;
mod primitives;
mod spatial;

pub use adjacency::MeshAdjacency;
pub use bbox::BoundingBox;
pub use mesh::{Face, FaceId, Mesh, MeshBuffers, VertexId, DEGENERATE_AREA_REL, WELD_TOLERANCE_REL};
pub use primitives::{Circle, Part, PartBuilder, Rect, DEFAULT_SEGMENTS, DEFAULT_SPACING};
pub use spatial::{CellKey, SpatialGrid};
