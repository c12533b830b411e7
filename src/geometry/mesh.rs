// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh ingestion
//!
//! Converts raw position and index buffers into an indexed triangle mesh with
//! welded vertices and per-face normal, centroid and area. Degenerate triangles
//! are dropped; malformed input is rejected with a [`GeometryError`].

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BoundingBox, SpatialGrid};
use crate::error::GeometryError;
use crate::utils::math::{calculate_triangle_normal, triangle_area};

/// Canonical vertex id after welding
pub type VertexId = usize;

/// Stable face id (emission order of non-degenerate triangles)
pub type FaceId = usize;

/// Weld tolerance relative to the bounding-box diagonal
pub const WELD_TOLERANCE_REL: f64 = 1e-6;

/// Degenerate-area threshold relative to the squared bounding-box diagonal
pub const DEGENERATE_AREA_REL: f64 = 1e-12;

/// Raw mesh buffers handed over by a mesh-loading collaborator
///
/// `positions` is a flat `x, y, z` list. Without `indices` the positions are
/// read as a triangle soup in groups of three vertices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffers {
    pub positions: Vec<f64>,
    pub indices: Option<Vec<u32>>,
}

impl MeshBuffers {
    /// Triangle soup
    pub fn new(positions: Vec<f64>) -> Self {
        Self {
            positions,
            indices: None,
        }
    }

    pub fn indexed(positions: Vec<f64>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices: Some(indices),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.vertex_count() / 3,
        }
    }
}

/// Triangle with its derived measures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub id: FaceId,
    pub vertices: [VertexId; 3],
    pub normal: Vector3<f64>,
    pub centroid: Point3<f64>,
    pub area: f64,
}

impl Face {
    /// The three undirected edges as sorted vertex pairs
    pub fn edges(&self) -> [(VertexId, VertexId); 3] {
        let [a, b, c] = self.vertices;
        [sorted_pair(a, b), sorted_pair(b, c), sorted_pair(c, a)]
    }
}

pub(crate) fn sorted_pair(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Ingested triangle mesh
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Point3<f64>>,
    faces: Vec<Face>,
    bounds: BoundingBox,
    weld_tolerance: f64,
    skipped_degenerate: usize,
}

impl Mesh {
    /// Validate buffers, weld vertices and emit faces
    pub fn ingest(buffers: &MeshBuffers) -> Result<Self, GeometryError> {
        let raw = read_positions(&buffers.positions)?;
        let triangles = read_triangles(buffers, raw.len())?;

        let raw_bounds = BoundingBox::from_points(raw.iter());
        let diagonal = raw_bounds.diagonal();
        let weld_tolerance = (diagonal * WELD_TOLERANCE_REL).max(f64::EPSILON);
        let area_epsilon = (diagonal * diagonal * DEGENERATE_AREA_REL).max(f64::MIN_POSITIVE);

        let (vertices, canonical) = weld(&raw, &raw_bounds, weld_tolerance);

        let mut faces = Vec::with_capacity(triangles.len());
        let mut skipped = 0;
        for [i0, i1, i2] in triangles {
            let ids = [canonical[i0], canonical[i1], canonical[i2]];
            if ids[0] == ids[1] || ids[1] == ids[2] || ids[0] == ids[2] {
                skipped += 1;
                continue;
            }

            let p0 = vertices[ids[0]];
            let p1 = vertices[ids[1]];
            let p2 = vertices[ids[2]];
            let area = triangle_area(&p0, &p1, &p2);
            let normal = match calculate_triangle_normal(&p0, &p1, &p2) {
                Some(normal) if area >= area_epsilon => normal,
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            faces.push(Face {
                id: faces.len(),
                vertices: ids,
                normal,
                centroid: Point3::from((p0.coords + p1.coords + p2.coords) / 3.0),
                area,
            });
        }

        if faces.is_empty() {
            return Err(GeometryError::AllDegenerate { skipped });
        }

        let bounds = BoundingBox::from_points(
            faces
                .iter()
                .flat_map(|face| face.vertices.iter().map(|&v| &vertices[v])),
        );
        let size = bounds.size();
        if size.x <= weld_tolerance || size.y <= weld_tolerance || size.z <= weld_tolerance {
            return Err(GeometryError::ZeroVolume {
                x: size.x,
                y: size.y,
                z: size.z,
            });
        }

        debug!(
            raw_vertices = raw.len(),
            welded_vertices = vertices.len(),
            faces = faces.len(),
            skipped_degenerate = skipped,
            "mesh ingested"
        );

        Ok(Self {
            vertices,
            faces,
            bounds,
            weld_tolerance,
            skipped_degenerate: skipped,
        })
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn vertex(&self, id: VertexId) -> &Point3<f64> {
        &self.vertices[id]
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id]
    }

    pub fn face_points(&self, face: &Face) -> [Point3<f64>; 3] {
        face.vertices.map(|v| self.vertices[v])
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn weld_tolerance(&self) -> f64 {
        self.weld_tolerance
    }

    pub fn skipped_degenerate(&self) -> usize {
        self.skipped_degenerate
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Length of the edge between two vertices
    pub fn edge_length(&self, a: VertexId, b: VertexId) -> f64 {
        (self.vertices[a] - self.vertices[b]).norm()
    }
}

fn read_positions(positions: &[f64]) -> Result<Vec<Point3<f64>>, GeometryError> {
    if positions.is_empty() {
        return Err(GeometryError::EmptyMesh);
    }
    if positions.len() % 3 != 0 {
        return Err(GeometryError::MalformedVertexBuffer {
            len: positions.len(),
        });
    }
    if let Some((offset, &value)) = positions.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(GeometryError::NonFiniteCoordinate { offset, value });
    }

    Ok(positions
        .chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect())
}

fn read_triangles(
    buffers: &MeshBuffers,
    vertex_count: usize,
) -> Result<Vec<[usize; 3]>, GeometryError> {
    match &buffers.indices {
        Some(indices) => {
            if indices.len() % 3 != 0 {
                return Err(GeometryError::MalformedIndexBuffer { len: indices.len() });
            }
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(GeometryError::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
            Ok(indices
                .chunks_exact(3)
                .map(|c| [c[0] as usize, c[1] as usize, c[2] as usize])
                .collect())
        }
        None => {
            if vertex_count % 3 != 0 {
                return Err(GeometryError::IncompleteTriangle { vertex_count });
            }
            Ok((0..vertex_count / 3)
                .map(|t| [3 * t, 3 * t + 1, 3 * t + 2])
                .collect())
        }
    }
}

/// Collapse positions closer than `tolerance` onto one canonical vertex
///
/// Returns the canonical positions and, for every raw position, its canonical id.
fn weld(
    raw: &[Point3<f64>],
    bounds: &BoundingBox,
    tolerance: f64,
) -> (Vec<Point3<f64>>, Vec<VertexId>) {
    let mut grid: SpatialGrid<VertexId> = SpatialGrid::new(bounds.min, tolerance);
    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut canonical = Vec::with_capacity(raw.len());

    for point in raw {
        let existing = grid
            .neighbors(point)
            .into_iter()
            .find(|&id| (vertices[id] - point).norm() <= tolerance);
        let id = match existing {
            Some(existing) => existing,
            None => {
                let id = vertices.len();
                vertices.push(*point);
                grid.insert(*point, id);
                id
            }
        };
        canonical.push(id);
    }

    (vertices, canonical)
}
