// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Surface adjacency graph
//!
//! Two surfaces are adjacent when they share a welded vertex. Each adjacent
//! pair gets one [`AdjacencyEdge`] whose measures come from the face pairs
//! straddling the shared boundary: pairs across a shared mesh edge when there
//! are any, otherwise pairs meeting at a shared vertex.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use tracing::debug;

use super::segment::{Segmentation, Surface};
use crate::geometry::{BoundingBox, Face, FaceId, Mesh, MeshAdjacency, SpatialGrid};
use crate::utils::math::angle_between;

/// Normal dot above which a boundary is coplanar
pub const COPLANAR_DOT: f64 = 0.95;

/// Normal dot below which a boundary is concave
pub const CONCAVE_DOT: f64 = -0.1;

/// Normal dot above which a boundary is convex
pub const CONVEX_DOT: f64 = 0.1;

/// Minimum mean crease score for a valley or ridge
pub const CREASE_THRESHOLD: f64 = 0.02;

/// Boundary classification from the normal dot product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Coplanar,
    Concave,
    Convex,
    Adjacent,
}

impl EdgeKind {
    pub fn from_dot(dot: f64) -> Self {
        if dot > COPLANAR_DOT {
            EdgeKind::Coplanar
        } else if dot < CONCAVE_DOT {
            EdgeKind::Concave
        } else if dot > CONVEX_DOT {
            EdgeKind::Convex
        } else {
            EdgeKind::Adjacent
        }
    }
}

/// Inside or outside corner character of a boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Crease {
    /// Inside corner: each side rises in front of the other.
    Valley,
    /// Outside corner: each side falls behind the other.
    Ridge,
    Smooth,
}

impl Crease {
    fn from_score(score: f64) -> Self {
        if score > CREASE_THRESHOLD {
            Crease::Valley
        } else if score < -CREASE_THRESHOLD {
            Crease::Ridge
        } else {
            Crease::Smooth
        }
    }
}

/// Relation between two adjacent surfaces (or faces)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyEdge {
    /// The two sides, smaller id first.
    pub sides: (usize, usize),
    pub kind: EdgeKind,
    pub crease: Crease,
    /// Mean normal dot product across the boundary.
    pub normal_dot: f64,
    /// Mean angle between the normals across the boundary.
    pub normal_angle: f64,
    /// `π − normal_angle`
    pub dihedral_angle: f64,
    /// `|π − dihedral| / π`, 0 for a flat continuation and 1 for a fold back
    pub sharpness: f64,
    /// Summed length of shared mesh edges; zero for a vertex contact.
    pub boundary_length: f64,
    pub boundary_center: Point3<f64>,
    pub boundary_bounds: BoundingBox,
}

impl AdjacencyEdge {
    pub fn involves(&self, side: usize) -> bool {
        self.sides.0 == side || self.sides.1 == side
    }

    /// The side opposite `side`
    pub fn other(&self, side: usize) -> usize {
        if self.sides.0 == side {
            self.sides.1
        } else {
            self.sides.0
        }
    }
}

/// Weighted running sums for one boundary
#[derive(Debug, Clone)]
struct BoundaryMeasure {
    weight: f64,
    dot: f64,
    angle: f64,
    crease: f64,
    length: f64,
    point_sum: Vector3<f64>,
    point_count: usize,
    bounds: BoundingBox,
}

impl BoundaryMeasure {
    fn new() -> Self {
        Self {
            weight: 0.0,
            dot: 0.0,
            angle: 0.0,
            crease: 0.0,
            length: 0.0,
            point_sum: Vector3::zeros(),
            point_count: 0,
            bounds: BoundingBox::empty(),
        }
    }

    fn add_pair(&mut self, a: &Face, b: &Face, weight: f64) {
        self.weight += weight;
        self.dot += a.normal.dot(&b.normal) * weight;
        self.angle += angle_between(&a.normal, &b.normal) * weight;
        self.crease += crease_score(a, b) * weight;
    }

    fn add_point(&mut self, point: &Point3<f64>) {
        self.point_sum += point.coords;
        self.point_count += 1;
        self.bounds.expand_to_include(point);
    }

    fn finish(&self, sides: (usize, usize)) -> AdjacencyEdge {
        let weight = self.weight.max(f64::MIN_POSITIVE);
        let normal_dot = self.dot / weight;
        let normal_angle = self.angle / weight;
        let dihedral_angle = PI - normal_angle;
        let boundary_center = if self.point_count > 0 {
            Point3::from(self.point_sum / self.point_count as f64)
        } else {
            Point3::origin()
        };

        AdjacencyEdge {
            sides,
            kind: EdgeKind::from_dot(normal_dot),
            crease: Crease::from_score(self.crease / weight),
            normal_dot,
            normal_angle,
            dihedral_angle,
            sharpness: (PI - dihedral_angle).abs() / PI,
            boundary_length: self.length,
            boundary_center,
            boundary_bounds: self.bounds,
        }
    }
}

/// Symmetric crease score of a face pair: positive when each face lies in
/// front of the other's plane
fn crease_score(a: &Face, b: &Face) -> f64 {
    match (b.centroid - a.centroid).try_normalize(1e-12) {
        Some(direction) => a.normal.dot(&direction) - b.normal.dot(&direction),
        None => 0.0,
    }
}

/// Adjacency graph over the surfaces of one segmentation
#[derive(Debug, Clone)]
pub struct Topology {
    edges: Vec<AdjacencyEdge>,
    incident: Vec<Vec<usize>>,
    surface_grid: SpatialGrid<usize>,
    centroids: Vec<Point3<f64>>,
    default_radius: f64,
}

impl Topology {
    /// Build the graph; `default_radius` answers radius-less neighbourhood queries
    pub fn build(
        mesh: &Mesh,
        adjacency: &MeshAdjacency,
        segmentation: &Segmentation,
        default_radius: f64,
    ) -> Self {
        let owner = segmentation.face_surfaces();
        let mut measures: BTreeMap<(usize, usize), BoundaryMeasure> = BTreeMap::new();

        for ((v0, v1), faces) in adjacency.edges() {
            let length = mesh.edge_length(v0, v1);
            for (i, &fa) in faces.iter().enumerate() {
                for &fb in &faces[i + 1..] {
                    let Some(key) = surface_pair(owner[fa], owner[fb]) else {
                        continue;
                    };
                    let measure = measures.entry(key).or_insert_with(BoundaryMeasure::new);
                    measure.add_pair(mesh.face(fa), mesh.face(fb), length);
                    measure.length += length;
                    measure.add_point(mesh.vertex(v0));
                    measure.add_point(mesh.vertex(v1));
                }
            }
        }

        let edge_pairs: BTreeSet<(usize, usize)> = measures.keys().copied().collect();
        for vertex in 0..mesh.vertex_count() {
            let faces = adjacency.faces_at_vertex(vertex);
            for (i, &fa) in faces.iter().enumerate() {
                for &fb in &faces[i + 1..] {
                    let Some(key) = surface_pair(owner[fa], owner[fb]) else {
                        continue;
                    };
                    if edge_pairs.contains(&key) {
                        continue;
                    }
                    let measure = measures.entry(key).or_insert_with(BoundaryMeasure::new);
                    measure.add_pair(mesh.face(fa), mesh.face(fb), 1.0);
                    measure.add_point(mesh.vertex(vertex));
                }
            }
        }

        let surfaces = &segmentation.surfaces;
        let mut incident = vec![Vec::new(); surfaces.len()];
        let edges: Vec<AdjacencyEdge> = measures
            .iter()
            .enumerate()
            .map(|(index, (&sides, measure))| {
                incident[sides.0].push(index);
                incident[sides.1].push(index);
                measure.finish(sides)
            })
            .collect();

        let mut surface_grid = SpatialGrid::for_bounds(mesh.bounds());
        for surface in surfaces {
            surface_grid.insert(surface.centroid, surface.id);
        }

        debug!(
            surfaces = surfaces.len(),
            edges = edges.len(),
            vertex_contacts = edges.len() - edge_pairs.len(),
            "topology built"
        );

        Self {
            edges,
            incident,
            surface_grid,
            centroids: surfaces.iter().map(|s| s.centroid).collect(),
            default_radius,
        }
    }

    pub fn edges(&self) -> &[AdjacencyEdge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edge between two surfaces, if adjacent
    pub fn edge_between(&self, a: usize, b: usize) -> Option<&AdjacencyEdge> {
        self.incident
            .get(a)?
            .iter()
            .map(|&index| &self.edges[index])
            .find(|edge| edge.other(a) == b)
    }

    /// Adjacent surfaces of `surface` with the connecting edge, in ascending edge order
    pub fn neighbors(&self, surface: usize) -> impl Iterator<Item = (usize, &AdjacencyEdge)> + '_ {
        self.incident
            .get(surface)
            .into_iter()
            .flatten()
            .map(move |&index| {
                let edge = &self.edges[index];
                (edge.other(surface), edge)
            })
    }

    /// Surfaces whose centroid lies within `radius` of this surface's centroid
    ///
    /// `None` uses the default radius (the minimum feature size).
    pub fn find_neighboring_surfaces(&self, surface: usize, radius: Option<f64>) -> Vec<usize> {
        let Some(center) = self.centroids.get(surface) else {
            return Vec::new();
        };
        let radius = radius.unwrap_or(self.default_radius);
        self.surface_grid
            .query_radius(center, radius)
            .into_iter()
            .filter(|&(id, distance)| id != surface && distance < radius)
            .map(|(id, _)| id)
            .collect()
    }

    /// Measures between two faces sharing at least one vertex
    pub fn face_edge(mesh: &Mesh, a: FaceId, b: FaceId) -> Option<AdjacencyEdge> {
        let (fa, fb) = (mesh.face(a), mesh.face(b));
        let shared: Vec<usize> = fa
            .vertices
            .iter()
            .copied()
            .filter(|v| fb.vertices.contains(v))
            .collect();
        if shared.is_empty() || a == b {
            return None;
        }

        let mut measure = BoundaryMeasure::new();
        let weight = if shared.len() >= 2 {
            mesh.edge_length(shared[0], shared[1])
        } else {
            1.0
        };
        measure.add_pair(fa, fb, weight);
        if shared.len() >= 2 {
            measure.length = weight;
        }
        for &v in &shared {
            measure.add_point(mesh.vertex(v));
        }
        Some(measure.finish(if a < b { (a, b) } else { (b, a) }))
    }
}

fn surface_pair(a: Option<usize>, b: Option<usize>) -> Option<(usize, usize)> {
    match (a, b) {
        (Some(a), Some(b)) if a < b => Some((a, b)),
        (Some(a), Some(b)) if b < a => Some((b, a)),
        _ => None,
    }
}

/// Neighbours of `surface` across a boundary with the given crease
pub fn crease_neighbors<'a>(
    topology: &'a Topology,
    surface: &Surface,
    crease: Crease,
) -> impl Iterator<Item = (usize, &'a AdjacencyEdge)> + 'a {
    topology
        .neighbors(surface.id)
        .filter(move |(_, edge)| edge.crease == crease)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{MeshBuffers, Part};
    use crate::recognition::segment::SurfaceSegmenter;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn build(buffers: &MeshBuffers) -> (Mesh, Segmentation, Topology) {
        let mesh = Mesh::ingest(buffers).unwrap();
        let adjacency = MeshAdjacency::build(&mesh);
        let segmentation = SurfaceSegmenter::new(0.9).segment(&mesh, &adjacency);
        let topology = Topology::build(&mesh, &adjacency, &segmentation, 1.0);
        (mesh, segmentation, topology)
    }

    fn surface_facing(seg: &Segmentation, direction: Vector3<f64>, z: f64) -> usize {
        seg.surfaces
            .iter()
            .find(|s| s.is_planar() && s.normal.dot(&direction) > 0.99 && (s.centroid.z - z).abs() < 1e-6)
            .map(|s| s.id)
            .expect("surface not found")
    }

    #[test]
    fn test_edge_kind_thresholds() {
        assert_eq!(EdgeKind::from_dot(0.99), EdgeKind::Coplanar);
        assert_eq!(EdgeKind::from_dot(0.5), EdgeKind::Convex);
        assert_eq!(EdgeKind::from_dot(0.0), EdgeKind::Adjacent);
        assert_eq!(EdgeKind::from_dot(-0.5), EdgeKind::Concave);
    }

    #[test]
    fn test_block_edges_are_ridges() {
        let (_, seg, topology) = build(&Part::block(Vector3::new(20.0, 20.0, 20.0)).to_buffers());
        // Every pair of touching sides shares a full box edge.
        assert_eq!(seg.surfaces.len(), 6);
        assert_eq!(topology.edge_count(), 12);
        for edge in topology.edges() {
            assert_eq!(edge.crease, Crease::Ridge);
            assert_eq!(edge.kind, EdgeKind::Adjacent);
            assert_relative_eq!(edge.sharpness, 0.5, epsilon = 1e-9);
            assert_relative_eq!(edge.boundary_length, 20.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pocket_floor_walls_are_valleys() {
        let (_, seg, topology) = build(
            &Part::pocketed_block(Vector3::new(60.0, 50.0, 20.0), Vector3::new(20.0, 30.0, 10.0))
                .to_buffers(),
        );
        let floor = surface_facing(&seg, Vector3::z(), 10.0);
        let valleys = topology
            .neighbors(floor)
            .filter(|(_, edge)| edge.crease == Crease::Valley)
            .count();
        assert_eq!(valleys, 4);

        let top = surface_facing(&seg, Vector3::z(), 20.0);
        assert!(topology
            .neighbors(top)
            .all(|(_, edge)| edge.crease == Crease::Ridge));
    }

    #[test]
    fn test_neighbourhood_query() {
        let (_, seg, topology) = build(&Part::block(Vector3::new(20.0, 20.0, 20.0)).to_buffers());
        let top = surface_facing(&seg, Vector3::z(), 20.0);
        assert!(topology.find_neighboring_surfaces(top, None).is_empty());
        // Side centroids sit √200 ≈ 14.1 away from the top centroid.
        assert_eq!(topology.find_neighboring_surfaces(top, Some(15.0)).len(), 4);
        assert_eq!(topology.find_neighboring_surfaces(top, Some(25.0)).len(), 5);
    }

    #[test]
    fn test_face_edge_measures() {
        let (mesh, _, _) = build(&Part::block(Vector3::new(10.0, 10.0, 10.0)).to_buffers());
        let adjacency = MeshAdjacency::build(&mesh);
        let face = 0;
        let coplanar = adjacency.faces_for_edge(mesh.face(face).vertices[0], mesh.face(face).vertices[2]);
        let other = coplanar.iter().copied().find(|&f| f != face).unwrap();
        let edge = Topology::face_edge(&mesh, face, other).unwrap();
        assert_eq!(edge.kind, EdgeKind::Coplanar);
        assert_eq!(edge.crease, Crease::Smooth);
        assert!(edge.boundary_length > 0.0);
        assert!(Topology::face_edge(&mesh, face, face).is_none());
    }
}
