// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Face adjacency lookups over welded vertices

use ahash::AHashMap;

use super::mesh::{sorted_pair, FaceId, Mesh, VertexId};

/// Edge-to-face and vertex-to-face relationships of an ingested mesh
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Faces touching each vertex, ascending.
    vertex_faces: Vec<Vec<FaceId>>,
    /// Faces on each undirected edge `(v0, v1)` with `v0 < v1`.
    edge_faces: AHashMap<(VertexId, VertexId), Vec<FaceId>>,
    /// Every edge key, sorted for deterministic iteration.
    edges: Vec<(VertexId, VertexId)>,
}

impl MeshAdjacency {
    pub fn build(mesh: &Mesh) -> Self {
        let mut vertex_faces = vec![Vec::new(); mesh.vertex_count()];
        let mut edge_faces: AHashMap<(VertexId, VertexId), Vec<FaceId>> = AHashMap::new();

        for face in mesh.faces() {
            for &v in &face.vertices {
                vertex_faces[v].push(face.id);
            }
            for edge in face.edges() {
                edge_faces.entry(edge).or_default().push(face.id);
            }
        }

        let mut edges: Vec<_> = edge_faces.keys().copied().collect();
        edges.sort_unstable();

        Self {
            vertex_faces,
            edge_faces,
            edges,
        }
    }

    pub fn faces_at_vertex(&self, vertex: VertexId) -> &[FaceId] {
        self.vertex_faces.get(vertex).map_or(&[], Vec::as_slice)
    }

    pub fn faces_for_edge(&self, v0: VertexId, v1: VertexId) -> &[FaceId] {
        self.edge_faces
            .get(&sorted_pair(v0, v1))
            .map_or(&[], Vec::as_slice)
    }

    /// Faces sharing at least one vertex with `face`, ascending
    pub fn face_neighbors(&self, mesh: &Mesh, face: FaceId) -> Vec<FaceId> {
        let mut neighbors: Vec<FaceId> = mesh
            .face(face)
            .vertices
            .iter()
            .flat_map(|&v| self.faces_at_vertex(v).iter().copied())
            .filter(|&other| other != face)
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    /// Every edge with the faces on it, in ascending edge order
    pub fn edges(&self) -> impl Iterator<Item = ((VertexId, VertexId), &[FaceId])> + '_ {
        self.edges
            .iter()
            .map(move |edge| (*edge, self.edge_faces[edge].as_slice()))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges with exactly one face; a closed solid has none
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_faces.values().filter(|faces| faces.len() == 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshBuffers;

    fn two_triangles() -> Mesh {
        Mesh::ingest(&MeshBuffers::indexed(
            vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
                1.0, 1.0, 1.0,
            ],
            vec![0, 1, 2, 1, 3, 2],
        ))
        .unwrap()
    }

    #[test]
    fn test_edge_and_vertex_lookup() {
        let mesh = two_triangles();
        let adjacency = MeshAdjacency::build(&mesh);

        assert_eq!(adjacency.faces_for_edge(2, 1), &[0, 1]);
        assert_eq!(adjacency.faces_for_edge(0, 1), &[0]);
        assert_eq!(adjacency.faces_at_vertex(3), &[1]);
        assert_eq!(adjacency.edge_count(), 5);
        assert_eq!(adjacency.boundary_edge_count(), 4);
    }

    #[test]
    fn test_face_neighbors() {
        let mesh = two_triangles();
        let adjacency = MeshAdjacency::build(&mesh);
        assert_eq!(adjacency.face_neighbors(&mesh, 0), vec![1]);
        assert_eq!(adjacency.face_neighbors(&mesh, 1), vec![0]);
    }
}
