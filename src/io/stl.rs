// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL import and export through `stl_io`

use anyhow::{bail, Context, Result};
use nalgebra::{Point3, Vector3};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;
use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};

use crate::geometry::MeshBuffers;
use crate::utils::math::calculate_triangle_normal;

/// Load an STL file (binary or ASCII) as indexed buffers
pub fn load_stl(path: impl AsRef<Path>) -> Result<MeshBuffers> {
    let path = path.as_ref();
    let mut file =
        File::open(path).with_context(|| format!("Failed to open STL file: {:?}", path))?;
    read_stl(&mut file).with_context(|| format!("Failed to read STL file: {:?}", path))
}

/// Read STL data from any seekable reader
pub fn read_stl<R: Read + Seek>(reader: &mut R) -> Result<MeshBuffers> {
    let stl = stl_io::read_stl(reader).context("Invalid STL data")?;

    let positions: Vec<f64> = stl
        .vertices
        .iter()
        .flat_map(|v| [v[0] as f64, v[1] as f64, v[2] as f64])
        .collect();

    let mut indices = Vec::with_capacity(stl.faces.len() * 3);
    for face in &stl.faces {
        for &index in &face.vertices {
            indices.push(u32::try_from(index).context("STL vertex index exceeds u32")?);
        }
    }

    Ok(MeshBuffers::indexed(positions, indices))
}

/// Write buffers as a binary STL file
pub fn write_stl(buffers: &MeshBuffers, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create STL file: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    write_stl_to(buffers, &mut writer)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write STL file: {:?}", path))
}

/// Write buffers as binary STL to any writer
pub fn write_stl_to<W: Write>(buffers: &MeshBuffers, writer: &mut W) -> Result<()> {
    let positions = &buffers.positions;
    if positions.len() % 3 != 0 {
        bail!("Vertex buffer length {} is not a multiple of 3", positions.len());
    }
    let point = |index: usize| -> Result<Point3<f64>> {
        match positions.get(index * 3..index * 3 + 3) {
            Some(p) => Ok(Point3::new(p[0], p[1], p[2])),
            None => bail!("Vertex index {} out of range", index),
        }
    };

    let corners: Vec<usize> = match &buffers.indices {
        Some(indices) => indices.iter().map(|&i| i as usize).collect(),
        None => (0..buffers.vertex_count()).collect(),
    };

    let mut triangles = Vec::with_capacity(corners.len() / 3);
    for corner in corners.chunks_exact(3) {
        let [a, b, c] = [point(corner[0])?, point(corner[1])?, point(corner[2])?];
        let normal = calculate_triangle_normal(&a, &b, &c).unwrap_or_else(Vector3::zeros);
        let vertex = |p: &Point3<f64>| StlVertex::new([p.x as f32, p.y as f32, p.z as f32]);
        triangles.push(StlTriangle {
            normal: Normal::new([normal.x as f32, normal.y as f32, normal.z as f32]),
            vertices: [vertex(&a), vertex(&b), vertex(&c)],
        });
    }

    stl_io::write_stl(writer, triangles.iter()).context("Failed to encode STL")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Mesh, Part};
    use std::io::Cursor;

    #[test]
    fn test_in_memory_round_trip() {
        let buffers = Part::block(Vector3::new(10.0, 10.0, 10.0)).to_buffers();
        let mut bytes = Vec::new();
        write_stl_to(&buffers, &mut bytes).unwrap();

        let loaded = read_stl(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.triangle_count(), buffers.triangle_count());

        let expected = Mesh::ingest(&buffers).unwrap();
        let reloaded = Mesh::ingest(&loaded).unwrap();
        assert_eq!(expected.face_count(), reloaded.face_count());
        assert!(expected.bounds().approx_eq(reloaded.bounds(), 1e-4));
    }

    #[test]
    fn test_out_of_range_index_is_an_error() {
        let buffers = MeshBuffers::indexed(vec![0.0; 9], vec![0, 1, 5]);
        assert!(write_stl_to(&buffers, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let mut cursor = Cursor::new(b"solid nonsense\nthis is not stl".to_vec());
        assert!(read_stl(&mut cursor).is_err());
    }
}
