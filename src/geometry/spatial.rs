// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Uniform spatial hash grid
//!
//! Entries are bucketed by quantized coordinates. A neighbourhood query visits
//! the 3×3×3 block of cells around a point; radius queries widen the ring of
//! visited cells. Results come back in ascending payload order so callers see
//! the same answer on every run.

use ahash::AHashMap;
use nalgebra::Point3;

use super::BoundingBox;

/// Integer cell coordinates.
pub type CellKey = (i64, i64, i64);

/// Uniform grid over points carrying a payload.
#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    origin: Point3<f64>,
    cell_size: f64,
    cells: AHashMap<CellKey, Vec<(Point3<f64>, T)>>,
    len: usize,
}

impl<T: Copy + Ord> SpatialGrid<T> {
    /// Grid resolution relative to the largest bounding-box extent.
    pub const CELLS_PER_EXTENT: f64 = 20.0;

    pub fn new(origin: Point3<f64>, cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            origin,
            cell_size,
            cells: AHashMap::new(),
            len: 0,
        }
    }

    /// Grid sized to 1/20 of the largest extent of `bounds`
    pub fn for_bounds(bounds: &BoundingBox) -> Self {
        let origin = if bounds.is_empty() {
            Point3::origin()
        } else {
            bounds.min
        };
        Self::new(origin, bounds.max_extent() / Self::CELLS_PER_EXTENT)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cell_of(&self, point: &Point3<f64>) -> CellKey {
        let local = (point - self.origin) / self.cell_size;
        (
            local.x.floor() as i64,
            local.y.floor() as i64,
            local.z.floor() as i64,
        )
    }

    pub fn insert(&mut self, point: Point3<f64>, value: T) {
        let key = self.cell_of(&point);
        self.cells.entry(key).or_default().push((point, value));
        self.len += 1;
    }

    /// Every entry registered in the 3×3×3 cells around `point`, in ascending order
    pub fn neighbors(&self, point: &Point3<f64>) -> Vec<T> {
        let mut found = Vec::new();
        self.visit_ring(point, 1, |_, value| found.push(value));
        found.sort_unstable();
        found
    }

    /// Entries within `radius` of `point`, paired with their distance
    pub fn query_radius(&self, point: &Point3<f64>, radius: f64) -> Vec<(T, f64)> {
        let ring = (radius / self.cell_size).ceil().max(1.0);
        let mut found = Vec::new();
        let mut collect = |position: &Point3<f64>, value: T| {
            let distance = (position - point).norm();
            if distance <= radius {
                found.push((value, distance));
            }
        };

        // A ring wider than the populated grid is cheaper as a full scan.
        let ring_cells = (2.0 * ring + 1.0).powi(3);
        if ring_cells > self.cells.len() as f64 {
            for entries in self.cells.values() {
                for (position, value) in entries {
                    collect(position, *value);
                }
            }
        } else {
            self.visit_ring(point, ring as i64, collect);
        }

        found.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        found
    }

    fn visit_ring(&self, point: &Point3<f64>, ring: i64, mut visit: impl FnMut(&Point3<f64>, T)) {
        let (cx, cy, cz) = self.cell_of(point);
        for dx in -ring..=ring {
            for dy in -ring..=ring {
                for dz in -ring..=ring {
                    if let Some(entries) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                        for (position, value) in entries {
                            visit(position, *value);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> SpatialGrid<usize> {
        let bounds = BoundingBox::new(Point3::origin(), Point3::new(20.0, 20.0, 20.0));
        let mut grid = SpatialGrid::for_bounds(&bounds);
        grid.insert(Point3::new(0.5, 0.5, 0.5), 0);
        grid.insert(Point3::new(1.5, 0.5, 0.5), 1);
        grid.insert(Point3::new(10.0, 10.0, 10.0), 2);
        grid.insert(Point3::new(19.5, 19.5, 19.5), 3);
        grid
    }

    #[test]
    fn test_cell_size_from_bounds() {
        let grid = sample_grid();
        assert_eq!(grid.cell_size(), 1.0);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.cell_of(&Point3::new(1.5, 0.2, 19.9)), (1, 0, 19));
    }

    #[test]
    fn test_neighbourhood_query() {
        let grid = sample_grid();
        assert_eq!(grid.neighbors(&Point3::new(0.9, 0.9, 0.9)), vec![0, 1]);
        assert!(grid.neighbors(&Point3::new(5.0, 5.0, 5.0)).is_empty());
        assert_eq!(grid.neighbors(&Point3::new(9.5, 10.5, 10.2)), vec![2]);
    }

    #[test]
    fn test_radius_query() {
        let grid = sample_grid();
        let hits = grid.query_radius(&Point3::new(0.5, 0.5, 0.5), 1.2);
        let ids: Vec<usize> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1]);

        let far = grid.query_radius(&Point3::new(0.0, 0.0, 0.0), 100.0);
        assert_eq!(far.len(), 4);
    }

    #[test]
    fn test_neighbours_sorted_for_welding() {
        let mut grid = SpatialGrid::new(Point3::origin(), 0.01);
        grid.insert(Point3::new(1.0, 1.0, 1.0), 7);
        grid.insert(Point3::new(1.0, 1.0, 1.000_000_1), 3);
        grid.insert(Point3::new(1.015, 1.0, 1.0), 5);

        assert_eq!(grid.neighbors(&Point3::new(1.0, 1.0, 1.0)), vec![3, 5, 7]);
        assert!(grid.neighbors(&Point3::new(2.0, 2.0, 2.0)).is_empty());
    }
}
