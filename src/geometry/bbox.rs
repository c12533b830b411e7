// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding box utilities

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut bbox = Self::empty();
        for point in points {
            bbox.expand_to_include(point);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);

        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    /// Smallest box holding both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut merged = *self;
        if !other.is_empty() {
            merged.expand_to_include(&other.min);
            merged.expand_to_include(&other.max);
        }
        merged
    }

    /// Copy of this box with its vertical range stretched to include `z`
    pub fn extended_to_z(&self, z: f64) -> BoundingBox {
        let mut out = *self;
        out.min.z = out.min.z.min(z);
        out.max.z = out.max.z.max(z);
        out
    }

    pub fn center(&self) -> Point3<f64> {
        Point3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }

    pub fn size(&self) -> Vector3<f64> {
        if self.is_empty() {
            return Vector3::zeros();
        }
        Vector3::new(
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }

    pub fn volume(&self) -> f64 {
        let size = self.size();
        size.x * size.y * size.z
    }

    pub fn diagonal(&self) -> f64 {
        self.size().norm()
    }

    pub fn max_extent(&self) -> f64 {
        self.size().max()
    }

    /// Plan-view (XY) extents as `(short, long)`
    pub fn plan_extents(&self) -> (f64, f64) {
        let size = self.size();
        if size.x <= size.y {
            (size.x, size.y)
        } else {
            (size.y, size.x)
        }
    }

    pub fn contains_point(&self, point: &Point3<f64>, tolerance: f64) -> bool {
        self.contains_point_xy(point, tolerance)
            && point.z >= self.min.z - tolerance
            && point.z <= self.max.z + tolerance
    }

    /// Whether `point` falls inside the plan-view footprint
    pub fn contains_point_xy(&self, point: &Point3<f64>, tolerance: f64) -> bool {
        point.x >= self.min.x - tolerance
            && point.x <= self.max.x + tolerance
            && point.y >= self.min.y - tolerance
            && point.y <= self.max.y + tolerance
    }

    /// Whether `inner`'s plan-view footprint nests inside this one
    pub fn contains_footprint(&self, inner: &BoundingBox, tolerance: f64) -> bool {
        inner.min.x >= self.min.x - tolerance
            && inner.max.x <= self.max.x + tolerance
            && inner.min.y >= self.min.y - tolerance
            && inner.max.y <= self.max.y + tolerance
    }

    /// Whether the vertical ranges touch or overlap
    pub fn overlaps_z(&self, other: &BoundingBox, tolerance: f64) -> bool {
        self.max.z >= other.min.z - tolerance && self.min.z <= other.max.z + tolerance
    }

    /// Whether the plan-view footprint reaches the footprint boundary of `outer`
    pub fn touches_plan_boundary(&self, outer: &BoundingBox, tolerance: f64) -> bool {
        self.min.x <= outer.min.x + tolerance
            || self.max.x >= outer.max.x - tolerance
            || self.min.y <= outer.min.y + tolerance
            || self.max.y >= outer.max.y - tolerance
    }

    /// Check if two bounding boxes are approximately equal within tolerance
    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f64) -> bool {
        (self.min.x - other.min.x).abs() < tolerance
            && (self.min.y - other.min.y).abs() < tolerance
            && (self.min.z - other.min.z).abs() < tolerance
            && (self.max.x - other.max.x).abs() < tolerance
            && (self.max.y - other.max.y).abs() < tolerance
            && (self.max.z - other.max.z).abs() < tolerance
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box() {
        let mut bbox = BoundingBox::empty();
        assert!(bbox.is_empty());
        bbox.expand_to_include(&Point3::new(1.0, 2.0, 3.0));
        bbox.expand_to_include(&Point3::new(-1.0, -2.0, -3.0));

        assert_eq!(bbox.min, Point3::new(-1.0, -2.0, -3.0));
        assert_eq!(bbox.max, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(bbox.center(), Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bbox.volume(), 48.0);
        assert_eq!(bbox.plan_extents(), (2.0, 4.0));
    }

    #[test]
    fn test_plan_containment() {
        let outer = BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 5.0));
        let inner = BoundingBox::new(Point3::new(2.0, 2.0, -4.0), Point3::new(4.0, 4.0, 0.0));

        assert!(outer.contains_footprint(&inner, 1e-9));
        assert!(outer.overlaps_z(&inner, 1e-9));
        assert!(!inner.touches_plan_boundary(&outer, 1e-9));
        assert!(outer.touches_plan_boundary(&outer, 1e-9));
        assert!(outer.contains_point_xy(&Point3::new(5.0, 5.0, 100.0), 0.0));
        assert!(!outer.contains_point(&Point3::new(5.0, 5.0, 100.0), 0.0));
    }

    #[test]
    fn test_union_and_extend() {
        let a = BoundingBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = BoundingBox::new(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0));
        let u = a.union(&b);
        assert!(u.approx_eq(
            &BoundingBox::new(Point3::origin(), Point3::new(3.0, 3.0, 3.0)),
            1e-12
        ));
        assert_eq!(a.union(&BoundingBox::empty()), a);
        assert_eq!(a.extended_to_z(-2.0).min.z, -2.0);
    }
}
