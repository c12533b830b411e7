// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Math utilities

use nalgebra::{Point3, Vector3};

/// Calculate the normal of a triangle given three vertices
///
/// Returns `None` when the triangle has no area.
pub fn calculate_triangle_normal(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
) -> Option<Vector3<f64>> {
    let v1 = p1 - p0;
    let v2 = p2 - p0;
    v1.cross(&v2).try_normalize(f64::MIN_POSITIVE)
}

/// Area of a triangle given three vertices
pub fn triangle_area(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> f64 {
    (p1 - p0).cross(&(p2 - p0)).norm() * 0.5
}

/// Clamp a value between min and max
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Fraction of `value` along `[0, full]`, saturating at 1
pub fn saturate_ratio(value: f64, full: f64) -> f64 {
    if full <= 0.0 {
        return 0.0;
    }
    clamp(value / full, 0.0, 1.0)
}

/// Angle between two unit vectors in radians
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    clamp(a.dot(b), -1.0, 1.0).acos()
}

/// Convert degrees to radians
pub fn deg_to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}
