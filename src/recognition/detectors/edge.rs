// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Fillet and chamfer detection from surface boundaries

use nalgebra::Vector3;
use std::f64::consts::PI;

use super::{DetectionContext, EdgeDetector};
use crate::error::DetectorSkip;
use crate::features::{Dimensions, FeatureDraft, FeatureKind};
use crate::recognition::segment::{Surface, SurfaceKind};
use crate::recognition::topology::{AdjacencyEdge, EdgeKind};

/// Sharpness below which a boundary is a rounded blend
pub const FILLET_MAX_SHARPNESS: f64 = 0.5;

/// Sharpness above which a boundary is a bevel
pub const CHAMFER_MIN_SHARPNESS: f64 = 0.8;

/// Scale from the bevel chord to the chamfer width
pub const CHAMFER_WIDTH_SCALE: f64 = 0.05;

const FILLET_CONFIDENCE: f64 = 0.65;
const CHAMFER_CONFIDENCE: f64 = 0.75;

/// Blend-like side: curved, but not a closed bore or boss
fn is_blend(surface: &Surface) -> bool {
    match (surface.kind, &surface.cylinder) {
        (SurfaceKind::Cylindrical, Some(fit)) => !fit.is_full_circle(),
        (SurfaceKind::Cylindrical, None) | (SurfaceKind::Complex, _) => true,
        (SurfaceKind::Planar, _) => false,
    }
}

fn edge_normal(a: &Surface, b: &Surface) -> Vector3<f64> {
    (a.normal + b.normal).try_normalize(1e-9).unwrap_or_else(Vector3::z)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FilletDetector;

impl EdgeDetector for FilletDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Fillet
    }

    fn inspect(
        &self,
        edge: &AdjacencyEdge,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip> {
        if edge.sharpness >= FILLET_MAX_SHARPNESS - 1e-6 {
            return Ok(None);
        }
        let (a, b) = (ctx.surface(edge.sides.0), ctx.surface(edge.sides.1));
        let Some(blend) = [a, b].into_iter().find(|s| is_blend(s)) else {
            return Ok(None);
        };
        if edge.boundary_length <= 0.0 {
            return Err(DetectorSkip::new("fillet boundary has no length"));
        }

        let radius = match &blend.cylinder {
            Some(fit) => fit.radius,
            None => edge.boundary_length * edge.normal_angle / (2.0 * PI),
        };
        let dimensions = Dimensions::new()
            .with("radius", radius)?
            .with("length", edge.boundary_length)?;

        Ok(Some(
            FeatureDraft::new(FeatureKind::Fillet, FILLET_CONFIDENCE, dimensions)
                .at(edge.boundary_center, edge_normal(a, b))
                .with_bounds(blend.bounds.union(&edge.boundary_bounds))
                .with_side_access(true)
                .from_surfaces(vec![a.id, b.id]),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChamferDetector;

impl EdgeDetector for ChamferDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Chamfer
    }

    fn inspect(
        &self,
        edge: &AdjacencyEdge,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip> {
        if edge.kind == EdgeKind::Coplanar || edge.sharpness <= CHAMFER_MIN_SHARPNESS {
            return Ok(None);
        }
        let (a, b) = (ctx.surface(edge.sides.0), ctx.surface(edge.sides.1));

        let width =
            edge.boundary_length * (edge.dihedral_angle / 2.0).sin() * CHAMFER_WIDTH_SCALE;
        let dimensions = Dimensions::new()
            .with("width", width)?
            .with("length", edge.boundary_length)?;

        Ok(Some(
            FeatureDraft::new(FeatureKind::Chamfer, CHAMFER_CONFIDENCE, dimensions)
                .at(edge.boundary_center, edge_normal(a, b))
                .with_bounds(edge.boundary_bounds)
                .with_side_access(true)
                .from_surfaces(vec![a.id, b.id]),
        ))
    }
}
