// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Slot detection from elongated recessed floors

use nalgebra::Point3;

use super::pocket::{recess_depth, rising_walls, SLOT_MIN_ASPECT};
use super::{DetectionContext, SurfaceDetector};
use crate::error::DetectorSkip;
use crate::features::{Dimensions, FeatureDraft, FeatureKind};
use crate::recognition::segment::Surface;
use crate::utils::math::saturate_ratio;

/// Normal dot below which two walls face each other
const FACING_DOT: f64 = -0.95;

/// Whether two planar walls face each other across open space
fn facing_pair(walls: &[&Surface]) -> bool {
    walls.iter().enumerate().any(|(i, a)| {
        walls[i + 1..].iter().any(|b| {
            a.is_planar()
                && b.is_planar()
                && a.normal.dot(&b.normal) < FACING_DOT
                && (b.centroid - a.centroid).dot(&a.normal) > 0.0
        })
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SlotDetector;

impl SurfaceDetector for SlotDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Slot
    }

    fn inspect(
        &self,
        surface: &Surface,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip> {
        if !ctx.is_horizontal_up(surface) {
            return Ok(None);
        }
        let (width, length) = surface.plan_extents();
        if width < ctx.min_feature_size || length <= width * SLOT_MIN_ASPECT {
            return Ok(None);
        }

        let walls = rising_walls(surface, ctx);
        if walls.len() < 2 {
            return Ok(None);
        }
        let parallel = facing_pair(&walls);
        if ctx.is_open(surface) && !parallel {
            return Ok(None);
        }

        let depth = recess_depth(surface, &walls);
        let dimensions = Dimensions::new()
            .with("width", width)?
            .with("length", length)?
            .with("depth", depth)?;

        let aspect = length / width;
        let confidence = 0.7
            + 0.1 * saturate_ratio(aspect - SLOT_MIN_ASPECT, 5.0)
            + 0.05 * saturate_ratio(depth, 5.0)
            + if parallel { 0.1 } else { 0.0 };

        let floor_z = surface.centroid.z;
        let mut surfaces = vec![surface.id];
        surfaces.extend(walls.iter().map(|w| w.id));

        Ok(Some(
            FeatureDraft::new(FeatureKind::Slot, confidence, dimensions)
                .at(
                    Point3::new(surface.centroid.x, surface.centroid.y, floor_z + depth / 2.0),
                    surface.normal,
                )
                .with_depth(depth)
                .with_bounds(surface.bounds.extended_to_z(floor_z + depth))
                .with_side_access(ctx.is_open(surface))
                .from_surfaces(surfaces),
        ))
    }
}
