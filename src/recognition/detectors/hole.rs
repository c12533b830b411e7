// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Hole detection from inward-facing cylinders

use super::counterbore::is_counterbore_seat;
use super::{DetectionContext, SurfaceDetector};
use crate::error::DetectorSkip;
use crate::features::{Dimensions, FeatureDraft, FeatureKind};
use crate::recognition::segment::{CylinderFit, Surface};
use crate::utils::math::saturate_ratio;

/// `cos 37°`: smallest axis alignment with the spindle
pub const HOLE_MIN_AXIS_DOT: f64 = 0.8;

/// Largest plan aspect of a round opening
pub const HOLE_MAX_ASPECT: f64 = 1.3;

/// Largest drilled diameter in mm
pub const HOLE_MAX_DIAMETER: f64 = 50.0;

pub(crate) const HOLE_BASE_CONFIDENCE: f64 = 0.75;

/// Round, concave, roughly vertical cylinder
pub(crate) fn hole_like<'s>(surface: &'s Surface, ctx: &DetectionContext<'_>) -> Option<&'s CylinderFit> {
    let fit = surface.cylinder.as_ref()?;
    if !fit.inward || !fit.is_full_circle() || fit.axis.dot(&ctx.up()) < HOLE_MIN_AXIS_DOT {
        return None;
    }
    let (short, long) = surface.plan_extents();
    if short <= 0.0 || long / short >= HOLE_MAX_ASPECT {
        return None;
    }
    if !(ctx.min_feature_size..=HOLE_MAX_DIAMETER).contains(&short) {
        return None;
    }
    Some(fit)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HoleDetector;

impl SurfaceDetector for HoleDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Hole
    }

    fn inspect(
        &self,
        surface: &Surface,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip> {
        let Some(fit) = hole_like(surface, ctx) else {
            return Ok(None);
        };
        // The wide bore of a counterbore is reported through the counterbore.
        if is_counterbore_seat(surface, ctx) {
            return Ok(None);
        }

        // The rim must be an up-facing plane at the top of the bore.
        let top = surface.bounds.max.z - ctx.height_tolerance();
        let has_rim = ctx.topology.neighbors(surface.id).any(|(other, _)| {
            let other = ctx.surface(other);
            ctx.is_horizontal_up(other) && other.bounds.max.z >= top
        });
        if !has_rim {
            return Ok(None);
        }

        let diameter = fit.diameter();
        let depth = fit.span;
        let dimensions = Dimensions::new()
            .with("diameter", diameter)?
            .with("depth", depth)?;

        let ratio = depth / diameter;
        let mut confidence = HOLE_BASE_CONFIDENCE;
        if (0.5..=10.0).contains(&ratio) {
            confidence += 0.1;
        }
        confidence += 0.05 * saturate_ratio(surface.vertices.len() as f64, 32.0);
        if fit.axis.dot(&ctx.up()) > 0.999 {
            confidence += 0.05;
        }

        Ok(Some(
            FeatureDraft::new(FeatureKind::Hole, confidence.min(1.0), dimensions)
                .at(fit.origin, fit.axis)
                .with_depth(depth)
                .with_bounds(surface.bounds)
                .from_surfaces(vec![surface.id]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{prepare, prepare_buffers, Prepared};
    use super::*;
    use crate::geometry::{Circle, Part, PartBuilder, Rect};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn holes(prepared: &Prepared) -> Vec<FeatureDraft> {
        let ctx = prepared.context();
        prepared
            .segmentation
            .surfaces
            .iter()
            .filter_map(|s| HoleDetector.inspect(s, &ctx).unwrap())
            .collect()
    }

    #[test]
    fn test_through_bore() {
        let prepared = prepare(&Part::bored_block(Vector3::new(30.0, 30.0, 15.0), 6.0));
        let ctx = prepared.context();
        let drafts: Vec<FeatureDraft> = prepared
            .segmentation
            .surfaces
            .iter()
            .filter_map(|s| HoleDetector.inspect(s, &ctx).unwrap())
            .collect();

        assert_eq!(drafts.len(), 1);
        let hole = &drafts[0];
        assert_relative_eq!(hole.dimensions.get("diameter").unwrap(), 6.0, epsilon = 1e-6);
        assert_relative_eq!(hole.depth, 15.0, epsilon = 1e-6);
        assert_relative_eq!(hole.position.x, 15.0, epsilon = 1e-6);
        assert_relative_eq!(hole.position.z, 7.5, epsilon = 1e-6);
        assert!(hole.confidence >= 0.9);
    }

    #[test]
    fn test_boss_wall_is_not_a_hole() {
        let prepared = prepare(&Part::boss_plate(Vector3::new(40.0, 40.0, 10.0), 10.0, 8.0));
        let ctx = prepared.context();
        assert!(prepared
            .segmentation
            .surfaces
            .iter()
            .all(|s| HoleDetector.inspect(s, &ctx).unwrap().is_none()));
    }

    #[test]
    fn test_counterbore_reports_one_hole() {
        let prepared = prepare(&Part::counterbored_block(Vector3::new(30.0, 30.0, 20.0), 6.0, 12.0, 8.0));
        let drafts = holes(&prepared);

        assert_eq!(drafts.len(), 1);
        assert_relative_eq!(drafts[0].dimensions.get("diameter").unwrap(), 6.0, epsilon = 1e-6);
        assert_relative_eq!(drafts[0].depth, 12.0, epsilon = 1e-6);
    }

    #[test]
    fn test_blind_bore_from_below_has_no_rim() {
        // 30 × 30 × 15 block with a Ø6 bore rising 8 mm from the underside
        let outline = Rect::new(0.0, 0.0, 30.0, 30.0);
        let circle = Circle::new(15.0, 15.0, 3.0);
        let mut builder = PartBuilder::new(2.5);
        builder.horizontal_rect(15.0, outline, true);
        builder.horizontal_rect_with_circle(0.0, outline, circle, 32, false);
        builder.outline_walls(outline, 0.0, 15.0);
        builder.cylinder_wall(circle, 0.0, 8.0, 32, true);
        builder.horizontal_disk(8.0, circle, 32, false);

        let prepared = prepare_buffers(&builder.into_buffers());
        assert!(prepared.segmentation.surfaces.iter().any(|s| s
            .cylinder
            .as_ref()
            .is_some_and(|fit| fit.inward && (fit.diameter() - 6.0).abs() < 1e-6)));
        assert!(holes(&prepared).is_empty());
    }

    #[test]
    fn test_small_bore_below_feature_size() {
        let prepared = prepare(&Part::bored_block(Vector3::new(30.0, 30.0, 15.0), 6.0));
        let ctx = super::super::DetectionContext {
            min_feature_size: 8.0,
            ..prepared.context()
        };
        assert!(prepared
            .segmentation
            .surfaces
            .iter()
            .all(|s| HoleDetector.inspect(s, &ctx).unwrap().is_none()));
    }
}
