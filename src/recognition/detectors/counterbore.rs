// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Counterbore detection: a hole nested under a wider coaxial bore

use nalgebra::Point3;

use super::hole::hole_like;
use super::{DetectionContext, SurfaceDetector};
use crate::error::DetectorSkip;
use crate::features::{Dimensions, FeatureDraft, FeatureKind};
use crate::recognition::segment::{CylinderFit, Surface};

/// Axis dot product above which two cylinders are parallel
const PARALLEL_DOT: f64 = 0.99;

/// Axis offset, as a share of the inner radius, below which cylinders are coaxial
const COAXIAL_REL: f64 = 0.25;

const COUNTERBORE_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, Default)]
pub struct CounterboreDetector;

impl CounterboreDetector {
    fn nests(inner: (&Surface, &CylinderFit), outer: (&Surface, &CylinderFit), tolerance: f64) -> bool {
        let ((inner_surface, inner_fit), (outer_surface, outer_fit)) = (inner, outer);
        outer_fit.inward
            && outer_fit.is_full_circle()
            && outer_fit.radius > inner_fit.radius + tolerance
            && outer_fit.axis.dot(&inner_fit.axis).abs() > PARALLEL_DOT
            && outer_fit.distance_to_axis(&inner_fit.origin) < COAXIAL_REL * inner_fit.radius
            && outer_surface
                .bounds
                .contains_footprint(&inner_surface.bounds, tolerance)
            && outer_surface.centroid.z > inner_surface.centroid.z
    }

    /// Narrowest wider bore nested over the hole-like `inner`
    fn seat<'a>(
        inner: &Surface,
        inner_fit: &CylinderFit,
        ctx: &DetectionContext<'a>,
    ) -> Option<(&'a Surface, &'a CylinderFit)> {
        let tolerance = ctx.height_tolerance();
        let radius = 2.0 * inner.bounds.diagonal();
        ctx.topology
            .find_neighboring_surfaces(inner.id, Some(radius))
            .into_iter()
            .map(|id| ctx.surface(id))
            .filter_map(|s| s.cylinder.as_ref().map(|fit| (s, fit)))
            .filter(|&candidate| Self::nests((inner, inner_fit), candidate, tolerance))
            .min_by(|a, b| a.1.radius.total_cmp(&b.1.radius).then(a.0.id.cmp(&b.0.id)))
    }
}

/// Whether `surface` is the wide upper bore of a counterbore
pub(crate) fn is_counterbore_seat(surface: &Surface, ctx: &DetectionContext<'_>) -> bool {
    surface.cylinder.is_some()
        && ctx.segmentation.surfaces.iter().any(|inner| {
            inner.id != surface.id
                && hole_like(inner, ctx)
                    .and_then(|fit| CounterboreDetector::seat(inner, fit, ctx))
                    .is_some_and(|(outer, _)| outer.id == surface.id)
        })
}

impl SurfaceDetector for CounterboreDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Counterbore
    }

    fn inspect(
        &self,
        surface: &Surface,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip> {
        let Some(inner_fit) = hole_like(surface, ctx) else {
            return Ok(None);
        };

        let Some((outer_surface, outer_fit)) = Self::seat(surface, inner_fit, ctx) else {
            return Ok(None);
        };

        let depth = inner_fit.span + outer_fit.span;
        let dimensions = Dimensions::new()
            .with("diameter", inner_fit.diameter())?
            .with("counterbore_diameter", outer_fit.diameter())?
            .with("counterbore_depth", outer_fit.span)?
            .with("depth", depth)?;

        let bounds = surface.bounds.union(&outer_surface.bounds);
        let center = bounds.center();
        let position = Point3::new(inner_fit.origin.x, inner_fit.origin.y, center.z);

        Ok(Some(
            FeatureDraft::new(FeatureKind::Counterbore, COUNTERBORE_CONFIDENCE, dimensions)
                .at(position, outer_fit.axis)
                .with_depth(depth)
                .with_bounds(bounds)
                .from_surfaces(vec![surface.id, outer_surface.id]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::prepare;
    use super::*;
    use crate::geometry::Part;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_stepped_bore() {
        let prepared = prepare(&Part::counterbored_block(Vector3::new(30.0, 30.0, 20.0), 6.0, 12.0, 8.0));
        let ctx = prepared.context();
        let drafts: Vec<_> = prepared
            .segmentation
            .surfaces
            .iter()
            .filter_map(|s| CounterboreDetector.inspect(s, &ctx).unwrap())
            .collect();

        assert_eq!(drafts.len(), 1);
        let cb = &drafts[0];
        assert_relative_eq!(cb.dimensions.get("diameter").unwrap(), 6.0, epsilon = 1e-6);
        assert_relative_eq!(cb.dimensions.get("counterbore_diameter").unwrap(), 12.0, epsilon = 1e-6);
        assert_relative_eq!(cb.dimensions.get("counterbore_depth").unwrap(), 8.0, epsilon = 1e-6);
        assert_relative_eq!(cb.depth, 20.0, epsilon = 1e-6);
        assert_relative_eq!(cb.position.x, 15.0, epsilon = 1e-6);
    }

    #[test]
    fn test_only_the_wide_bore_is_a_seat() {
        let prepared = prepare(&Part::counterbored_block(Vector3::new(30.0, 30.0, 20.0), 6.0, 12.0, 8.0));
        let ctx = prepared.context();
        let seats: Vec<f64> = prepared
            .segmentation
            .surfaces
            .iter()
            .filter(|s| is_counterbore_seat(s, &ctx))
            .filter_map(|s| s.cylinder.as_ref().map(CylinderFit::diameter))
            .collect();

        assert_eq!(seats.len(), 1);
        assert_relative_eq!(seats[0], 12.0, epsilon = 1e-6);
    }

    #[test]
    fn test_plain_bore_has_no_counterbore() {
        let prepared = prepare(&Part::bored_block(Vector3::new(30.0, 30.0, 15.0), 6.0));
        let ctx = prepared.context();
        assert!(prepared
            .segmentation
            .surfaces
            .iter()
            .all(|s| CounterboreDetector.inspect(s, &ctx).unwrap().is_none()));
        assert!(!prepared
            .segmentation
            .surfaces
            .iter()
            .any(|s| is_counterbore_seat(s, &ctx)));
    }
}
