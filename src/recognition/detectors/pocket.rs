// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pocket detection from enclosed floors ringed by rising walls

use nalgebra::Point3;

use super::{DetectionContext, SurfaceDetector};
use crate::error::DetectorSkip;
use crate::features::{Dimensions, FeatureDraft, FeatureKind};
use crate::recognition::segment::Surface;
use crate::recognition::topology::Crease;
use crate::utils::math::saturate_ratio;

/// Plan aspect above which a recess is a slot
pub const SLOT_MIN_ASPECT: f64 = 2.5;

/// Walls rising above a floor across a valley crease
pub(crate) fn rising_walls<'a>(
    floor: &Surface,
    ctx: &DetectionContext<'a>,
) -> Vec<&'a Surface> {
    let floor_z = floor.centroid.z + ctx.height_tolerance();
    ctx.creased(floor, Crease::Valley)
        .map(|(wall, _)| wall)
        .filter(|wall| ctx.is_wall(wall) && wall.bounds.max.z > floor_z)
        .collect()
}

/// Depth from the floor to the lowest wall top
pub(crate) fn recess_depth(floor: &Surface, walls: &[&Surface]) -> f64 {
    walls
        .iter()
        .map(|wall| wall.bounds.max.z)
        .fold(f64::INFINITY, f64::min)
        - floor.centroid.z
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PocketDetector;

impl SurfaceDetector for PocketDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Pocket
    }

    fn inspect(
        &self,
        surface: &Surface,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip> {
        if !ctx.is_horizontal_up(surface) || ctx.is_open(surface) {
            return Ok(None);
        }
        let (width, length) = surface.plan_extents();
        if width < ctx.min_feature_size || length > width * SLOT_MIN_ASPECT {
            return Ok(None);
        }

        let walls = rising_walls(surface, ctx);
        if walls.len() < 3 {
            return Ok(None);
        }

        let depth = recess_depth(surface, &walls);
        let dimensions = Dimensions::new()
            .with("width", width)?
            .with("length", length)?
            .with("depth", depth)?;

        let planar_walls = walls.iter().filter(|w| w.is_planar()).count();
        let confidence = 0.65
            + 0.1 * saturate_ratio(surface.area, 400.0)
            + 0.1 * saturate_ratio(depth, 10.0)
            + if planar_walls >= 4 { 0.05 } else { 0.0 };

        let floor_z = surface.centroid.z;
        let mut surfaces = vec![surface.id];
        surfaces.extend(walls.iter().map(|w| w.id));

        Ok(Some(
            FeatureDraft::new(FeatureKind::Pocket, confidence, dimensions)
                .at(
                    Point3::new(surface.centroid.x, surface.centroid.y, floor_z + depth / 2.0),
                    surface.normal,
                )
                .with_depth(depth)
                .with_bounds(surface.bounds.extended_to_z(floor_z + depth))
                .from_surfaces(surfaces),
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

    fn pockets(part: &Part) -> Vec<FeatureDraft> {
        let prepared = prepare(part);
        let ctx = prepared.context();
        prepared
            .segmentation
            .surfaces
            .iter()
            .filter_map(|s| PocketDetector.inspect(s, &ctx).unwrap())
            .collect()
    }

    #[test]
    fn test_rectangular_recess() {
        let drafts = pockets(&Part::pocketed_block(
            Vector3::new(60.0, 50.0, 20.0),
            Vector3::new(20.0, 30.0, 10.0),
        ));
        assert_eq!(drafts.len(), 1);
        let pocket = &drafts[0];
        assert_relative_eq!(pocket.dimensions.get("width").unwrap(), 20.0, epsilon = 1e-6);
        assert_relative_eq!(pocket.dimensions.get("length").unwrap(), 30.0, epsilon = 1e-6);
        assert_relative_eq!(pocket.depth, 10.0, epsilon = 1e-6);
        assert_relative_eq!(pocket.confidence, 0.9, epsilon = 1e-9);
        assert_eq!(pocket.surfaces.len(), 5);
    }

    #[test]
    fn test_long_recess_is_left_to_slot() {
        let drafts = pockets(&Part::slotted_block(
            Vector3::new(40.0, 50.0, 15.0),
            Vector3::new(6.0, 30.0, 5.0),
        ));
        assert!(drafts.is_empty());
    }

    #[test]
    fn test_rib_base_is_open() {
        let drafts = pockets(&Part::rib_plate(
            Vector3::new(40.0, 40.0, 5.0),
            Vector3::new(4.0, 30.0, 6.0),
        ));
        assert!(drafts.is_empty());
    }
}
