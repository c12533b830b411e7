// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boss and rib detection from raised tops

use super::{DetectionContext, SurfaceDetector};
use crate::error::DetectorSkip;
use crate::features::{Dimensions, FeatureDraft, FeatureKind};
use crate::recognition::segment::Surface;
use crate::recognition::topology::Crease;
use crate::utils::math::saturate_ratio;

/// Smallest height in mm of a raised top over its surroundings
pub const MIN_BOSS_HEIGHT: f64 = 1.0;

/// Plan aspect above which a raised feature is a rib
pub const RIB_MIN_ASPECT: f64 = 3.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct BossDetector;

impl BossDetector {
    /// Whether `wall` stands on an up-facing base below `top_z`
    fn stands_on_base(wall: &Surface, top_z: f64, ctx: &DetectionContext<'_>) -> bool {
        ctx.creased(wall, Crease::Valley)
            .any(|(base, _)| ctx.is_horizontal_up(base) && base.centroid.z < top_z)
    }
}

impl SurfaceDetector for BossDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Boss
    }

    fn inspect(
        &self,
        surface: &Surface,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip> {
        if !ctx.is_horizontal_up(surface) {
            return Ok(None);
        }
        let top_z = surface.centroid.z;

        let mut walls = Vec::new();
        for (id, edge) in ctx.topology.neighbors(surface.id) {
            let wall = ctx.surface(id);
            if edge.crease != Crease::Ridge || !ctx.is_wall(wall) {
                return Ok(None);
            }
            walls.push(wall);
        }
        if walls.is_empty() || !walls.iter().all(|w| Self::stands_on_base(w, top_z, ctx)) {
            return Ok(None);
        }

        // Height over the up-facing surfaces around the top
        let radius = ctx.min_feature_size.max(2.0 * surface.bounds.diagonal());
        let (sum, count) = ctx
            .topology
            .find_neighboring_surfaces(surface.id, Some(radius))
            .into_iter()
            .map(|id| ctx.surface(id))
            .filter(|other| ctx.is_horizontal_up(other) && other.centroid.z < top_z)
            .fold((0.0, 0usize), |(sum, count), other| (sum + other.centroid.z, count + 1));
        if count == 0 {
            return Err(DetectorSkip::new("no base around raised top"));
        }
        let height = top_z - sum / count as f64;
        if height <= MIN_BOSS_HEIGHT {
            return Ok(None);
        }

        let (width, length) = surface.plan_extents();
        let kind = if width > 0.0 && length / width > RIB_MIN_ASPECT {
            FeatureKind::Rib
        } else {
            FeatureKind::Boss
        };

        let mut dimensions = Dimensions::new()
            .with("width", width)?
            .with("length", length)?
            .with("height", height)?;
        if let Some(fit) = walls.iter().find_map(|w| w.cylinder.as_ref()) {
            dimensions.insert("diameter", fit.diameter())?;
        }

        let confidence = 0.6
            + 0.1 * saturate_ratio(surface.area, 100.0)
            + 0.1 * saturate_ratio(height, 10.0);

        let base_z = top_z - height;
        let mut bounds = surface.bounds;
        for wall in &walls {
            bounds = bounds.union(&wall.bounds);
        }
        let mut surfaces = vec![surface.id];
        surfaces.extend(walls.iter().map(|w| w.id));

        let mut position = surface.centroid;
        position.z = (top_z + base_z) / 2.0;

        Ok(Some(
            FeatureDraft::new(kind, confidence, dimensions)
                .at(position, surface.normal)
                .with_depth(height)
                .with_bounds(bounds)
                .with_side_access(true)
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

    fn raised(part: &Part) -> Vec<FeatureDraft> {
        let prepared = prepare(part);
        let ctx = prepared.context();
        prepared
            .segmentation
            .surfaces
            .iter()
            .filter_map(|s| BossDetector.inspect(s, &ctx).unwrap())
            .collect()
    }

    #[test]
    fn test_round_boss() {
        let drafts = raised(&Part::boss_plate(Vector3::new(40.0, 40.0, 10.0), 10.0, 8.0));
        assert_eq!(drafts.len(), 1);
        let boss = &drafts[0];
        assert_eq!(boss.kind, FeatureKind::Boss);
        assert_relative_eq!(boss.dimensions.get("height").unwrap(), 8.0, epsilon = 1e-6);
        assert_relative_eq!(boss.dimensions.get("diameter").unwrap(), 10.0, epsilon = 1e-6);
        assert!(boss.confidence > 0.7);
    }

    #[test]
    fn test_long_rib() {
        let drafts = raised(&Part::rib_plate(Vector3::new(40.0, 40.0, 5.0), Vector3::new(4.0, 30.0, 6.0)));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, FeatureKind::Rib);
        assert_relative_eq!(drafts[0].dimensions.get("height").unwrap(), 6.0, epsilon = 1e-6);
        assert!(drafts[0].dimensions.get("diameter").is_none());
    }

    #[test]
    fn test_block_top_is_not_raised() {
        assert!(raised(&Part::block(Vector3::new(40.0, 30.0, 20.0))).is_empty());
    }
}
