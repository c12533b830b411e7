// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Step detection
//!
//! Two rules: a vertical riser between a lower open landing and a higher
//! up-facing surface, and a part-level scan of open up-facing surfaces
//! grouped into height bands.

use nalgebra::Vector3;
use tracing::debug;

use super::{DetectionContext, SurfaceDetector};
use crate::error::DetectorSkip;
use crate::features::{Dimensions, FeatureDraft, FeatureKind};
use crate::geometry::BoundingBox;
use crate::recognition::segment::Surface;
use crate::recognition::topology::Crease;
use crate::utils::math::saturate_ratio;

/// Height in mm within which up-facing surfaces share a band
pub const BAND_HEIGHT: f64 = 1.0;

/// Smallest height difference in mm between bands that counts as a step
pub const MIN_BAND_TRANSITION: f64 = 1.0;

fn step_confidence(height: f64, landing_area: f64) -> f64 {
    0.7 + 0.05 * saturate_ratio(height, 10.0) + 0.05 * saturate_ratio(landing_area, 400.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StepDetector;

impl SurfaceDetector for StepDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Step
    }

    fn inspect(
        &self,
        surface: &Surface,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip> {
        if !surface.is_planar() || !ctx.is_wall(surface) || !ctx.is_open(surface) {
            return Ok(None);
        }

        let size = surface.bounds.size();
        let height = size.z;
        let width = size.x.hypot(size.y);
        if height < 2.0 * ctx.min_feature_size || width < ctx.min_feature_size {
            return Ok(None);
        }

        let tolerance = ctx.height_tolerance();
        let base = surface.bounds.min.z + tolerance;
        let Some(landing) = ctx
            .creased(surface, Crease::Valley)
            .map(|(other, _)| other)
            .find(|other| {
                ctx.is_horizontal_up(other) && ctx.is_open(other) && other.centroid.z <= base
            })
        else {
            return Ok(None);
        };

        let top = surface.bounds.max.z - tolerance;
        let has_upper = ctx
            .creased(surface, Crease::Ridge)
            .any(|(other, _)| ctx.is_horizontal_up(other) && other.centroid.z >= top);
        if !has_upper {
            return Ok(None);
        }

        let dimensions = Dimensions::new()
            .with("height", height)?
            .with("width", width)?;

        Ok(Some(
            FeatureDraft::new(
                FeatureKind::Step,
                step_confidence(height, landing.area),
                dimensions,
            )
            .at(surface.centroid, landing.normal)
            .with_depth(height)
            .with_bounds(landing.bounds.union(&surface.bounds))
            .with_side_access(true)
            .from_surfaces(vec![surface.id, landing.id]),
        ))
    }
}

/// Open up-facing surfaces sharing one height band
#[derive(Debug, Clone)]
struct HeightBand {
    z: f64,
    area: f64,
    bounds: BoundingBox,
    surfaces: Vec<usize>,
}

/// Steps between consecutive height bands of open up-facing surfaces
pub fn detect_height_bands(ctx: &DetectionContext<'_>) -> Vec<FeatureDraft> {
    let mut open: Vec<&Surface> = ctx
        .segmentation
        .surfaces
        .iter()
        .filter(|s| ctx.is_horizontal_up(s) && ctx.is_open(s))
        .collect();
    open.sort_by(|a, b| a.centroid.z.total_cmp(&b.centroid.z).then(a.id.cmp(&b.id)));

    let mut bands: Vec<HeightBand> = Vec::new();
    for surface in open {
        match bands.last_mut() {
            Some(band) if surface.centroid.z - band.z < BAND_HEIGHT => {
                let area = band.area + surface.area;
                band.z = (band.z * band.area + surface.centroid.z * surface.area) / area;
                band.area = area;
                band.bounds = band.bounds.union(&surface.bounds);
                band.surfaces.push(surface.id);
            }
            _ => bands.push(HeightBand {
                z: surface.centroid.z,
                area: surface.area,
                bounds: surface.bounds,
                surfaces: vec![surface.id],
            }),
        }
    }

    let mut drafts = Vec::new();
    for pair in bands.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        let height = upper.z - lower.z;
        if height < MIN_BAND_TRANSITION {
            continue;
        }
        let (_, long) = lower.bounds.plan_extents();
        let dimensions = match Dimensions::new()
            .with("height", height)
            .and_then(|d| d.with("width", long))
        {
            Ok(dimensions) => dimensions,
            Err(skip) => {
                debug!(lower = lower.z, upper = upper.z, reason = skip.reason, "band step skipped");
                continue;
            }
        };

        let bounds = lower.bounds.extended_to_z(upper.z);
        let mut surfaces = lower.surfaces.clone();
        surfaces.extend(&upper.surfaces);
        drafts.push(
            FeatureDraft::new(FeatureKind::Step, step_confidence(height, lower.area), dimensions)
                .at(bounds.center(), Vector3::z())
                .with_depth(height)
                .with_bounds(bounds)
                .with_side_access(true)
                .from_surfaces(surfaces),
        );
    }
    drafts
}
