// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Plausibility filtering and ranking

use tracing::debug;

use crate::features::{Feature, FeatureKind};

/// Largest hole diameter as a share of the part's largest extent
pub const MAX_HOLE_EXTENT_RATIO: f64 = 0.8;

/// Drops implausible candidates before compound resolution
#[derive(Debug, Clone, Copy)]
pub struct FeatureValidator {
    min_feature_size: f64,
    part_extent: f64,
}

impl FeatureValidator {
    pub fn new(min_feature_size: f64, part_extent: f64) -> Self {
        Self {
            min_feature_size,
            part_extent,
        }
    }

    /// Reason a feature is implausible, if any
    pub fn rejection(&self, feature: &Feature) -> Option<&'static str> {
        let finite = feature.confidence.is_finite()
            && feature.position.coords.iter().all(|c| c.is_finite())
            && feature.normal.iter().all(|c| c.is_finite())
            && feature.dimensions.all_valid();
        if !finite {
            return Some("non-finite measures");
        }
        if feature.dimensions.is_empty() || feature.max_dimension() < self.min_feature_size {
            return Some("below minimum feature size");
        }
        if feature.kind == FeatureKind::Hole
            && feature.dimension("diameter") > MAX_HOLE_EXTENT_RATIO * self.part_extent
        {
            return Some("hole wider than the part");
        }
        None
    }

    pub fn check_plausibility(&self, features: Vec<Feature>) -> Vec<Feature> {
        features
            .into_iter()
            .filter(|feature| match self.rejection(feature) {
                Some(reason) => {
                    debug!(feature = %feature.id, kind = feature.kind.as_str(), reason, "feature rejected");
                    false
                }
                None => true,
            })
            .collect()
    }
}

/// Keep features at or above `threshold`, most confident first, ties by id
pub fn rank(features: Vec<Feature>, threshold: f64) -> Vec<Feature> {
    let mut ranked: Vec<Feature> = features
        .into_iter()
        .filter(|f| f.confidence >= threshold)
        .collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then(a.id.cmp(&b.id)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Dimensions, FeatureDraft, FeatureId};

    fn hole(id: u32, diameter: f64, confidence: f64) -> Feature {
        let dims = Dimensions::new()
            .with("diameter", diameter)
            .and_then(|d| d.with("depth", 10.0))
            .unwrap();
        Feature::from_draft(FeatureId(id), FeatureDraft::new(FeatureKind::Hole, confidence, dims))
    }

    #[test]
    fn test_oversized_hole_rejected() {
        let validator = FeatureValidator::new(1.0, 30.0);
        assert_eq!(validator.rejection(&hole(1, 25.0, 0.9)), Some("hole wider than the part"));
        assert_eq!(validator.rejection(&hole(2, 6.0, 0.9)), None);
    }

    #[test]
    fn test_tiny_feature_rejected() {
        let dims = Dimensions::new().with("radius", 0.2).unwrap();
        let fillet = Feature::from_draft(FeatureId(1), FeatureDraft::new(FeatureKind::Fillet, 0.9, dims));
        let validator = FeatureValidator::new(1.0, 30.0);
        assert!(validator.check_plausibility(vec![fillet]).is_empty());
    }

    #[test]
    fn test_rank_orders_and_filters() {
        let features = vec![hole(1, 5.0, 0.7), hole(2, 5.0, 0.9), hole(3, 5.0, 0.5), hole(4, 5.0, 0.9)];
        let ranked = rank(features, 0.6);
        let ids: Vec<u32> = ranked.iter().map(|f| f.id.0).collect();
        assert_eq!(ids, vec![2, 4, 1]);
    }

    #[test]
    fn test_rank_empty_is_ok() {
        assert!(rank(Vec::new(), 0.5).is_empty());
    }
}
