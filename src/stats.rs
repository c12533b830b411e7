// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Aggregate statistics over recognized features

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::features::{ChildFeature, Feature, FeatureKind};

/// Summary of one analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub total: usize,
    /// Feature count per kind, compound children included.
    pub counts: BTreeMap<FeatureKind, usize>,
    pub average_confidence: f64,
    /// Estimated material removed, in mm³.
    pub removed_volume: f64,
    /// Estimated machining time in minutes.
    pub estimated_machining_minutes: f64,
}

impl FeatureStatistics {
    pub fn compute(features: &[Feature]) -> Self {
        if features.is_empty() {
            return Self::default();
        }

        let mut counts: BTreeMap<FeatureKind, usize> = BTreeMap::new();
        for feature in features {
            *counts.entry(feature.kind).or_default() += 1;
            if let Some(compound) = &feature.compound {
                for child in &compound.children {
                    *counts.entry(child.kind).or_default() += 1;
                }
            }
        }

        let average_confidence =
            features.iter().map(|f| f.confidence).sum::<f64>() / features.len() as f64;
        let children = || {
            features
                .iter()
                .filter_map(|f| f.compound.as_ref())
                .flat_map(|c| c.children.iter())
        };
        let removed_volume = features.iter().map(Feature::removal_volume).sum::<f64>()
            + children().map(ChildFeature::removal_volume).sum::<f64>();
        let estimated_machining_minutes = features.iter().map(Feature::machining_minutes).sum::<f64>()
            + children().map(ChildFeature::machining_minutes).sum::<f64>();

        Self {
            total: features.len(),
            counts,
            average_confidence,
            removed_volume,
            estimated_machining_minutes,
        }
    }

    pub fn count(&self, kind: FeatureKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{CompoundInfo, Dimensions, FeatureDraft, FeatureId};
    use std::f64::consts::PI;
    use approx::assert_relative_eq;

    fn feature(id: u32, kind: FeatureKind, confidence: f64, dims: &[(&str, f64)]) -> Feature {
        let mut dimensions = Dimensions::new();
        for (name, value) in dims {
            dimensions.insert(name, *value).unwrap();
        }
        Feature::from_draft(FeatureId(id), FeatureDraft::new(kind, confidence, dimensions))
    }

    #[test]
    fn test_empty_statistics() {
        let stats = FeatureStatistics::compute(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_confidence, 0.0);
        assert_eq!(stats.estimated_machining_minutes, 0.0);
    }

    #[test]
    fn test_counts_include_children() {
        let mut pocket = feature(1, FeatureKind::Pocket, 0.9, &[("width", 20.0), ("length", 30.0), ("depth", 10.0)]);
        pocket.compound = Some(CompoundInfo {
            children: vec![ChildFeature {
                id: FeatureId(2),
                kind: FeatureKind::Hole,
                dimensions: Dimensions::new(),
            }],
        });
        let hole = feature(3, FeatureKind::Hole, 0.7, &[("diameter", 6.0), ("depth", 15.0)]);

        let stats = FeatureStatistics::compute(&[pocket, hole]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.count(FeatureKind::Pocket), 1);
        assert_eq!(stats.count(FeatureKind::Hole), 2);
        assert_relative_eq!(stats.average_confidence, 0.8, epsilon = 1e-12);
        assert!(stats.removed_volume > 6000.0);
    }

    #[test]
    fn test_absorbed_children_add_volume() {
        let mut hole_dims = Dimensions::new();
        hole_dims.insert("diameter", 6.0).unwrap();
        hole_dims.insert("depth", 10.0).unwrap();
        let dims = &[("width", 20.0), ("length", 30.0), ("depth", 10.0)];

        let mut pocket = feature(1, FeatureKind::Pocket, 0.9, dims);
        pocket.compound = Some(CompoundInfo {
            children: vec![ChildFeature {
                id: FeatureId(2),
                kind: FeatureKind::Hole,
                dimensions: hole_dims,
            }],
        });
        let merged = FeatureStatistics::compute(&[pocket]);
        let separate = FeatureStatistics::compute(&[
            feature(1, FeatureKind::Pocket, 0.9, dims),
            feature(2, FeatureKind::Hole, 0.9, &[("diameter", 6.0), ("depth", 10.0)]),
        ]);

        assert_relative_eq!(merged.removed_volume, 6000.0 + PI * 90.0, epsilon = 1e-9);
        assert_relative_eq!(merged.removed_volume, separate.removed_volume, epsilon = 1e-9);
        assert_relative_eq!(
            merged.estimated_machining_minutes,
            separate.estimated_machining_minutes,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_time_uses_removal_rate() {
        let pocket = feature(1, FeatureKind::Pocket, 0.9, &[("width", 20.0), ("length", 30.0), ("depth", 10.0)]);
        let stats = FeatureStatistics::compute(&[pocket]);
        let expected = 6000.0 / FeatureKind::Pocket.removal_rate() + FeatureKind::Pocket.setup_minutes();
        assert_relative_eq!(stats.estimated_machining_minutes, expected, epsilon = 1e-9);
    }
}
