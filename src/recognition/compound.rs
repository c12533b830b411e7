// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compound feature resolution
//!
//! Duplicate candidates of one kind collapse to the most confident one, and a
//! step built from a recess's own floor or walls gives way to that recess.
//! Parents then absorb the children their kind may contain, innermost parents
//! first.

use ahash::AHashSet;
use tracing::debug;

use crate::features::{ChildFeature, CompoundInfo, Feature, FeatureKind};
use crate::geometry::{BoundingBox, SpatialGrid};

/// Confidence added to a compound over its weakest member
pub const COMPOUND_BONUS: f64 = 0.05;

/// Merges duplicate and nested candidates
#[derive(Debug, Clone, Copy)]
pub struct CompoundResolver {
    tolerance: f64,
    nesting: bool,
}

impl CompoundResolver {
    /// `nesting` enables parent/child absorption; overlaps are always merged
    pub fn new(min_feature_size: f64, nesting: bool) -> Self {
        Self {
            tolerance: 0.1 * min_feature_size,
            nesting,
        }
    }

    pub fn resolve(&self, features: Vec<Feature>) -> Vec<Feature> {
        let before = features.len();
        let features = suppress_recess_steps(self.suppress_duplicates(features));
        let deduplicated = before - features.len();

        let resolved = if self.nesting {
            self.absorb_nested(features)
        } else {
            features
        };

        debug!(
            candidates = before,
            deduplicated,
            resolved = resolved.len(),
            "compound resolution complete"
        );
        resolved
    }

    /// Same-kind candidates whose positions lie in each other's box keep only the best
    fn suppress_duplicates(&self, features: Vec<Feature>) -> Vec<Feature> {
        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by(|&a, &b| {
            features[b]
                .confidence
                .total_cmp(&features[a].confidence)
                .then(features[a].id.cmp(&features[b].id))
        });

        let mut kept: Vec<usize> = Vec::with_capacity(features.len());
        for index in order {
            let candidate = &features[index];
            let duplicate = kept.iter().any(|&k| {
                let other = &features[k];
                other.kind == candidate.kind
                    && other.bounds.contains_point(&candidate.position, self.tolerance)
                    && candidate.bounds.contains_point(&other.position, self.tolerance)
            });
            if !duplicate {
                kept.push(index);
            }
        }
        kept.sort_unstable();

        let mut slots: Vec<Option<Feature>> = features.into_iter().map(Some).collect();
        kept.into_iter().filter_map(|i| slots[i].take()).collect()
    }

    fn contains(&self, parent: &Feature, child: &Feature) -> bool {
        parent.bounds.contains_point_xy(&child.position, self.tolerance)
            && parent.bounds.overlaps_z(&child.bounds, self.tolerance)
    }

    fn absorb_nested(&self, mut features: Vec<Feature>) -> Vec<Feature> {
        if features.len() < 2 {
            return features;
        }

        let mut extent = BoundingBox::empty();
        let mut reach: f64 = 0.0;
        for feature in &features {
            extent.expand_to_include(&feature.position);
            extent = extent.union(&feature.bounds);
            reach = reach.max(feature.bounds.max_extent());
        }
        let mut grid = SpatialGrid::for_bounds(&extent);
        for (index, feature) in features.iter().enumerate() {
            grid.insert(feature.position, index);
        }

        let mut parents: Vec<usize> = (0..features.len()).collect();
        parents.sort_by(|&a, &b| {
            features[a]
                .bounds
                .volume()
                .total_cmp(&features[b].bounds.volume())
                .then(features[a].id.cmp(&features[b].id))
        });

        let mut absorbed = vec![false; features.len()];
        for parent_index in parents {
            if absorbed[parent_index] {
                continue;
            }
            let parent = &features[parent_index];
            let radius = parent.bounds.diagonal() + reach;

            let mut children = Vec::new();
            for (child_index, _) in grid.query_radius(&parent.bounds.center(), radius) {
                if child_index == parent_index || absorbed[child_index] {
                    continue;
                }
                let child = &features[child_index];
                let Some(kind) = parent.kind.absorbs(child.kind) else {
                    continue;
                };
                if self.contains(parent, child) {
                    children.push((child_index, kind));
                }
            }
            if children.is_empty() {
                continue;
            }

            let weakest = children
                .iter()
                .map(|&(i, _)| features[i].confidence)
                .fold(parent.confidence, f64::min);
            let mut records: Vec<ChildFeature> = children
                .iter()
                .map(|&(i, kind)| ChildFeature {
                    id: features[i].id,
                    kind,
                    dimensions: features[i].dimensions.clone(),
                })
                .collect();
            records.sort_by_key(|c| c.id);

            debug!(
                parent = %parent.id,
                kind = parent.kind.as_str(),
                children = records.len(),
                "compound feature merged"
            );

            for &(i, _) in &children {
                absorbed[i] = true;
            }
            let parent = &mut features[parent_index];
            parent.confidence = (weakest + COMPOUND_BONUS).min(1.0);
            parent
                .compound
                .get_or_insert_with(CompoundInfo::default)
                .children
                .extend(records);
        }

        features
            .into_iter()
            .zip(absorbed)
            .filter_map(|(feature, gone)| (!gone).then_some(feature))
            .collect()
    }
}

/// Drop steps sharing a surface with a slot or pocket
///
/// The walls of an open slot pass the riser rule and its floor forms a height
/// band of its own; both restate the slot.
fn suppress_recess_steps(features: Vec<Feature>) -> Vec<Feature> {
    let recessed: AHashSet<usize> = features
        .iter()
        .filter(|f| matches!(f.kind, FeatureKind::Slot | FeatureKind::Pocket))
        .flat_map(|f| f.surfaces.iter().copied())
        .collect();
    if recessed.is_empty() {
        return features;
    }

    features
        .into_iter()
        .filter(|feature| {
            let overlaps = feature.kind == FeatureKind::Step
                && feature.surfaces.iter().any(|s| recessed.contains(s));
            if overlaps {
                debug!(step = %feature.id, "step overlaps a recess, dropped");
            }
            !overlaps
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Dimensions, FeatureDraft, FeatureId};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn feature(id: u32, kind: FeatureKind, confidence: f64, min: [f64; 3], max: [f64; 3]) -> Feature {
        let bounds = BoundingBox::new(Point3::from(min), Point3::from(max));
        let size = bounds.size();
        let dims = Dimensions::new()
            .with("width", size.x.max(0.1))
            .and_then(|d| d.with("diameter", size.x.max(0.1)))
            .unwrap();
        Feature::from_draft(
            FeatureId(id),
            FeatureDraft::new(kind, confidence, dims)
                .at(bounds.center(), Vector3::z())
                .with_bounds(bounds),
        )
    }

    #[test]
    fn test_hole_in_pocket_merges() {
        let pocket = feature(1, FeatureKind::Pocket, 0.9, [20.0, 10.0, 10.0], [40.0, 40.0, 20.0]);
        let hole = feature(2, FeatureKind::Hole, 0.95, [27.0, 22.0, 0.0], [33.0, 28.0, 10.0]);
        let resolved = CompoundResolver::new(1.0, true).resolve(vec![pocket, hole]);

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].kind, FeatureKind::Pocket);
        assert_eq!(resolved[0].hole_count(), 1);
        assert_relative_eq!(resolved[0].confidence, 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_boss_in_pocket_becomes_island() {
        let pocket = feature(1, FeatureKind::Pocket, 0.8, [0.0, 0.0, 5.0], [40.0, 40.0, 15.0]);
        let boss = feature(2, FeatureKind::Boss, 0.7, [15.0, 15.0, 5.0], [25.0, 25.0, 12.0]);
        let resolved = CompoundResolver::new(1.0, true).resolve(vec![pocket, boss]);

        assert_eq!(resolved.len(), 1);
        let compound = resolved[0].compound.as_ref().unwrap();
        assert_eq!(compound.count(FeatureKind::Island), 1);
        assert_relative_eq!(resolved[0].confidence, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_innermost_parent_resolves_first() {
        let pocket = feature(1, FeatureKind::Pocket, 0.9, [0.0, 0.0, 10.0], [50.0, 50.0, 20.0]);
        let counterbore = feature(2, FeatureKind::Counterbore, 0.8, [19.0, 19.0, 0.0], [31.0, 31.0, 10.0]);
        let hole = feature(3, FeatureKind::Hole, 0.95, [22.0, 22.0, 0.0], [28.0, 28.0, 6.0]);
        let resolved = CompoundResolver::new(1.0, true).resolve(vec![pocket, counterbore, hole]);

        assert_eq!(resolved.len(), 1);
        let children = &resolved[0].compound.as_ref().unwrap().children;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].kind, FeatureKind::Counterbore);
    }

    #[test]
    fn test_distant_hole_stays_separate() {
        let pocket = feature(1, FeatureKind::Pocket, 0.9, [0.0, 0.0, 10.0], [10.0, 10.0, 20.0]);
        let hole = feature(2, FeatureKind::Hole, 0.9, [30.0, 30.0, 0.0], [36.0, 36.0, 20.0]);
        let resolved = CompoundResolver::new(1.0, true).resolve(vec![pocket, hole]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_nesting_can_be_disabled() {
        let pocket = feature(1, FeatureKind::Pocket, 0.9, [20.0, 10.0, 10.0], [40.0, 40.0, 20.0]);
        let hole = feature(2, FeatureKind::Hole, 0.95, [27.0, 22.0, 0.0], [33.0, 28.0, 10.0]);
        let resolved = CompoundResolver::new(1.0, false).resolve(vec![pocket, hole]);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|f| f.compound.is_none()));
    }

    fn on_surfaces(mut feature: Feature, surfaces: &[usize]) -> Feature {
        feature.surfaces = surfaces.to_vec();
        feature
    }

    #[test]
    fn test_step_inside_open_slot_dropped() {
        let slot = on_surfaces(
            feature(1, FeatureKind::Slot, 0.95, [17.5, 0.0, 10.0], [22.5, 50.0, 15.0]),
            &[4, 7, 8],
        );
        let riser = on_surfaces(
            feature(2, FeatureKind::Step, 0.76, [17.5, 0.0, 10.0], [22.5, 50.0, 15.0]),
            &[7, 4],
        );
        let band = on_surfaces(
            feature(3, FeatureKind::Step, 0.75, [17.5, 0.0, 10.0], [22.5, 50.0, 15.0]),
            &[4, 0, 1],
        );

        for nesting in [true, false] {
            let resolved = CompoundResolver::new(1.0, nesting)
                .resolve(vec![slot.clone(), riser.clone(), band.clone()]);
            assert_eq!(resolved.len(), 1);
            assert_eq!(resolved[0].kind, FeatureKind::Slot);
        }
    }

    #[test]
    fn test_step_apart_from_pocket_kept() {
        let pocket = on_surfaces(
            feature(1, FeatureKind::Pocket, 0.9, [20.0, 10.0, 10.0], [40.0, 40.0, 20.0]),
            &[3, 5, 6, 7, 8],
        );
        let step = on_surfaces(
            feature(2, FeatureKind::Step, 0.8, [40.0, 0.0, 10.0], [60.0, 50.0, 20.0]),
            &[1, 2],
        );
        let resolved = CompoundResolver::new(1.0, true).resolve(vec![pocket, step]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_duplicates_keep_most_confident() {
        let riser = feature(1, FeatureKind::Step, 0.75, [20.0, 0.0, 10.0], [40.0, 20.0, 20.0]);
        let band = feature(2, FeatureKind::Step, 0.8, [20.0, 0.0, 10.0], [40.0, 20.0, 20.0]);
        let resolved = CompoundResolver::new(1.0, true).resolve(vec![riser, band]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, FeatureId(2));
    }
}
