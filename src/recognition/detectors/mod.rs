// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Feature detectors
//!
//! Every detector sees every surface (or boundary); detectors never exclude
//! each other. Overlaps are settled later by the compound resolver.

mod boss;
mod counterbore;
mod edge;
mod hole;
mod pocket;
mod slot;
mod step;

pub use boss::BossDetector;
pub use counterbore::CounterboreDetector;
pub use edge::{ChamferDetector, FilletDetector};
pub use hole::HoleDetector;
pub use pocket::PocketDetector;
pub use slot::SlotDetector;
pub use step::{detect_height_bands, StepDetector};

use nalgebra::Vector3;
use tracing::debug;

use super::segment::{Segmentation, Surface, SurfaceKind};
use super::topology::{AdjacencyEdge, Crease, Topology};
use crate::error::DetectorSkip;
use crate::features::{FeatureDraft, FeatureKind};
use crate::geometry::{BoundingBox, Mesh};

/// `cos 15°`: normal z above which a planar surface faces up
pub const HORIZONTAL_MIN_Z: f64 = 0.966;

/// Normal z magnitude below which a planar surface is a wall
pub const WALL_MAX_Z: f64 = 0.2;

/// Axis z magnitude above which a cylinder stands upright
pub const UPRIGHT_AXIS_Z: f64 = 0.98;

/// Share of the part's largest extent within which a footprint reaches the outer boundary
pub const OPEN_BOUNDARY_REL: f64 = 1e-3;

/// Everything a detector may look at
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub mesh: &'a Mesh,
    pub segmentation: &'a Segmentation,
    pub topology: &'a Topology,
    pub min_feature_size: f64,
    pub part_bounds: &'a BoundingBox,
}

impl<'a> DetectionContext<'a> {
    pub fn new(
        mesh: &'a Mesh,
        segmentation: &'a Segmentation,
        topology: &'a Topology,
        min_feature_size: f64,
    ) -> Self {
        Self {
            mesh,
            segmentation,
            topology,
            min_feature_size,
            part_bounds: mesh.bounds(),
        }
    }

    /// Spindle direction for top access
    pub fn up(&self) -> Vector3<f64> {
        Vector3::z()
    }

    pub fn surface(&self, id: usize) -> &'a Surface {
        &self.segmentation.surfaces[id]
    }

    /// Planar and facing up
    pub fn is_horizontal_up(&self, surface: &Surface) -> bool {
        surface.is_planar() && surface.normal.dot(&self.up()) > HORIZONTAL_MIN_Z
    }

    /// Planar near-vertical, or an upright cylinder
    pub fn is_wall(&self, surface: &Surface) -> bool {
        match (surface.kind, &surface.cylinder) {
            (SurfaceKind::Planar, _) => surface.normal.dot(&self.up()).abs() < WALL_MAX_Z,
            (SurfaceKind::Cylindrical, Some(fit)) => fit.axis.dot(&self.up()).abs() > UPRIGHT_AXIS_Z,
            _ => false,
        }
    }

    /// Whether the plan footprint reaches the part's outer boundary
    pub fn is_open(&self, surface: &Surface) -> bool {
        let tolerance = self.part_bounds.max_extent() * OPEN_BOUNDARY_REL;
        surface.bounds.touches_plan_boundary(self.part_bounds, tolerance)
    }

    /// Length tolerance for height comparisons
    pub fn height_tolerance(&self) -> f64 {
        self.min_feature_size * 1e-3
    }

    /// Neighbours across a boundary with the given crease
    pub fn creased(
        &self,
        surface: &Surface,
        crease: Crease,
    ) -> impl Iterator<Item = (&'a Surface, &'a AdjacencyEdge)> + 'a {
        let segmentation = self.segmentation;
        super::topology::crease_neighbors(self.topology, surface, crease)
            .map(move |(id, edge)| (&segmentation.surfaces[id], edge))
    }
}

/// Detector run once per surface
pub trait SurfaceDetector {
    fn kind(&self) -> FeatureKind;

    /// `Ok(None)` when the surface does not qualify, `Err` for a degenerate candidate
    fn inspect(
        &self,
        surface: &Surface,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip>;
}

/// Detector run once per surface boundary
pub trait EdgeDetector {
    fn kind(&self) -> FeatureKind;

    fn inspect(
        &self,
        edge: &AdjacencyEdge,
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<FeatureDraft>, DetectorSkip>;
}

/// Runs every detector over the segmentation
pub struct FeatureClassifier {
    surface_detectors: Vec<Box<dyn SurfaceDetector + Send + Sync>>,
    edge_detectors: Vec<Box<dyn EdgeDetector + Send + Sync>>,
}

impl FeatureClassifier {
    pub fn new() -> Self {
        Self {
            surface_detectors: vec![
                Box::new(HoleDetector),
                Box::new(PocketDetector),
                Box::new(SlotDetector),
                Box::new(StepDetector),
                Box::new(BossDetector),
                Box::new(CounterboreDetector),
            ],
            edge_detectors: vec![Box::new(FilletDetector), Box::new(ChamferDetector)],
        }
    }

    /// Candidate drafts in detection order: surfaces, then height bands, then edges
    pub fn classify(&self, ctx: &DetectionContext<'_>) -> Vec<FeatureDraft> {
        let mut drafts = Vec::new();
        let mut skipped = 0usize;

        for surface in &ctx.segmentation.surfaces {
            for detector in &self.surface_detectors {
                match detector.inspect(surface, ctx) {
                    Ok(Some(draft)) => drafts.push(draft),
                    Ok(None) => {}
                    Err(skip) => {
                        skipped += 1;
                        debug!(
                            detector = detector.kind().as_str(),
                            surface = surface.id,
                            reason = skip.reason,
                            "candidate skipped"
                        );
                    }
                }
            }
        }

        drafts.extend(detect_height_bands(ctx));

        for edge in ctx.topology.edges() {
            for detector in &self.edge_detectors {
                match detector.inspect(edge, ctx) {
                    Ok(Some(draft)) => drafts.push(draft),
                    Ok(None) => {}
                    Err(skip) => {
                        skipped += 1;
                        debug!(
                            detector = detector.kind().as_str(),
                            sides = ?edge.sides,
                            reason = skip.reason,
                            "candidate skipped"
                        );
                    }
                }
            }
        }

        debug!(candidates = drafts.len(), skipped, "classification complete");
        drafts
    }
}

impl Default for FeatureClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::geometry::{Mesh, MeshAdjacency, MeshBuffers, Part};
    use crate::recognition::segment::{Segmentation, SurfaceSegmenter};
    use crate::recognition::topology::Topology;

    /// Mesh, segmentation and topology of a reference part
    pub struct Prepared {
        pub mesh: Mesh,
        pub segmentation: Segmentation,
        pub topology: Topology,
    }

    pub fn prepare(part: &Part) -> Prepared {
        prepare_buffers(&part.to_buffers())
    }

    pub fn prepare_buffers(buffers: &MeshBuffers) -> Prepared {
        let mesh = Mesh::ingest(buffers).unwrap();
        let adjacency = MeshAdjacency::build(&mesh);
        let segmentation = SurfaceSegmenter::new(0.9).segment(&mesh, &adjacency);
        let topology = Topology::build(&mesh, &adjacency, &segmentation, 1.0);
        Prepared {
            mesh,
            segmentation,
            topology,
        }
    }

    impl Prepared {
        pub fn context(&self) -> super::DetectionContext<'_> {
            super::DetectionContext::new(&self.mesh, &self.segmentation, &self.topology, 1.0)
        }
    }
}
