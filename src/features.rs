// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Machining feature model
//!
//! A [`Feature`] is built from a detector's [`FeatureDraft`]; tooling,
//! machining and cutting parameters are derived per [`FeatureKind`] through
//! exhaustive match tables so a new kind cannot be added without deciding
//! how it is machined.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

use crate::error::DetectorSkip;
use crate::geometry::BoundingBox;

/// Stable feature identifier, assigned in detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub u32);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{:04}", self.0)
    }
}

/// Feature kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Hole,
    Pocket,
    Slot,
    Step,
    Boss,
    Rib,
    Fillet,
    Chamfer,
    Counterbore,
    Countersink,
    Island,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 11] = [
        FeatureKind::Hole,
        FeatureKind::Pocket,
        FeatureKind::Slot,
        FeatureKind::Step,
        FeatureKind::Boss,
        FeatureKind::Rib,
        FeatureKind::Fillet,
        FeatureKind::Chamfer,
        FeatureKind::Counterbore,
        FeatureKind::Countersink,
        FeatureKind::Island,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Hole => "hole",
            FeatureKind::Pocket => "pocket",
            FeatureKind::Slot => "slot",
            FeatureKind::Step => "step",
            FeatureKind::Boss => "boss",
            FeatureKind::Rib => "rib",
            FeatureKind::Fillet => "fillet",
            FeatureKind::Chamfer => "chamfer",
            FeatureKind::Counterbore => "counterbore",
            FeatureKind::Countersink => "countersink",
            FeatureKind::Island => "island",
        }
    }

    /// Containment table: the kind a nested `child` takes when absorbed by `self`
    pub fn absorbs(&self, child: FeatureKind) -> Option<FeatureKind> {
        use FeatureKind::*;
        match (self, child) {
            (Pocket, Hole) => Some(Hole),
            (Pocket, Counterbore) => Some(Counterbore),
            (Pocket, Countersink) => Some(Countersink),
            (Pocket, Boss) => Some(Island),
            (Counterbore, Hole) => Some(Hole),
            (
                Hole | Pocket | Slot | Step | Boss | Rib | Fillet | Chamfer | Counterbore
                | Countersink | Island,
                _,
            ) => None,
        }
    }

    /// Volumetric material-removal rate in mm³/min
    pub fn removal_rate(&self) -> f64 {
        match self {
            FeatureKind::Hole => 900.0,
            FeatureKind::Pocket => 2500.0,
            FeatureKind::Slot => 1500.0,
            FeatureKind::Step => 4000.0,
            FeatureKind::Boss | FeatureKind::Rib | FeatureKind::Island => 3000.0,
            FeatureKind::Fillet => 300.0,
            FeatureKind::Chamfer => 400.0,
            FeatureKind::Counterbore => 700.0,
            FeatureKind::Countersink => 500.0,
        }
    }

    /// Fixed tool-change and approach time in minutes
    pub fn setup_minutes(&self) -> f64 {
        match self {
            FeatureKind::Hole | FeatureKind::Counterbore | FeatureKind::Countersink => 0.3,
            FeatureKind::Pocket | FeatureKind::Slot | FeatureKind::Step => 0.5,
            FeatureKind::Boss | FeatureKind::Rib | FeatureKind::Island => 0.4,
            FeatureKind::Fillet | FeatureKind::Chamfer => 0.2,
        }
    }

    /// Estimated volume in mm³ removed by a feature of this kind
    ///
    /// `envelope` is the feature's box volume, used for steps.
    pub fn removal_volume(&self, dimensions: &Dimensions, envelope: f64) -> f64 {
        let d = |name: &str| dimensions.get(name).unwrap_or(0.0);
        match self {
            FeatureKind::Hole => PI * (d("diameter") / 2.0).powi(2) * d("depth"),
            FeatureKind::Counterbore => {
                let bore = PI * (d("diameter") / 2.0).powi(2) * (d("depth") - d("counterbore_depth")).max(0.0);
                let counterbore = PI * (d("counterbore_diameter") / 2.0).powi(2) * d("counterbore_depth");
                bore + counterbore
            }
            FeatureKind::Countersink => PI * (d("diameter") / 2.0).powi(2) * d("depth") / 3.0,
            FeatureKind::Pocket | FeatureKind::Slot => d("width") * d("length") * d("depth"),
            FeatureKind::Step => envelope.max(0.0),
            // Material around a raised feature is faced down to its base; count
            // a one-width margin around the footprint.
            FeatureKind::Boss | FeatureKind::Rib | FeatureKind::Island => {
                let margin = d("width");
                (d("width") + 2.0 * margin) * (d("length") + 2.0 * margin) * d("height")
                    - d("width") * d("length") * d("height")
            }
            FeatureKind::Fillet => d("radius").powi(2) * (1.0 - PI / 4.0) * d("length"),
            FeatureKind::Chamfer => d("width").powi(2) / 2.0 * d("length"),
        }
    }

    /// Estimated machining time in minutes for `volume` mm³ of this kind
    pub fn machining_minutes(&self, volume: f64) -> f64 {
        volume / self.removal_rate() + self.setup_minutes()
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended tool family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    StandardDrill,
    PeckDrill,
    DeepHoleDrill,
    FlatEndMill,
    BallEndMill,
    ChamferMill,
    CounterboreCutter,
    CountersinkCutter,
}

impl ToolClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolClass::StandardDrill => "standard drill",
            ToolClass::PeckDrill => "peck drill",
            ToolClass::DeepHoleDrill => "deep-hole drill",
            ToolClass::FlatEndMill => "flat end mill",
            ToolClass::BallEndMill => "ball end mill",
            ToolClass::ChamferMill => "chamfer mill",
            ToolClass::CounterboreCutter => "counterbore cutter",
            ToolClass::CountersinkCutter => "countersink cutter",
        }
    }

    /// Drill class from the depth-to-diameter ratio
    pub fn for_hole(depth: f64, diameter: f64) -> Self {
        let ratio = if diameter > 0.0 { depth / diameter } else { 0.0 };
        if ratio < 3.0 {
            ToolClass::StandardDrill
        } else if ratio < 5.0 {
            ToolClass::PeckDrill
        } else {
            ToolClass::DeepHoleDrill
        }
    }
}

impl fmt::Display for ToolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machining operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Drilling,
    PeckDrilling,
    DeepHoleDrilling,
    PocketMilling,
    SlotMilling,
    FaceMilling,
    ContourMilling,
    EdgeBreaking,
    Counterboring,
    Countersinking,
}

/// Named, strictly positive dimensions in millimetres
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimensions(BTreeMap<String, f64>);

impl Dimensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dimension; zero, negative or non-finite values are rejected
    pub fn insert(&mut self, name: &str, value: f64) -> Result<(), DetectorSkip> {
        if !value.is_finite() || value <= 0.0 {
            return Err(DetectorSkip::new("non-positive dimension"));
        }
        self.0.insert(name.to_string(), value);
        Ok(())
    }

    /// Builder form of [`Dimensions::insert`]
    pub fn with(mut self, name: &str, value: f64) -> Result<Self, DetectorSkip> {
        self.insert(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max_value(&self) -> f64 {
        self.0.values().copied().fold(0.0, f64::max)
    }

    pub fn all_valid(&self) -> bool {
        self.0.values().all(|v| v.is_finite() && *v > 0.0)
    }
}

/// Reachability and tooling hints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accessibility {
    pub top_access: bool,
    pub side_access: bool,
    pub tool_class: ToolClass,
    pub min_tool_diameter: f64,
}

/// Finishing requirements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachiningParameters {
    /// Roughing allowance in mm.
    pub stock_to_leave: f64,
    /// Dimensional tolerance in mm (±).
    pub tolerance: f64,
    /// Target roughness Ra in µm.
    pub surface_finish: f64,
}

/// Cutting parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CuttingParameters {
    pub operation: Operation,
    pub tool_diameter: f64,
    /// Spindle speed in rpm.
    pub spindle_speed: f64,
    /// Feed in mm per revolution.
    pub feed_rate: f64,
    pub plunge_rate: Option<f64>,
    /// Radial engagement as a fraction of the tool diameter.
    pub step_over: Option<f64>,
    /// Axial depth per pass in mm.
    pub step_down: Option<f64>,
}

/// A child absorbed into a compound feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildFeature {
    pub id: FeatureId,
    pub kind: FeatureKind,
    pub dimensions: Dimensions,
}

impl ChildFeature {
    pub fn removal_volume(&self) -> f64 {
        self.kind.removal_volume(&self.dimensions, 0.0)
    }

    pub fn machining_minutes(&self) -> f64 {
        self.kind.machining_minutes(self.removal_volume())
    }
}

/// Children of a compound feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompoundInfo {
    pub children: Vec<ChildFeature>,
}

impl CompoundInfo {
    pub fn count(&self, kind: FeatureKind) -> usize {
        self.children.iter().filter(|c| c.kind == kind).count()
    }

    pub fn hole_count(&self) -> usize {
        self.count(FeatureKind::Hole)
    }
}

/// Detector output before tooling is derived
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDraft {
    pub kind: FeatureKind,
    pub confidence: f64,
    pub dimensions: Dimensions,
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
    pub depth: f64,
    pub bounds: BoundingBox,
    pub side_access: bool,
    pub surfaces: Vec<usize>,
}

impl FeatureDraft {
    pub fn new(kind: FeatureKind, confidence: f64, dimensions: Dimensions) -> Self {
        Self {
            kind,
            confidence,
            dimensions,
            position: Point3::origin(),
            normal: Vector3::z(),
            depth: 0.0,
            bounds: BoundingBox::empty(),
            side_access: false,
            surfaces: Vec::new(),
        }
    }

    pub fn at(mut self, position: Point3<f64>, normal: Vector3<f64>) -> Self {
        self.position = position;
        self.normal = normal;
        self
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_side_access(mut self, side_access: bool) -> Self {
        self.side_access = side_access;
        self
    }

    pub fn from_surfaces(mut self, surfaces: Vec<usize>) -> Self {
        self.surfaces = surfaces;
        self
    }
}

/// A recognized machining feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub kind: FeatureKind,
    pub confidence: f64,
    pub dimensions: Dimensions,
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
    pub depth: f64,
    pub bounds: BoundingBox,
    pub accessibility: Accessibility,
    pub machining: MachiningParameters,
    pub cutting: CuttingParameters,
    /// Surfaces the feature was detected from.
    pub surfaces: Vec<usize>,
    pub compound: Option<CompoundInfo>,
}

impl Feature {
    pub fn from_draft(id: FeatureId, draft: FeatureDraft) -> Self {
        let FeatureDraft {
            kind,
            confidence,
            dimensions,
            position,
            normal,
            depth,
            bounds,
            side_access,
            surfaces,
        } = draft;

        let mut feature = Self {
            id,
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            dimensions,
            position,
            normal,
            depth,
            bounds,
            accessibility: Accessibility {
                top_access: false,
                side_access,
                tool_class: ToolClass::FlatEndMill,
                min_tool_diameter: 0.0,
            },
            machining: MachiningParameters {
                stock_to_leave: 0.0,
                tolerance: 0.0,
                surface_finish: 0.0,
            },
            cutting: CuttingParameters {
                operation: Operation::FaceMilling,
                tool_diameter: 0.0,
                spindle_speed: 0.0,
                feed_rate: 0.0,
                plunge_rate: None,
                step_over: None,
                step_down: None,
            },
            surfaces,
            compound: None,
        };
        feature.derive_tooling();
        feature
    }

    /// Dimension by name, zero when absent
    pub fn dimension(&self, name: &str) -> f64 {
        self.dimensions.get(name).unwrap_or(0.0)
    }

    pub fn max_dimension(&self) -> f64 {
        self.dimensions.max_value()
    }

    pub fn hole_count(&self) -> usize {
        self.compound.as_ref().map_or(0, CompoundInfo::hole_count)
    }

    pub fn child_count(&self) -> usize {
        self.compound.as_ref().map_or(0, |c| c.children.len())
    }

    /// Characteristic size that sets tool selection
    fn characteristic_size(&self) -> f64 {
        match self.kind {
            FeatureKind::Hole | FeatureKind::Counterbore | FeatureKind::Countersink => {
                self.dimension("diameter")
            }
            FeatureKind::Pocket | FeatureKind::Slot | FeatureKind::Boss | FeatureKind::Rib
            | FeatureKind::Island => self.dimension("width"),
            FeatureKind::Step => self.dimension("height"),
            FeatureKind::Fillet => self.dimension("radius"),
            FeatureKind::Chamfer => self.dimension("width"),
        }
    }

    /// Estimated volume of material removed, in mm³
    pub fn removal_volume(&self) -> f64 {
        self.kind.removal_volume(&self.dimensions, self.bounds.volume())
    }

    /// Estimated machining time in minutes
    pub fn machining_minutes(&self) -> f64 {
        self.kind.machining_minutes(self.removal_volume())
    }

    fn derive_tooling(&mut self) {
        let size = self.characteristic_size();
        let up = self.normal.z > 0.5;

        let (tool_class, min_tool_diameter) = match self.kind {
            FeatureKind::Hole => (ToolClass::for_hole(self.depth, size), size),
            FeatureKind::Pocket => (ToolClass::FlatEndMill, size * 0.3),
            FeatureKind::Slot => (ToolClass::FlatEndMill, size * 0.8),
            FeatureKind::Step | FeatureKind::Boss | FeatureKind::Rib | FeatureKind::Island => {
                (ToolClass::FlatEndMill, size * 0.5)
            }
            FeatureKind::Fillet => (ToolClass::BallEndMill, size * 2.0),
            FeatureKind::Chamfer => (ToolClass::ChamferMill, size * 2.0),
            FeatureKind::Counterbore => (
                ToolClass::CounterboreCutter,
                self.dimension("counterbore_diameter").max(size),
            ),
            FeatureKind::Countersink => (ToolClass::CountersinkCutter, size),
        };

        let top_access = match self.kind {
            FeatureKind::Hole
            | FeatureKind::Pocket
            | FeatureKind::Slot
            | FeatureKind::Counterbore
            | FeatureKind::Countersink
            | FeatureKind::Boss
            | FeatureKind::Rib
            | FeatureKind::Island
            | FeatureKind::Step => up,
            FeatureKind::Fillet | FeatureKind::Chamfer => self.normal.z > 0.0,
        };

        self.accessibility = Accessibility {
            top_access,
            side_access: self.accessibility.side_access,
            tool_class,
            min_tool_diameter,
        };

        // (stock to leave, tolerance, Ra)
        let (stock_to_leave, tolerance, surface_finish) = match self.kind {
            FeatureKind::Hole => (0.1, if size < 10.0 { 0.025 } else { 0.05 }, 1.6),
            FeatureKind::Counterbore | FeatureKind::Countersink => (0.1, 0.05, 1.6),
            FeatureKind::Pocket | FeatureKind::Slot => (0.2, 0.05, 3.2),
            FeatureKind::Step => (0.2, 0.1, 3.2),
            FeatureKind::Boss | FeatureKind::Rib | FeatureKind::Island => (0.2, 0.05, 1.6),
            FeatureKind::Fillet => (0.05, 0.1, 0.8),
            FeatureKind::Chamfer => (0.05, 0.1, 3.2),
        };
        self.machining = MachiningParameters {
            stock_to_leave,
            tolerance,
            surface_finish,
        };

        self.cutting = match self.kind {
            FeatureKind::Hole => CuttingParameters {
                operation: match tool_class {
                    ToolClass::PeckDrill => Operation::PeckDrilling,
                    ToolClass::DeepHoleDrill => Operation::DeepHoleDrilling,
                    _ => Operation::Drilling,
                },
                tool_diameter: size * 0.9,
                spindle_speed: 1200.0,
                feed_rate: 0.1,
                plunge_rate: Some(0.05),
                step_over: None,
                step_down: None,
            },
            FeatureKind::Pocket => CuttingParameters {
                operation: Operation::PocketMilling,
                tool_diameter: size * 0.3,
                spindle_speed: 800.0,
                feed_rate: 0.2,
                plunge_rate: Some(0.05),
                step_over: Some(0.6),
                step_down: Some(0.5),
            },
            FeatureKind::Slot => CuttingParameters {
                operation: Operation::SlotMilling,
                tool_diameter: size * 0.8,
                spindle_speed: 1000.0,
                feed_rate: 0.15,
                plunge_rate: Some(0.05),
                step_over: None,
                step_down: Some(0.3),
            },
            FeatureKind::Counterbore => CuttingParameters {
                operation: Operation::Counterboring,
                tool_diameter: min_tool_diameter,
                spindle_speed: 900.0,
                feed_rate: 0.08,
                plunge_rate: Some(0.05),
                step_over: None,
                step_down: None,
            },
            FeatureKind::Countersink => CuttingParameters {
                operation: Operation::Countersinking,
                tool_diameter: min_tool_diameter,
                spindle_speed: 900.0,
                feed_rate: 0.08,
                plunge_rate: Some(0.05),
                step_over: None,
                step_down: None,
            },
            FeatureKind::Step => CuttingParameters {
                operation: Operation::FaceMilling,
                tool_diameter: size * 0.5,
                spindle_speed: 1000.0,
                feed_rate: 0.1,
                plunge_rate: None,
                step_over: Some(0.6),
                step_down: Some(0.5),
            },
            FeatureKind::Boss | FeatureKind::Rib | FeatureKind::Island => CuttingParameters {
                operation: Operation::ContourMilling,
                tool_diameter: size * 0.5,
                spindle_speed: 1000.0,
                feed_rate: 0.1,
                plunge_rate: None,
                step_over: Some(0.6),
                step_down: Some(0.5),
            },
            FeatureKind::Fillet | FeatureKind::Chamfer => CuttingParameters {
                operation: Operation::EdgeBreaking,
                tool_diameter: min_tool_diameter,
                spindle_speed: 1000.0,
                feed_rate: 0.1,
                plunge_rate: None,
                step_over: None,
                step_down: None,
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hole(diameter: f64, depth: f64) -> Feature {
        let dims = Dimensions::new()
            .with("diameter", diameter)
            .and_then(|d| d.with("depth", depth))
            .unwrap();
        Feature::from_draft(
            FeatureId(1),
            FeatureDraft::new(FeatureKind::Hole, 0.9, dims)
                .at(Point3::origin(), Vector3::z())
                .with_depth(depth),
        )
    }

    #[test]
    fn test_dimensions_reject_non_positive() {
        let mut dims = Dimensions::new();
        assert!(dims.insert("width", 0.0).is_err());
        assert!(dims.insert("width", -1.0).is_err());
        assert!(dims.insert("width", f64::NAN).is_err());
        assert!(dims.insert("width", 4.0).is_ok());
        assert_eq!(dims.len(), 1);
        assert_eq!(dims.max_value(), 4.0);
    }

    #[test]
    fn test_hole_tool_selection() {
        assert_eq!(hole(6.0, 10.0).accessibility.tool_class, ToolClass::StandardDrill);
        assert_eq!(hole(6.0, 24.0).accessibility.tool_class, ToolClass::PeckDrill);
        assert_eq!(hole(6.0, 40.0).accessibility.tool_class, ToolClass::DeepHoleDrill);
        assert_eq!(hole(6.0, 40.0).cutting.operation, Operation::DeepHoleDrilling);
    }

    #[test]
    fn test_hole_parameters() {
        let feature = hole(6.0, 15.0);
        assert!(feature.accessibility.top_access);
        assert_relative_eq!(feature.accessibility.min_tool_diameter, 6.0);
        assert_relative_eq!(feature.cutting.tool_diameter, 5.4, epsilon = 1e-12);
        assert_relative_eq!(feature.machining.tolerance, 0.025);
        assert_relative_eq!(feature.removal_volume(), PI * 9.0 * 15.0, epsilon = 1e-9);
        assert!(feature.machining_minutes() > FeatureKind::Hole.setup_minutes());
    }

    #[test]
    fn test_containment_table() {
        assert_eq!(FeatureKind::Pocket.absorbs(FeatureKind::Hole), Some(FeatureKind::Hole));
        assert_eq!(FeatureKind::Pocket.absorbs(FeatureKind::Boss), Some(FeatureKind::Island));
        assert_eq!(FeatureKind::Counterbore.absorbs(FeatureKind::Hole), Some(FeatureKind::Hole));
        assert_eq!(FeatureKind::Hole.absorbs(FeatureKind::Hole), None);
        assert_eq!(FeatureKind::Slot.absorbs(FeatureKind::Hole), None);
    }

    #[test]
    fn test_feature_id_display() {
        assert_eq!(FeatureId(7).to_string(), "F0007");
        assert_eq!(FeatureKind::Counterbore.to_string(), "counterbore");
    }
}
