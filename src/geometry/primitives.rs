// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Reference part generator
//!
//! Builds closed, outward-oriented triangle meshes of simple machined parts:
//! blocks with bores, pockets, slots, steps, bosses, ribs, counterbores, a
//! rounded edge, or a sharp wedge. Axis-aligned faces are subdivided on a
//! global lattice so that neighbouring tiles share their edges.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::MeshBuffers;
use crate::utils::math::deg_to_rad;

/// Default lattice spacing in millimetres
pub const DEFAULT_SPACING: f64 = 2.5;

/// Default number of segments around a full circle
pub const DEFAULT_SEGMENTS: usize = 32;

/// Reference parts. Every part sits on `z = 0` with its footprint starting at the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Part {
    Block {
        size: Vector3<f64>,
    },
    /// Vertical through-bore at the centre of the block.
    BoredBlock {
        size: Vector3<f64>,
        diameter: f64,
    },
    /// Rectangular recess centred in the top face, optionally with a bore in its floor.
    PocketedBlock {
        size: Vector3<f64>,
        pocket: Vector3<f64>,
        hole_diameter: Option<f64>,
    },
    /// Slot of `width` × `depth` running across the full length of the block along Y.
    ThroughSlotBlock {
        size: Vector3<f64>,
        width: f64,
        depth: f64,
    },
    /// Left half at full height, right half lowered by `step_height`.
    SteppedBlock {
        size: Vector3<f64>,
        step_height: f64,
    },
    /// Cylindrical boss on top of a plate.
    BossPlate {
        size: Vector3<f64>,
        diameter: f64,
        height: f64,
    },
    /// Rectangular rib on top of a plate.
    RibPlate {
        size: Vector3<f64>,
        rib: Vector3<f64>,
    },
    /// Through-bore with a wider counterbore at the top.
    CounterboredBlock {
        size: Vector3<f64>,
        diameter: f64,
        counterbore_diameter: f64,
        counterbore_depth: f64,
    },
    /// Block whose vertical edge at `(x_max, y_max)` is rounded.
    FilletedBlock {
        size: Vector3<f64>,
        radius: f64,
    },
    /// Triangular prism along Y with a sharp ridge on top.
    Wedge {
        length: f64,
        height: f64,
        apex_angle_deg: f64,
    },
}

impl Part {
    pub fn block(size: Vector3<f64>) -> Self {
        Self::Block { size }
    }

    pub fn bored_block(size: Vector3<f64>, diameter: f64) -> Self {
        Self::BoredBlock { size, diameter }
    }

    pub fn pocketed_block(size: Vector3<f64>, pocket: Vector3<f64>) -> Self {
        Self::PocketedBlock {
            size,
            pocket,
            hole_diameter: None,
        }
    }

    pub fn pocket_with_hole(size: Vector3<f64>, pocket: Vector3<f64>, hole_diameter: f64) -> Self {
        Self::PocketedBlock {
            size,
            pocket,
            hole_diameter: Some(hole_diameter),
        }
    }

    /// A closed slot is a pocket elongated along Y
    pub fn slotted_block(size: Vector3<f64>, slot: Vector3<f64>) -> Self {
        Self::pocketed_block(size, slot)
    }

    /// An open slot cut through both end faces
    pub fn through_slot_block(size: Vector3<f64>, width: f64, depth: f64) -> Self {
        Self::ThroughSlotBlock { size, width, depth }
    }

    pub fn stepped_block(size: Vector3<f64>, step_height: f64) -> Self {
        Self::SteppedBlock { size, step_height }
    }

    pub fn boss_plate(size: Vector3<f64>, diameter: f64, height: f64) -> Self {
        Self::BossPlate {
            size,
            diameter,
            height,
        }
    }

    pub fn rib_plate(size: Vector3<f64>, rib: Vector3<f64>) -> Self {
        Self::RibPlate { size, rib }
    }

    pub fn counterbored_block(
        size: Vector3<f64>,
        diameter: f64,
        counterbore_diameter: f64,
        counterbore_depth: f64,
    ) -> Self {
        Self::CounterboredBlock {
            size,
            diameter,
            counterbore_diameter,
            counterbore_depth,
        }
    }

    pub fn filleted_block(size: Vector3<f64>, radius: f64) -> Self {
        Self::FilletedBlock { size, radius }
    }

    pub fn wedge(length: f64, height: f64, apex_angle_deg: f64) -> Self {
        Self::Wedge {
            length,
            height,
            apex_angle_deg,
        }
    }

    /// Look up a named demo part
    pub fn named(name: &str) -> Option<Self> {
        let part = match name {
            "block" => Self::block(Vector3::new(40.0, 30.0, 20.0)),
            "bore" => Self::bored_block(Vector3::new(30.0, 30.0, 15.0), 6.0),
            "pocket" => {
                Self::pocketed_block(Vector3::new(60.0, 50.0, 20.0), Vector3::new(20.0, 30.0, 10.0))
            }
            "pocket-hole" => Self::pocket_with_hole(
                Vector3::new(60.0, 50.0, 20.0),
                Vector3::new(20.0, 30.0, 10.0),
                6.0,
            ),
            "slot" => {
                Self::slotted_block(Vector3::new(40.0, 50.0, 15.0), Vector3::new(6.0, 30.0, 5.0))
            }
            "through-slot" => Self::through_slot_block(Vector3::new(40.0, 50.0, 15.0), 5.0, 5.0),
            "step" => Self::stepped_block(Vector3::new(40.0, 20.0, 20.0), 10.0),
            "boss" => Self::boss_plate(Vector3::new(40.0, 40.0, 10.0), 10.0, 8.0),
            "rib" => Self::rib_plate(Vector3::new(40.0, 40.0, 5.0), Vector3::new(4.0, 30.0, 6.0)),
            "counterbore" => {
                Self::counterbored_block(Vector3::new(30.0, 30.0, 20.0), 6.0, 12.0, 8.0)
            }
            "fillet" => Self::filleted_block(Vector3::new(30.0, 20.0, 15.0), 3.0),
            "wedge" => Self::wedge(20.0, 10.0, 30.0),
            _ => return None,
        };
        Some(part)
    }

    /// Names accepted by [`Part::named`]
    pub fn names() -> &'static [&'static str] {
        &[
            "block",
            "bore",
            "pocket",
            "pocket-hole",
            "slot",
            "through-slot",
            "step",
            "boss",
            "rib",
            "counterbore",
            "fillet",
            "wedge",
        ]
    }

    pub fn to_buffers(&self) -> MeshBuffers {
        self.to_buffers_with(DEFAULT_SPACING, DEFAULT_SEGMENTS)
    }

    /// Tessellate with a given lattice spacing and circle segment count
    ///
    /// `segments` is rounded up to a multiple of 8 so that circles meet the
    /// corners of their surrounding tiles.
    pub fn to_buffers_with(&self, spacing: f64, segments: usize) -> MeshBuffers {
        let segments = segments.max(8).div_ceil(8) * 8;
        let mut builder = PartBuilder::new(spacing);

        match self {
            Self::Block { size } => {
                let outline = Rect::new(0.0, 0.0, size.x, size.y);
                builder.horizontal_rect(size.z, outline, true);
                builder.horizontal_rect(0.0, outline, false);
                builder.outline_walls(outline, 0.0, size.z);
            }
            Self::BoredBlock { size, diameter } => {
                let outline = Rect::new(0.0, 0.0, size.x, size.y);
                let circle = Circle::new(size.x / 2.0, size.y / 2.0, diameter / 2.0);
                builder.horizontal_rect_with_circle(size.z, outline, circle, segments, true);
                builder.horizontal_rect_with_circle(0.0, outline, circle, segments, false);
                builder.outline_walls(outline, 0.0, size.z);
                builder.cylinder_wall(circle, 0.0, size.z, segments, true);
            }
            Self::PocketedBlock {
                size,
                pocket,
                hole_diameter,
            } => {
                let outline = Rect::new(0.0, 0.0, size.x, size.y);
                let opening = Rect::centered(size.x / 2.0, size.y / 2.0, pocket.x, pocket.y);
                let floor = size.z - pocket.z;

                builder.horizontal_frame(size.z, outline, opening, true);
                builder.outline_walls(outline, 0.0, size.z);
                builder.opening_walls(opening, floor, size.z);

                match hole_diameter {
                    Some(diameter) => {
                        let circle = Circle::new(size.x / 2.0, size.y / 2.0, diameter / 2.0);
                        builder.horizontal_rect_with_circle(floor, opening, circle, segments, true);
                        builder.horizontal_rect_with_circle(0.0, outline, circle, segments, false);
                        builder.cylinder_wall(circle, 0.0, floor, segments, true);
                    }
                    None => {
                        builder.horizontal_rect(floor, opening, true);
                        builder.horizontal_rect(0.0, outline, false);
                    }
                }
            }
            Self::ThroughSlotBlock { size, width, depth } => {
                let (x0, x1) = (size.x / 2.0 - width / 2.0, size.x / 2.0 + width / 2.0);
                let floor = size.z - depth;
                builder.horizontal_rect(size.z, Rect::new(0.0, 0.0, x0, size.y), true);
                builder.horizontal_rect(size.z, Rect::new(x1, 0.0, size.x, size.y), true);
                builder.horizontal_rect(floor, Rect::new(x0, 0.0, x1, size.y), true);
                builder.horizontal_rect(0.0, Rect::new(0.0, 0.0, size.x, size.y), false);

                builder.vertical_wall((0.0, 0.0), (x0, 0.0), 0.0, size.z);
                builder.vertical_wall((x0, 0.0), (x1, 0.0), 0.0, floor);
                builder.vertical_wall((x1, 0.0), (size.x, 0.0), 0.0, size.z);
                builder.vertical_wall((size.x, 0.0), (size.x, size.y), 0.0, size.z);
                builder.vertical_wall((size.x, size.y), (x1, size.y), 0.0, size.z);
                builder.vertical_wall((x1, size.y), (x0, size.y), 0.0, floor);
                builder.vertical_wall((x0, size.y), (0.0, size.y), 0.0, size.z);
                builder.vertical_wall((0.0, size.y), (0.0, 0.0), 0.0, size.z);

                builder.vertical_wall((x0, 0.0), (x0, size.y), floor, size.z);
                builder.vertical_wall((x1, size.y), (x1, 0.0), floor, size.z);
            }
            Self::SteppedBlock { size, step_height } => {
                let split = size.x / 2.0;
                let low = size.z - step_height;
                builder.horizontal_rect(size.z, Rect::new(0.0, 0.0, split, size.y), true);
                builder.horizontal_rect(low, Rect::new(split, 0.0, size.x, size.y), true);
                builder.horizontal_rect(0.0, Rect::new(0.0, 0.0, size.x, size.y), false);

                builder.vertical_wall((0.0, 0.0), (split, 0.0), 0.0, size.z);
                builder.vertical_wall((split, 0.0), (size.x, 0.0), 0.0, low);
                builder.vertical_wall((size.x, 0.0), (size.x, size.y), 0.0, low);
                builder.vertical_wall((size.x, size.y), (split, size.y), 0.0, low);
                builder.vertical_wall((split, size.y), (0.0, size.y), 0.0, size.z);
                builder.vertical_wall((0.0, size.y), (0.0, 0.0), 0.0, size.z);
                builder.vertical_wall((split, 0.0), (split, size.y), low, size.z);
            }
            Self::BossPlate {
                size,
                diameter,
                height,
            } => {
                let outline = Rect::new(0.0, 0.0, size.x, size.y);
                let circle = Circle::new(size.x / 2.0, size.y / 2.0, diameter / 2.0);
                builder.horizontal_rect_with_circle(size.z, outline, circle, segments, true);
                builder.horizontal_rect(0.0, outline, false);
                builder.outline_walls(outline, 0.0, size.z);
                builder.cylinder_wall(circle, size.z, size.z + height, segments, false);
                builder.horizontal_disk(size.z + height, circle, segments, true);
            }
            Self::RibPlate { size, rib } => {
                let outline = Rect::new(0.0, 0.0, size.x, size.y);
                let footprint = Rect::centered(size.x / 2.0, size.y / 2.0, rib.x, rib.y);
                let top = size.z + rib.z;
                builder.horizontal_frame(size.z, outline, footprint, true);
                builder.horizontal_rect(0.0, outline, false);
                builder.outline_walls(outline, 0.0, size.z);
                builder.outline_walls(footprint, size.z, top);
                builder.horizontal_rect(top, footprint, true);
            }
            Self::CounterboredBlock {
                size,
                diameter,
                counterbore_diameter,
                counterbore_depth,
            } => {
                let outline = Rect::new(0.0, 0.0, size.x, size.y);
                let (cx, cy) = (size.x / 2.0, size.y / 2.0);
                let bore = Circle::new(cx, cy, diameter / 2.0);
                let counterbore = Circle::new(cx, cy, counterbore_diameter / 2.0);
                let shoulder = size.z - counterbore_depth;

                builder.horizontal_rect_with_circle(size.z, outline, counterbore, segments, true);
                builder.horizontal_rect_with_circle(0.0, outline, bore, segments, false);
                builder.outline_walls(outline, 0.0, size.z);
                builder.cylinder_wall(counterbore, shoulder, size.z, segments, true);
                builder.horizontal_annulus(shoulder, bore, counterbore.radius, segments);
                builder.cylinder_wall(bore, 0.0, shoulder, segments, true);
            }
            Self::FilletedBlock { size, radius } => {
                build_filleted_block(&mut builder, *size, *radius, segments / 4);
            }
            Self::Wedge {
                length,
                height,
                apex_angle_deg,
            } => {
                build_wedge(&mut builder, *length, *height, *apex_angle_deg);
            }
        }

        builder.into_buffers()
    }
}

/// Axis-aligned rectangle in plan view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn centered(cx: f64, cy: f64, width: f64, length: f64) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - length / 2.0,
            cx + width / 2.0,
            cy + length / 2.0,
        )
    }

    fn is_degenerate(&self) -> bool {
        self.x1 - self.x0 <= f64::EPSILON || self.y1 - self.y0 <= f64::EPSILON
    }
}

/// Circle in plan view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

impl Circle {
    pub fn new(cx: f64, cy: f64, radius: f64) -> Self {
        Self { cx, cy, radius }
    }

    fn point(&self, index: usize, segments: usize, z: f64) -> Point3<f64> {
        let theta = 2.0 * PI * index as f64 / segments as f64;
        Point3::new(
            self.cx + self.radius * theta.cos(),
            self.cy + self.radius * theta.sin(),
            z,
        )
    }
}

/// Triangle soup builder for outward-oriented closed parts
#[derive(Debug, Clone)]
pub struct PartBuilder {
    positions: Vec<f64>,
    spacing: f64,
}

impl PartBuilder {
    pub fn new(spacing: f64) -> Self {
        Self {
            positions: Vec::new(),
            spacing: if spacing > 0.0 { spacing } else { DEFAULT_SPACING },
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 9
    }

    pub fn into_buffers(self) -> MeshBuffers {
        MeshBuffers::new(self.positions)
    }

    /// Triangle with counter-clockwise winding seen from outside
    pub fn triangle(&mut self, a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) {
        for p in [a, b, c] {
            self.positions.extend([p.x, p.y, p.z]);
        }
    }

    /// Horizontal rectangle facing up or down
    pub fn horizontal_rect(&mut self, z: f64, rect: Rect, up: bool) {
        if rect.is_degenerate() {
            return;
        }
        let xs = self.breakpoints(rect.x0, rect.x1);
        let ys = self.breakpoints(rect.y0, rect.y1);
        for i in 0..xs.len() - 1 {
            for j in 0..ys.len() - 1 {
                let a = Point3::new(xs[i], ys[j], z);
                let b = Point3::new(xs[i + 1], ys[j], z);
                let c = Point3::new(xs[i + 1], ys[j + 1], z);
                let d = Point3::new(xs[i], ys[j + 1], z);
                if up {
                    self.triangle(a, b, c);
                    self.triangle(a, c, d);
                } else {
                    self.triangle(a, c, b);
                    self.triangle(a, d, c);
                }
            }
        }
    }

    /// Horizontal rectangle with a rectangular opening, as up to eight tiles
    pub fn horizontal_frame(&mut self, z: f64, outer: Rect, inner: Rect, up: bool) {
        let xs = [outer.x0, inner.x0, inner.x1, outer.x1];
        let ys = [outer.y0, inner.y0, inner.y1, outer.y1];
        for i in 0..3 {
            for j in 0..3 {
                if i == 1 && j == 1 {
                    continue;
                }
                self.horizontal_rect(z, Rect::new(xs[i], ys[j], xs[i + 1], ys[j + 1]), up);
            }
        }
    }

    /// Horizontal rectangle with a circular opening
    ///
    /// The opening is bridged to a surrounding square by a ring of triangles;
    /// the square is placed in a frame of rectangular tiles.
    pub fn horizontal_rect_with_circle(
        &mut self,
        z: f64,
        outer: Rect,
        circle: Circle,
        segments: usize,
        up: bool,
    ) {
        let room = (circle.cx - outer.x0)
            .min(outer.x1 - circle.cx)
            .min(circle.cy - outer.y0)
            .min(outer.y1 - circle.cy);
        let half = (circle.radius * 2.0).min(room);
        let square = Rect::centered(circle.cx, circle.cy, 2.0 * half, 2.0 * half);

        self.horizontal_frame(z, outer, square, up);

        for i in 0..segments {
            let next = (i + 1) % segments;
            let c0 = circle.point(i, segments, z);
            let c1 = circle.point(next, segments, z);
            let q0 = square_point(&circle, half, i, segments, z);
            let q1 = square_point(&circle, half, next, segments, z);
            if up {
                self.triangle(c0, q0, q1);
                self.triangle(c0, q1, c1);
            } else {
                self.triangle(c0, q1, q0);
                self.triangle(c0, c1, q1);
            }
        }
    }

    /// Disk fanned from its centre, facing up or down
    pub fn horizontal_disk(&mut self, z: f64, circle: Circle, segments: usize, up: bool) {
        let center = Point3::new(circle.cx, circle.cy, z);
        for i in 0..segments {
            let c0 = circle.point(i, segments, z);
            let c1 = circle.point((i + 1) % segments, segments, z);
            if up {
                self.triangle(center, c0, c1);
            } else {
                self.triangle(center, c1, c0);
            }
        }
    }

    /// Up-facing ring between `inner` and a concentric circle of `outer_radius`
    pub fn horizontal_annulus(&mut self, z: f64, inner: Circle, outer_radius: f64, segments: usize) {
        let outer = Circle::new(inner.cx, inner.cy, outer_radius);
        for i in 0..segments {
            let next = (i + 1) % segments;
            let a0 = inner.point(i, segments, z);
            let a1 = inner.point(next, segments, z);
            let b0 = outer.point(i, segments, z);
            let b1 = outer.point(next, segments, z);
            self.triangle(a0, b0, b1);
            self.triangle(a0, b1, a1);
        }
    }

    /// Vertical wall between two plan points
    ///
    /// The wall faces to the right of the direction `a → b`, so walls of a
    /// counter-clockwise outline face outwards and walls of a clockwise
    /// opening face into the opening.
    pub fn vertical_wall(&mut self, a: (f64, f64), b: (f64, f64), z0: f64, z1: f64) {
        let zs = self.breakpoints(z0, z1);
        let along_x = (a.1 - b.1).abs() <= f64::EPSILON;
        let along_y = (a.0 - b.0).abs() <= f64::EPSILON;

        let plan: Vec<(f64, f64)> = if along_x {
            self.breakpoints(a.0, b.0).into_iter().map(|x| (x, a.1)).collect()
        } else if along_y {
            self.breakpoints(a.1, b.1).into_iter().map(|y| (a.0, y)).collect()
        } else {
            let length = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
            let n = (length / self.spacing).ceil().max(1.0) as usize;
            (0..=n)
                .map(|k| {
                    let t = k as f64 / n as f64;
                    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
                })
                .collect()
        };

        for i in 0..plan.len() - 1 {
            for j in 0..zs.len() - 1 {
                let p00 = Point3::new(plan[i].0, plan[i].1, zs[j]);
                let p10 = Point3::new(plan[i + 1].0, plan[i + 1].1, zs[j]);
                let p11 = Point3::new(plan[i + 1].0, plan[i + 1].1, zs[j + 1]);
                let p01 = Point3::new(plan[i].0, plan[i].1, zs[j + 1]);
                self.triangle(p00, p10, p11);
                self.triangle(p00, p11, p01);
            }
        }
    }

    /// Outward-facing walls around a counter-clockwise rectangle
    pub fn outline_walls(&mut self, rect: Rect, z0: f64, z1: f64) {
        self.vertical_wall((rect.x0, rect.y0), (rect.x1, rect.y0), z0, z1);
        self.vertical_wall((rect.x1, rect.y0), (rect.x1, rect.y1), z0, z1);
        self.vertical_wall((rect.x1, rect.y1), (rect.x0, rect.y1), z0, z1);
        self.vertical_wall((rect.x0, rect.y1), (rect.x0, rect.y0), z0, z1);
    }

    /// Walls of a rectangular opening, facing into the opening
    pub fn opening_walls(&mut self, rect: Rect, z0: f64, z1: f64) {
        self.vertical_wall((rect.x0, rect.y0), (rect.x0, rect.y1), z0, z1);
        self.vertical_wall((rect.x0, rect.y1), (rect.x1, rect.y1), z0, z1);
        self.vertical_wall((rect.x1, rect.y1), (rect.x1, rect.y0), z0, z1);
        self.vertical_wall((rect.x1, rect.y0), (rect.x0, rect.y0), z0, z1);
    }

    /// Full vertical cylinder; `inward` walls face the axis (a bore)
    pub fn cylinder_wall(&mut self, circle: Circle, z0: f64, z1: f64, segments: usize, inward: bool) {
        self.cylinder_arc_wall(circle, 0, segments, segments, z0, z1, inward);
    }

    /// Columns `first..last` of a vertical cylinder split into `segments` columns
    #[allow(clippy::too_many_arguments)]
    pub fn cylinder_arc_wall(
        &mut self,
        circle: Circle,
        first: usize,
        last: usize,
        segments: usize,
        z0: f64,
        z1: f64,
        inward: bool,
    ) {
        let zs = self.breakpoints(z0, z1);
        for i in first..last {
            let next = (i + 1) % segments;
            for j in 0..zs.len() - 1 {
                let a = circle.point(i, segments, zs[j]);
                let b = circle.point(next, segments, zs[j]);
                let c = circle.point(next, segments, zs[j + 1]);
                let d = circle.point(i, segments, zs[j + 1]);
                if inward {
                    self.triangle(b, a, d);
                    self.triangle(b, d, c);
                } else {
                    self.triangle(a, b, c);
                    self.triangle(a, c, d);
                }
            }
        }
    }

    /// Quad subdivided uniformly, wound `p0 → p1 → p2 → p3`
    pub fn quad(&mut self, p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>, p3: Point3<f64>) {
        let nu = ((p1 - p0).norm() / self.spacing).ceil().max(1.0) as usize;
        let nv = ((p3 - p0).norm() / self.spacing).ceil().max(1.0) as usize;
        let at = |i: usize, j: usize| -> Point3<f64> {
            let s = i as f64 / nu as f64;
            let t = j as f64 / nv as f64;
            let bottom = p0.coords.lerp(&p1.coords, s);
            let top = p3.coords.lerp(&p2.coords, s);
            Point3::from(bottom.lerp(&top, t))
        };
        for i in 0..nu {
            for j in 0..nv {
                let a = at(i, j);
                let b = at(i + 1, j);
                let c = at(i + 1, j + 1);
                let d = at(i, j + 1);
                self.triangle(a, b, c);
                self.triangle(a, c, d);
            }
        }
    }

    /// `a`, `b` and every lattice multiple strictly between them, in the direction `a → b`
    fn breakpoints(&self, a: f64, b: f64) -> Vec<f64> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let margin = self.spacing * 1e-6;
        let mut points = vec![lo];
        let mut k = (lo / self.spacing).floor() + 1.0;
        loop {
            let value = k * self.spacing;
            if value >= hi - margin {
                break;
            }
            if value > lo + margin {
                points.push(value);
            }
            k += 1.0;
        }
        points.push(hi);
        if a > b {
            points.reverse();
        }
        points
    }
}

/// Point where the ray from the circle centre at segment `index` meets the
/// square of half-width `half`
fn square_point(circle: &Circle, half: f64, index: usize, segments: usize, z: f64) -> Point3<f64> {
    let theta = 2.0 * PI * index as f64 / segments as f64;
    let (sin, cos) = theta.sin_cos();
    let reach = half / cos.abs().max(sin.abs());
    Point3::new(circle.cx + reach * cos, circle.cy + reach * sin, z)
}

fn build_filleted_block(builder: &mut PartBuilder, size: Vector3<f64>, radius: f64, arc_segments: usize) {
    let (l, w, h) = (size.x, size.y, size.z);
    let r = radius.min(l / 2.0).min(w / 2.0);
    let arc = Circle::new(l - r, w - r, r);
    let full = arc_segments * 4;

    for (z, up) in [(h, true), (0.0, false)] {
        builder.horizontal_rect(z, Rect::new(0.0, 0.0, l - r, w), up);
        builder.horizontal_rect(z, Rect::new(l - r, 0.0, l, w - r), up);
        let center = Point3::new(arc.cx, arc.cy, z);
        for i in 0..arc_segments {
            let c0 = arc.point(i, full, z);
            let c1 = arc.point(i + 1, full, z);
            if up {
                builder.triangle(center, c0, c1);
            } else {
                builder.triangle(center, c1, c0);
            }
        }
    }

    builder.vertical_wall((0.0, 0.0), (l - r, 0.0), 0.0, h);
    builder.vertical_wall((l - r, 0.0), (l, 0.0), 0.0, h);
    builder.vertical_wall((l, 0.0), (l, w - r), 0.0, h);
    builder.vertical_wall((l - r, w), (0.0, w), 0.0, h);
    builder.vertical_wall((0.0, w), (0.0, 0.0), 0.0, h);
    builder.cylinder_arc_wall(arc, 0, arc_segments, full, 0.0, h, false);
}

fn build_wedge(builder: &mut PartBuilder, length: f64, height: f64, apex_angle_deg: f64) {
    let base = 2.0 * height * (deg_to_rad(apex_angle_deg) / 2.0).tan();
    let apex = base / 2.0;

    builder.quad(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(apex, 0.0, height),
        Point3::new(apex, length, height),
        Point3::new(0.0, length, 0.0),
    );
    builder.quad(
        Point3::new(base, 0.0, 0.0),
        Point3::new(base, length, 0.0),
        Point3::new(apex, length, height),
        Point3::new(apex, 0.0, height),
    );
    builder.horizontal_rect(0.0, Rect::new(0.0, 0.0, base, length), false);
    builder.triangle(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(base, 0.0, 0.0),
        Point3::new(apex, 0.0, height),
    );
    builder.triangle(
        Point3::new(0.0, length, 0.0),
        Point3::new(apex, length, height),
        Point3::new(base, length, 0.0),
    );
}
