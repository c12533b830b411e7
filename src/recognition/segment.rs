// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Surface segmentation
//!
//! Faces are bucketed by the dominant axis of their normal and region-grown
//! from the lowest unvisited face id. Adjacent clusters that continue one
//! another smoothly around a common axis are then consolidated, so a faceted
//! bore becomes one surface instead of several fragments.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::f64::consts::{FRAC_PI_2, PI};
use tracing::debug;

use crate::geometry::{BoundingBox, FaceId, Mesh, MeshAdjacency, VertexId};
use crate::utils::math::angle_between;

/// Mean normal deviation (radians) below which a cluster is planar
pub const PLANAR_MAX_DEVIATION: f64 = 0.05;

/// Smallest-eigenvalue share of the normal scatter below which normals fit a common axis
pub const CYLINDER_FIT_RATIO: f64 = 0.02;

/// Clusters with fewer faces are noise
pub const MIN_SURFACE_FACES: usize = 3;

/// Angular coverage (radians) from which a cylinder counts as a full circle
pub const FULL_CIRCLE_COVERAGE: f64 = 1.5 * PI;

/// Geometric type of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    Planar,
    Cylindrical,
    Complex,
}

impl SurfaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceKind::Planar => "planar",
            SurfaceKind::Cylindrical => "cylindrical",
            SurfaceKind::Complex => "complex",
        }
    }
}

/// Axis and radius fitted to a cylindrical surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CylinderFit {
    /// Unit axis, oriented towards +Z (or its dominant positive component).
    pub axis: Vector3<f64>,
    /// Point on the axis at mid-height of the surface.
    pub origin: Point3<f64>,
    pub radius: f64,
    /// Extent of the surface along the axis.
    pub span: f64,
    /// Angle (radians) swept around the axis.
    pub coverage: f64,
    /// Whether the faces look towards the axis (a bore rather than a boss).
    pub inward: bool,
}

impl CylinderFit {
    pub fn diameter(&self) -> f64 {
        2.0 * self.radius
    }

    pub fn is_full_circle(&self) -> bool {
        self.coverage >= FULL_CIRCLE_COVERAGE
    }

    /// Distance from `point` to the axis line
    pub fn distance_to_axis(&self, point: &Point3<f64>) -> f64 {
        let offset = point - self.origin;
        (offset - self.axis * offset.dot(&self.axis)).norm()
    }

    /// Range of the surface along the axis, as axis parameters
    pub fn axial_range(&self) -> (f64, f64) {
        let mid = self.origin.coords.dot(&self.axis);
        (mid - self.span / 2.0, mid + self.span / 2.0)
    }
}

/// Maximal cluster of adjacent, similarly oriented faces
#[derive(Debug, Clone, Serialize)]
pub struct Surface {
    pub id: usize,
    pub faces: Vec<FaceId>,
    pub vertices: Vec<VertexId>,
    /// Area-weighted normal; the axis for closed cylinders.
    pub normal: Vector3<f64>,
    pub centroid: Point3<f64>,
    pub area: f64,
    pub bounds: BoundingBox,
    pub kind: SurfaceKind,
    /// Area-weighted mean angle between face normals and the mean normal.
    pub deviation: f64,
    pub cylinder: Option<CylinderFit>,
    #[serde(skip)]
    scatter: Matrix3<f64>,
}

impl Surface {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_planar(&self) -> bool {
        self.kind == SurfaceKind::Planar
    }

    /// Normal scatter matrix `Σ area · n nᵀ`
    pub fn scatter(&self) -> &Matrix3<f64> {
        &self.scatter
    }

    /// Plan-view extents `(short, long)`
    pub fn plan_extents(&self) -> (f64, f64) {
        self.bounds.plan_extents()
    }
}

/// Segmentation output: surfaces plus the noise clusters that were set aside
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub surfaces: Vec<Surface>,
    pub noise: Vec<Vec<FaceId>>,
    face_surface: Vec<Option<usize>>,
}

impl Segmentation {
    /// Surface owning `face`, or `None` for noise faces
    pub fn surface_of(&self, face: FaceId) -> Option<usize> {
        self.face_surface.get(face).copied().flatten()
    }

    pub fn face_surfaces(&self) -> &[Option<usize>] {
        &self.face_surface
    }

    pub fn noise_face_count(&self) -> usize {
        self.noise.iter().map(Vec::len).sum()
    }

    /// Verify that surfaces and noise clusters cover every face exactly once
    pub fn check_partition(&self, face_count: usize) -> Result<(), String> {
        let mut seen = vec![false; face_count];
        let clusters = self
            .surfaces
            .iter()
            .map(|s| s.faces.as_slice())
            .chain(self.noise.iter().map(Vec::as_slice));
        for faces in clusters {
            for &face in faces {
                match seen.get_mut(face) {
                    Some(flag) if !*flag => *flag = true,
                    Some(_) => return Err(format!("face {} assigned twice", face)),
                    None => return Err(format!("face {} out of range", face)),
                }
            }
        }
        match seen.iter().position(|covered| !covered) {
            Some(face) => Err(format!("face {} not assigned", face)),
            None => Ok(()),
        }
    }
}

/// Region-growing segmenter
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSegmenter {
    tolerance: f64,
}

impl SurfaceSegmenter {
    /// `tolerance` is the minimum normal dot product for joining a cluster
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn segment(&self, mesh: &Mesh, adjacency: &MeshAdjacency) -> Segmentation {
        let grown = self.grow(mesh, adjacency);
        let grown_count = grown.len();
        let clusters = self.consolidate(mesh, adjacency, grown);

        let (kept, noise): (Vec<_>, Vec<_>) = clusters
            .into_iter()
            .partition(|faces| faces.len() >= MIN_SURFACE_FACES);

        let mut surfaces: Vec<Surface> = kept
            .into_iter()
            .map(|faces| build_surface(mesh, faces))
            .collect();
        surfaces.sort_by(|a, b| b.area.total_cmp(&a.area).then(a.faces[0].cmp(&b.faces[0])));

        let mut face_surface = vec![None; mesh.face_count()];
        for (index, surface) in surfaces.iter_mut().enumerate() {
            surface.id = index;
            for &face in &surface.faces {
                face_surface[face] = Some(index);
            }
        }

        debug!(
            grown = grown_count,
            surfaces = surfaces.len(),
            noise_clusters = noise.len(),
            "segmentation complete"
        );

        Segmentation {
            surfaces,
            noise,
            face_surface,
        }
    }

    /// Breadth-first region growing inside normal buckets
    fn grow(&self, mesh: &Mesh, adjacency: &MeshAdjacency) -> Vec<Vec<FaceId>> {
        let faces = mesh.faces();
        let buckets: Vec<u8> = faces.iter().map(|f| normal_bucket(&f.normal)).collect();
        let mut visited = vec![false; faces.len()];
        let mut clusters = Vec::new();

        for seed in 0..faces.len() {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            let seed_normal = faces[seed].normal;
            let bucket = buckets[seed];

            let mut members = Vec::new();
            let mut queue = VecDeque::from([seed]);
            while let Some(face) = queue.pop_front() {
                members.push(face);
                for neighbor in adjacency.face_neighbors(mesh, face) {
                    if !visited[neighbor]
                        && buckets[neighbor] == bucket
                        && faces[neighbor].normal.dot(&seed_normal) > self.tolerance
                    {
                        visited[neighbor] = true;
                        queue.push_back(neighbor);
                    }
                }
            }
            members.sort_unstable();
            clusters.push(members);
        }

        clusters
    }

    /// Merge adjacent clusters that continue each other smoothly around a common axis
    fn consolidate(
        &self,
        mesh: &Mesh,
        adjacency: &MeshAdjacency,
        clusters: Vec<Vec<FaceId>>,
    ) -> Vec<Vec<FaceId>> {
        let mut face_cluster = vec![0usize; mesh.face_count()];
        for (index, faces) in clusters.iter().enumerate() {
            for &face in faces {
                face_cluster[face] = index;
            }
        }

        // (dot · length, length) summed over face pairs straddling each cluster boundary
        let mut boundaries: BTreeMap<(usize, usize), (f64, f64)> = BTreeMap::new();
        for ((v0, v1), faces) in adjacency.edges() {
            let length = mesh.edge_length(v0, v1);
            for (i, &fa) in faces.iter().enumerate() {
                for &fb in &faces[i + 1..] {
                    let (ca, cb) = (face_cluster[fa], face_cluster[fb]);
                    if ca == cb {
                        continue;
                    }
                    let key = if ca < cb { (ca, cb) } else { (cb, ca) };
                    let dot = mesh.face(fa).normal.dot(&mesh.face(fb).normal);
                    let entry = boundaries.entry(key).or_insert((0.0, 0.0));
                    entry.0 += dot * length;
                    entry.1 += length;
                }
            }
        }

        let mut stats: Vec<ClusterStats> = clusters
            .iter()
            .map(|faces| ClusterStats::measure(mesh, faces))
            .collect();
        let mut parent: Vec<usize> = (0..clusters.len()).collect();

        loop {
            let mut changed = false;
            for (&(a, b), &(weighted, length)) in &boundaries {
                if length <= 0.0 || weighted / length <= self.tolerance {
                    continue;
                }
                let (ra, rb) = (find_root(&mut parent, a), find_root(&mut parent, b));
                if ra == rb || !stats[ra].can_merge(&stats[rb]) {
                    continue;
                }
                let (keep, absorb) = if ra < rb { (ra, rb) } else { (rb, ra) };
                parent[absorb] = keep;
                let absorbed = stats[absorb];
                stats[keep].absorb(&absorbed);
                changed = true;
            }
            if !changed {
                break;
            }
        }

        let mut merged: BTreeMap<usize, Vec<FaceId>> = BTreeMap::new();
        for (index, faces) in clusters.into_iter().enumerate() {
            let root = find_root(&mut parent, index);
            merged.entry(root).or_default().extend(faces);
        }
        merged
            .into_values()
            .map(|mut faces| {
                faces.sort_unstable();
                faces
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct ClusterStats {
    area: f64,
    scatter: Matrix3<f64>,
    curved: bool,
}

impl ClusterStats {
    fn measure(mesh: &Mesh, faces: &[FaceId]) -> Self {
        let (area, normal_sum, scatter) = accumulate_normals(mesh, faces);
        let deviation = mean_deviation(mesh, faces, area, &normal_sum);
        Self {
            area,
            scatter,
            curved: deviation >= PLANAR_MAX_DEVIATION,
        }
    }

    /// Curved clusters merge with each other, or absorb smaller planar slivers.
    fn can_merge(&self, other: &ClusterStats) -> bool {
        let compatible = match (self.curved, other.curved) {
            (true, true) => true,
            (true, false) => self.area >= other.area,
            (false, true) => other.area >= self.area,
            (false, false) => false,
        };
        compatible && axis_fit_ratio(&(self.scatter + other.scatter)) < CYLINDER_FIT_RATIO
    }

    fn absorb(&mut self, other: &ClusterStats) {
        self.area += other.area;
        self.scatter += other.scatter;
        self.curved |= other.curved;
    }
}

fn find_root(parent: &mut [usize], mut node: usize) -> usize {
    while parent[node] != node {
        parent[node] = parent[parent[node]];
        node = parent[node];
    }
    node
}

/// Bucket index from the dominant axis and sign of a normal
fn normal_bucket(normal: &Vector3<f64>) -> u8 {
    let abs = normal.abs();
    let axis: u8 = if abs.x >= abs.y && abs.x >= abs.z {
        0
    } else if abs.y >= abs.z {
        1
    } else {
        2
    };
    axis * 2 + u8::from(normal[axis as usize] < 0.0)
}

/// Total area, area-weighted normal sum and normal scatter of a set of faces
fn accumulate_normals(mesh: &Mesh, faces: &[FaceId]) -> (f64, Vector3<f64>, Matrix3<f64>) {
    let mut area = 0.0;
    let mut normal_sum = Vector3::zeros();
    let mut scatter = Matrix3::zeros();
    for &id in faces {
        let face = mesh.face(id);
        area += face.area;
        normal_sum += face.normal * face.area;
        scatter += face.normal * face.normal.transpose() * face.area;
    }
    (area, normal_sum, scatter)
}

fn mean_deviation(mesh: &Mesh, faces: &[FaceId], area: f64, normal_sum: &Vector3<f64>) -> f64 {
    if area <= 0.0 {
        return FRAC_PI_2;
    }
    let Some(mean) = (normal_sum / area).try_normalize(1e-9) else {
        return FRAC_PI_2;
    };
    faces
        .iter()
        .map(|&id| {
            let face = mesh.face(id);
            face.area * angle_between(&face.normal, &mean)
        })
        .sum::<f64>()
        / area
}

/// Share of the smallest eigenvalue in the scatter trace; zero when all normals
/// are perpendicular to one axis
fn axis_fit_ratio(scatter: &Matrix3<f64>) -> f64 {
    let trace = scatter.trace();
    if trace <= 0.0 {
        return 1.0;
    }
    let eigen = SymmetricEigen::new(*scatter);
    eigen.eigenvalues.min().max(0.0) / trace
}

fn build_surface(mesh: &Mesh, faces: Vec<FaceId>) -> Surface {
    let (area, normal_sum, scatter) = accumulate_normals(mesh, &faces);
    let deviation = mean_deviation(mesh, &faces, area, &normal_sum);

    let mut vertices: Vec<VertexId> = faces
        .iter()
        .flat_map(|&id| mesh.face(id).vertices)
        .collect();
    vertices.sort_unstable();
    vertices.dedup();

    let bounds = BoundingBox::from_points(vertices.iter().map(|&v| mesh.vertex(v)));
    let centroid = if area > 0.0 {
        Point3::from(
            faces
                .iter()
                .map(|&id| mesh.face(id).centroid.coords * mesh.face(id).area)
                .sum::<Vector3<f64>>()
                / area,
        )
    } else {
        bounds.center()
    };

    let (kind, cylinder) = if deviation < PLANAR_MAX_DEVIATION {
        (SurfaceKind::Planar, None)
    } else if axis_fit_ratio(&scatter) < CYLINDER_FIT_RATIO {
        match fit_cylinder(mesh, &faces, &vertices, &scatter) {
            Some(fit) => (SurfaceKind::Cylindrical, Some(fit)),
            None => (SurfaceKind::Complex, None),
        }
    } else {
        (SurfaceKind::Complex, None)
    };

    let mean = if area > 0.0 { normal_sum / area } else { Vector3::zeros() };
    let normal = match (mean.try_normalize(1e-3), &cylinder) {
        (Some(n), _) => n,
        (None, Some(fit)) => fit.axis,
        (None, None) => Vector3::z(),
    };

    Surface {
        id: 0,
        faces,
        vertices,
        normal,
        centroid,
        area,
        bounds,
        kind,
        deviation,
        cylinder,
        scatter,
    }
}

/// Fit an axis from the normal scatter and a circle to the projected vertices
fn fit_cylinder(
    mesh: &Mesh,
    faces: &[FaceId],
    vertices: &[VertexId],
    scatter: &Matrix3<f64>,
) -> Option<CylinderFit> {
    let eigen = SymmetricEigen::new(*scatter);
    let smallest = eigen.eigenvalues.imin();
    let mut axis: Vector3<f64> = eigen.eigenvectors.column(smallest).into_owned().try_normalize(1e-12)?;
    let key = if axis.z.abs() > 1e-6 {
        axis.z
    } else if axis.y.abs() > 1e-6 {
        axis.y
    } else {
        axis.x
    };
    if key < 0.0 {
        axis = -axis;
    }

    let helper = if axis.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = (helper - axis * helper.dot(&axis)).try_normalize(1e-12)?;
    let v = axis.cross(&u);

    let count = vertices.len() as f64;
    if count < 3.0 {
        return None;
    }
    let mean = vertices
        .iter()
        .map(|&id| mesh.vertex(id).coords)
        .sum::<Vector3<f64>>()
        / count;

    // Kasa fit: minimise Σ (x² + y² + D x + E y + F)²
    let mut normal_matrix = Matrix3::zeros();
    let mut rhs = Vector3::zeros();
    let mut t_min = f64::INFINITY;
    let mut t_max = f64::NEG_INFINITY;
    let mut planar = Vec::with_capacity(vertices.len());
    for &id in vertices {
        let p = mesh.vertex(id).coords;
        let local = p - mean;
        let (x, y) = (local.dot(&u), local.dot(&v));
        let r2 = x * x + y * y;
        let row = Vector3::new(x, y, 1.0);
        normal_matrix += row * row.transpose();
        rhs -= row * r2;

        let t = p.dot(&axis);
        t_min = t_min.min(t);
        t_max = t_max.max(t);
        planar.push((x, y));
    }

    let solution = normal_matrix.lu().solve(&rhs)?;
    let (cx, cy) = (-solution.x / 2.0, -solution.y / 2.0);
    let radius_sq = cx * cx + cy * cy - solution.z;
    if !radius_sq.is_finite() || radius_sq <= 0.0 {
        return None;
    }
    let radius = radius_sq.sqrt();

    let center = mean + u * cx + v * cy;
    let t_mid = (t_min + t_max) / 2.0;
    let origin = Point3::from(center + axis * (t_mid - center.dot(&axis)));

    let mut angles: Vec<f64> = planar
        .iter()
        .map(|(x, y)| (y - cy).atan2(x - cx))
        .collect();
    angles.sort_unstable_by(f64::total_cmp);
    let mut widest_gap = angles[0] + 2.0 * PI - angles[angles.len() - 1];
    for pair in angles.windows(2) {
        widest_gap = widest_gap.max(pair[1] - pair[0]);
    }
    let coverage = (2.0 * PI - widest_gap).max(0.0);

    let facing: f64 = faces
        .iter()
        .map(|&id| {
            let face = mesh.face(id);
            let offset = face.centroid - origin;
            let radial = offset - axis * offset.dot(&axis);
            radial
                .try_normalize(1e-12)
                .map_or(0.0, |r| face.area * face.normal.dot(&r))
        })
        .sum();

    Some(CylinderFit {
        axis,
        origin,
        radius,
        span: t_max - t_min,
        coverage,
        inward: facing < 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{MeshBuffers, Part};
    use approx::assert_relative_eq;

    fn segment(buffers: &MeshBuffers) -> (Mesh, Segmentation) {
        let mesh = Mesh::ingest(buffers).unwrap();
        let adjacency = MeshAdjacency::build(&mesh);
        let segmentation = SurfaceSegmenter::new(0.9).segment(&mesh, &adjacency);
        (mesh, segmentation)
    }

    #[test]
    fn test_block_has_six_planar_surfaces() {
        let (mesh, seg) = segment(&Part::block(Vector3::new(40.0, 30.0, 20.0)).to_buffers());
        assert_eq!(seg.surfaces.len(), 6);
        assert!(seg.surfaces.iter().all(Surface::is_planar));
        assert!(seg.check_partition(mesh.face_count()).is_ok());

        // Largest faces first: the two 40 × 30 caps
        assert_relative_eq!(seg.surfaces[0].area, 1200.0, epsilon = 1e-6);
        assert_relative_eq!(seg.surfaces[1].area, 1200.0, epsilon = 1e-6);
        assert_relative_eq!(seg.surfaces[5].area, 600.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bore_consolidates_into_one_cylinder() {
        let (mesh, seg) = segment(&Part::bored_block(Vector3::new(30.0, 30.0, 15.0), 6.0).to_buffers());
        let cylinders: Vec<&Surface> = seg
            .surfaces
            .iter()
            .filter(|s| s.kind == SurfaceKind::Cylindrical)
            .collect();
        assert_eq!(cylinders.len(), 1, "bore fragments should merge");
        assert_eq!(seg.surfaces.len(), 7);

        let fit = cylinders[0].cylinder.unwrap();
        assert_relative_eq!(fit.radius, 3.0, epsilon = 1e-6);
        assert_relative_eq!(fit.span, 15.0, epsilon = 1e-6);
        assert_relative_eq!(fit.axis.z, 1.0, epsilon = 1e-6);
        assert!(fit.inward);
        assert!(fit.is_full_circle());
        assert!(seg.check_partition(mesh.face_count()).is_ok());
    }

    #[test]
    fn test_boss_cylinder_faces_outward() {
        let (_, seg) = segment(&Part::boss_plate(Vector3::new(40.0, 40.0, 10.0), 10.0, 8.0).to_buffers());
        let fit = seg
            .surfaces
            .iter()
            .find_map(|s| s.cylinder)
            .expect("boss wall should be cylindrical");
        assert!(!fit.inward);
        assert_relative_eq!(fit.radius, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fillet_stays_separate_from_walls() {
        let (_, seg) = segment(&Part::filleted_block(Vector3::new(30.0, 20.0, 15.0), 3.0).to_buffers());
        let curved: Vec<&Surface> = seg
            .surfaces
            .iter()
            .filter(|s| s.kind == SurfaceKind::Cylindrical)
            .collect();
        assert_eq!(curved.len(), 1);
        let fit = curved[0].cylinder.unwrap();
        assert_relative_eq!(fit.radius, 3.0, epsilon = 1e-6);
        assert!(!fit.is_full_circle());
        assert_eq!(seg.surfaces.iter().filter(|s| s.is_planar()).count(), 6);
    }

    #[test]
    fn test_small_clusters_become_noise() {
        let (mesh, seg) = segment(&Part::wedge(20.0, 10.0, 30.0).to_buffers());
        // The two triangular end caps are single faces.
        assert_eq!(seg.noise.len(), 2);
        assert_eq!(seg.noise_face_count(), 2);
        assert_eq!(seg.surfaces.len(), 3);
        assert!(seg.check_partition(mesh.face_count()).is_ok());
        assert!(seg.noise.iter().flatten().all(|&f| seg.surface_of(f).is_none()));
    }

    #[test]
    fn test_partition_check_detects_gaps() {
        let (mesh, mut seg) = segment(&Part::block(Vector3::new(10.0, 10.0, 10.0)).to_buffers());
        seg.surfaces[0].faces.pop();
        assert!(seg.check_partition(mesh.face_count()).is_err());
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let buffers = Part::pocket_with_hole(
            Vector3::new(60.0, 50.0, 20.0),
            Vector3::new(20.0, 30.0, 10.0),
            6.0,
        )
        .to_buffers();
        let (_, first) = segment(&buffers);
        let (_, second) = segment(&buffers);
        let faces = |seg: &Segmentation| -> Vec<Vec<FaceId>> {
            seg.surfaces.iter().map(|s| s.faces.clone()).collect()
        };
        assert_eq!(faces(&first), faces(&second));
    }
}
