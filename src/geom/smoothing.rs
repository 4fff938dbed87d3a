//! Per-vertex normals from smoothing-group metadata.
//!
//! The algorithm runs in four sequential passes over the mesh, always in the
//! stored face order:
//!
//! 1. Flat normals: each face's unnormalized cross product is written to all
//!    three of its positions in a scratch buffer. A later face overwrites an
//!    earlier one at a shared position.
//! 2. Tolerance: `epsilon_factor * |bbox.max - bbox.min|`.
//! 3. Index: every face corner is registered in an [`SgSpatialSort`] with its
//!    face's smoothing group, then sorted.
//! 4. Smoothing: for each corner, the scratch normals of all compatible corners
//!    within the tolerance are summed and normalized into the output buffer,
//!    again with later faces overwriting earlier ones.
//!
//! The overwrite order in passes 1 and 4 changes results for positions shared
//! by faces of different groups, so it is part of the contract. Positions are
//! never split or welded.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::diagnostics::SmoothingDiagnostics;
use super::mesh::{SmoothingFace, SmoothingMesh};
use super::metrics::{SmoothingMetrics, TimingBucket};
use super::spatial_sort::{SgSpatialIndex, SgSpatialSort, SmoothingGroupRule, SmoothingRule};
use super::{BBox, Point3, Tolerance, Vec3};

/// Input contract violations. Numeric edge cases are never errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmoothingError {
    #[error("face {face} corner {corner} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        face: usize,
        corner: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("index buffer is not a triangle list ({index_count} indices)")]
    NotTriangulated { index_count: usize },
    #[error("position buffer length {len} is not a multiple of 3")]
    PositionBufferLength { len: usize },
    #[error("expected one smoothing group per face: {faces} faces, {groups} groups")]
    GroupCountMismatch { faces: usize, groups: usize },
}

/// Tuning for [`compute_smoothing_normals_with_options`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingOptions {
    /// Multiplier applied to the bounding-box diagonal to get the tolerance.
    pub epsilon_factor: f64,
    /// Lower bound for the derived tolerance. `0.0` keeps the derived value.
    pub min_epsilon: f64,
    /// Smoothing-group compatibility rule.
    pub rule: SmoothingRule,
}

impl SmoothingOptions {
    #[must_use]
    pub fn with_rule(mut self, rule: SmoothingRule) -> Self {
        self.rule = rule;
        self
    }

    #[must_use]
    pub fn with_epsilon_factor(mut self, factor: f64) -> Self {
        self.epsilon_factor = factor;
        self
    }

    #[must_use]
    pub fn with_min_epsilon(mut self, min_epsilon: f64) -> Self {
        self.min_epsilon = min_epsilon;
        self
    }
}

impl Default for SmoothingOptions {
    fn default() -> Self {
        Self {
            epsilon_factor: Tolerance::SMOOTHING_RELATIVE.eps,
            min_epsilon: 0.0,
            rule: SmoothingRule::default(),
        }
    }
}

/// Synthesize normals with the default options.
///
/// Replaces `mesh.normals` with one normal per position. On error the mesh is
/// left untouched.
pub fn compute_smoothing_normals(
    mesh: &mut SmoothingMesh,
) -> Result<SmoothingDiagnostics, SmoothingError> {
    compute_smoothing_normals_with_options(mesh, &SmoothingOptions::default())
}

pub fn compute_smoothing_normals_with_options(
    mesh: &mut SmoothingMesh,
    options: &SmoothingOptions,
) -> Result<SmoothingDiagnostics, SmoothingError> {
    compute_smoothing_normals_with_rule(mesh, options, &options.rule)
}

/// Synthesize normals using a caller-supplied compatibility predicate.
///
/// `options.rule` is ignored in favour of `rule`.
///
/// # Example
/// ```
/// use sg_engine::geom::{
///     Point3, SmoothingFace, SmoothingMesh, SmoothingOptions,
///     compute_smoothing_normals_with_rule,
/// };
///
/// let mut mesh = SmoothingMesh::new(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///     ],
///     vec![SmoothingFace::new([0, 1, 2], 1)],
/// );
/// let exact_match = |query: u32, entry: u32| query == entry;
/// compute_smoothing_normals_with_rule(&mut mesh, &SmoothingOptions::default(), &exact_match)
///     .unwrap();
/// assert_eq!(mesh.normals.len(), 3);
/// assert_eq!(mesh.normals[0].z, 1.0);
/// ```
pub fn compute_smoothing_normals_with_rule<R>(
    mesh: &mut SmoothingMesh,
    options: &SmoothingOptions,
    rule: &R,
) -> Result<SmoothingDiagnostics, SmoothingError>
where
    R: SmoothingGroupRule + ?Sized,
{
    mesh.validate()?;

    let mut metrics = SmoothingMetrics::default();
    metrics.begin();

    let positions = &mesh.positions;
    let faces = &mesh.faces;

    let (scratch, degenerate_face_count) = metrics.time(TimingBucket::FaceNormals, || {
        flat_normal_scratch(positions, faces)
    });

    let tolerance = metrics.time(TimingBucket::Epsilon, || {
        smoothing_epsilon(positions, options.epsilon_factor).max(Tolerance::new(options.min_epsilon))
    });

    let index = metrics.time(TimingBucket::IndexBuild, || build_corner_index(positions, faces));
    let corner_entry_count = index.len();

    let (normals, max_matches_per_corner) = metrics.time(TimingBucket::Smoothing, || {
        smooth_corners(positions, faces, &scratch, &index, tolerance.eps, rule)
    });

    let unreferenced_vertex_count = mesh.unreferenced_vertex_count();
    let zero_normal_count = normals
        .iter()
        .filter(|n| n.is_zero())
        .count()
        .saturating_sub(unreferenced_vertex_count);
    let has_non_finite = positions.iter().any(|p| !p.is_finite());

    let mut diag = SmoothingDiagnostics {
        vertex_count: positions.len(),
        face_count: faces.len(),
        corner_entry_count,
        epsilon: tolerance.eps,
        degenerate_face_count,
        zero_normal_count,
        unreferenced_vertex_count,
        max_matches_per_corner,
        timing: None,
        warnings: Vec::new(),
    };

    if degenerate_face_count > 0 {
        diag.add_warning(format!(
            "{degenerate_face_count} degenerate face(s) contribute zero-length normals"
        ));
    }
    if zero_normal_count > 0 {
        diag.add_warning(format!(
            "{zero_normal_count} referenced position(s) received a zero normal"
        ));
    }
    if has_non_finite {
        diag.add_warning("mesh has non-finite vertex positions");
    }

    mesh.normals = normals;
    diag.timing = metrics.end();

    log::debug!("smoothing normals: {}", diag.summary());
    Ok(diag)
}

/// Synthesize normals for many meshes at once.
///
/// Meshes are independent, so with the `parallel` feature they are processed
/// on the rayon pool; each mesh is still handled sequentially. Results are in
/// input order.
#[cfg(feature = "parallel")]
pub fn compute_smoothing_normals_batch(
    meshes: &mut [SmoothingMesh],
    options: &SmoothingOptions,
) -> Vec<Result<SmoothingDiagnostics, SmoothingError>> {
    meshes
        .par_iter_mut()
        .map(|mesh| compute_smoothing_normals_with_options(mesh, options))
        .collect()
}

/// Synthesize normals for many meshes at once. Results are in input order.
#[cfg(not(feature = "parallel"))]
pub fn compute_smoothing_normals_batch(
    meshes: &mut [SmoothingMesh],
    options: &SmoothingOptions,
) -> Vec<Result<SmoothingDiagnostics, SmoothingError>> {
    meshes
        .iter_mut()
        .map(|mesh| compute_smoothing_normals_with_options(mesh, options))
        .collect()
}

/// Unnormalized flat normal of every face, in face order.
pub fn compute_face_normals(mesh: &SmoothingMesh) -> Result<Vec<Vec3>, SmoothingError> {
    mesh.validate()?;
    Ok(mesh
        .faces
        .iter()
        .map(|face| face_normal(&mesh.positions, face))
        .collect())
}

/// Distance tolerance for a position set: `factor` times the length of the
/// bounding-box diagonal. Zero for an empty set.
#[must_use]
pub fn smoothing_epsilon(positions: &[Point3], factor: f64) -> Tolerance {
    let diagonal = BBox::from_points(positions).map_or(0.0, BBox::diagonal);
    let tolerance = Tolerance::new(factor).relative_to(diagonal);
    if tolerance.eps.is_finite() {
        tolerance
    } else {
        Tolerance::EXACT
    }
}

fn face_normal(positions: &[Point3], face: &SmoothingFace) -> Vec3 {
    let [i0, i1, i2] = face.indices;
    let p0 = positions[i0 as usize];
    let p1 = positions[i1 as usize];
    let p2 = positions[i2 as usize];
    (p1 - p0).cross(p2 - p0)
}

/// Pass 1. Returns the per-position scratch buffer and the number of faces
/// with an exactly zero normal.
fn flat_normal_scratch(positions: &[Point3], faces: &[SmoothingFace]) -> (Vec<Vec3>, usize) {
    let mut scratch = vec![Vec3::ZERO; positions.len()];
    let mut degenerate = 0usize;

    for face in faces {
        let normal = face_normal(positions, face);
        if normal.is_zero() {
            degenerate += 1;
        }
        for &i in &face.indices {
            scratch[i as usize] = normal;
        }
    }

    (scratch, degenerate)
}

/// Pass 3.
fn build_corner_index(positions: &[Point3], faces: &[SmoothingFace]) -> SgSpatialIndex {
    let mut sort = SgSpatialSort::with_capacity(faces.len() * 3);
    for face in faces {
        for &i in &face.indices {
            sort.add(positions[i as usize], i, face.smoothing_group);
        }
    }
    sort.prepare()
}

/// Pass 4. Returns the output normals and the largest match count of any corner.
fn smooth_corners<R>(
    positions: &[Point3],
    faces: &[SmoothingFace],
    scratch: &[Vec3],
    index: &SgSpatialIndex,
    eps: f64,
    rule: &R,
) -> (Vec<Vec3>, usize)
where
    R: SmoothingGroupRule + ?Sized,
{
    let mut normals = vec![Vec3::ZERO; positions.len()];
    let mut matches = Vec::new();
    let mut max_matches = 0usize;

    for face in faces {
        for &i in &face.indices {
            index.find_positions(positions[i as usize], face.smoothing_group, eps, rule, &mut matches);
            max_matches = max_matches.max(matches.len());

            let mut sum = Vec3::ZERO;
            for &m in &matches {
                sum += scratch[m as usize];
            }
            normals[i as usize] = sum.normalized_or_zero();
        }
    }

    (normals, max_matches)
}
