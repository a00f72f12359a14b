//! Discrete Laplace operators split into interior and boundary blocks.
//!
//! For an interior vertex `i` with neighbors `j`, every scheme produces
//! weights `w_ij` and the row
//!
//! ```text
//! (L x)_i = Σ_j w_ij (x_i - x_j)
//! ```
//!
//! so the diagonal holds `Σ_j w_ij`, off-diagonals hold `-w_ij`, and each
//! row sums to zero over the full vertex set. Columns of interior neighbors
//! land in `interior` (`N_int × N_int`), columns of boundary neighbors in
//! `boundary` (`N_int × N_bnd`), so that `interior·x_i + boundary·x_b` is the
//! Laplacian at every interior vertex.

use nalgebra::{DVector, Point3};
use nalgebra_sparse::CsrMatrix;

use crate::error::{MeshError, Result};
use crate::mesh::MeshTopology;

use super::linearize::VertexLinearization;
use super::sparse::{csr_from_triplets, scale_rows};

/// Lower bound of the per-row area scale for [`LaplacianWeightScheme::ClampedCotangent`].
pub const MIN_AREA_SCALE: f64 = 0.5;

/// Upper bound of the per-row area scale for [`LaplacianWeightScheme::ClampedCotangent`].
pub const MAX_AREA_SCALE: f64 = 5.0;

/// Edge weighting used to build the Laplacian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LaplacianWeightScheme {
    /// Graph Laplacian: every edge weighs 1, the diagonal is the valence.
    Uniform,
    /// Symmetrically normalized graph Laplacian: `w_ij = 1 / sqrt(d_i d_j)`.
    Umbrella,
    /// Row-normalized graph Laplacian: `w_ij = 1 / d_i`, diagonal 1.
    Valence,
    /// Area-scaled cotangent Laplace-Beltrami operator.
    Cotangent,
    /// Area-scaled cotangent operator with the per-row scale clamped to
    /// `[MIN_AREA_SCALE, MAX_AREA_SCALE]`.
    #[default]
    ClampedCotangent,
    /// Mean value weights `(tan(θ₁/2) + tan(θ₂/2)) / |p_j - p_i|`.
    MeanValue,
}

impl LaplacianWeightScheme {
    /// All schemes, in declaration order.
    pub const ALL: [LaplacianWeightScheme; 6] = [
        LaplacianWeightScheme::Uniform,
        LaplacianWeightScheme::Umbrella,
        LaplacianWeightScheme::Valence,
        LaplacianWeightScheme::Cotangent,
        LaplacianWeightScheme::ClampedCotangent,
        LaplacianWeightScheme::MeanValue,
    ];

    /// Whether the scheme depends on vertex positions.
    pub fn is_geometric(self) -> bool {
        matches!(
            self,
            Self::Cotangent | Self::ClampedCotangent | Self::MeanValue
        )
    }
}

/// Interior and boundary blocks of a Laplacian.
#[derive(Debug, Clone)]
pub struct Laplacian {
    /// Interior × interior block.
    pub interior: CsrMatrix<f64>,
    /// Interior × boundary block.
    pub boundary: CsrMatrix<f64>,
    /// Lumped vertex areas of the interior vertices (cotangent schemes only):
    /// one third of the incident triangle areas.
    pub area: Option<DVector<f64>>,
    /// Mean of `area`, reported by the area-scaled cotangent schemes.
    pub average_area: Option<f64>,
}

/// Build the Laplacian for `scheme`.
///
/// # Errors
///
/// The cotangent schemes fail with [`MeshError::DegenerateVertexArea`] when
/// an interior vertex has no positive one-ring area.
///
/// # Example
///
/// ```
/// use flexmesh::algo::deform::{construct_laplacian, LaplacianWeightScheme, VertexLinearization};
/// use flexmesh::prelude::*;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.5, 0.5, 0.0),
/// ];
/// let faces = vec![[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]];
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
///
/// let linearization = VertexLinearization::new(&mesh);
/// let laplacian =
///     construct_laplacian(LaplacianWeightScheme::Uniform, &mesh, &linearization).unwrap();
/// assert_eq!(laplacian.interior.nrows(), 1);
/// assert_eq!(laplacian.boundary.ncols(), 4);
/// ```
pub fn construct_laplacian<M: MeshTopology>(
    scheme: LaplacianWeightScheme,
    mesh: &M,
    linearization: &VertexLinearization,
) -> Result<Laplacian> {
    let laplacian = match scheme {
        LaplacianWeightScheme::Uniform => assemble(mesh, linearization, uniform_weights),
        LaplacianWeightScheme::Umbrella => assemble(mesh, linearization, umbrella_weights),
        LaplacianWeightScheme::Valence => assemble(mesh, linearization, valence_weights),
        LaplacianWeightScheme::MeanValue => assemble(mesh, linearization, mean_value_weights),
        LaplacianWeightScheme::Cotangent => {
            construct_scaled_cotangent_laplacian(mesh, linearization, false)?
        }
        LaplacianWeightScheme::ClampedCotangent => {
            construct_scaled_cotangent_laplacian(mesh, linearization, true)?
        }
    };

    log::debug!(
        "built {:?} Laplacian: {} interior x {} boundary, nnz {} + {}",
        scheme,
        laplacian.interior.nrows(),
        laplacian.boundary.ncols(),
        laplacian.interior.nnz(),
        laplacian.boundary.nnz()
    );

    Ok(laplacian)
}

/// Build the raw cotangent Laplacian, `w_ij = (cot α + cot β) / 2`, along
/// with the lumped area of every interior vertex.
pub fn construct_cotangent_laplacian<M: MeshTopology>(
    mesh: &M,
    linearization: &VertexLinearization,
) -> Laplacian {
    let mut laplacian = assemble(mesh, linearization, cotangent_weights);
    let area = linearization
        .interior_ids()
        .iter()
        .map(|&v| vertex_area(mesh, v));
    laplacian.area = Some(DVector::from_iterator(
        linearization.num_interior_verts(),
        area,
    ));
    laplacian
}

/// Build the cotangent Laplacian with every row scaled by
/// `average_area / area_i`, optionally clamped to
/// `[MIN_AREA_SCALE, MAX_AREA_SCALE]`.
///
/// The scaling turns the raw operator into a mean-curvature-normal estimate
/// and evens out the row magnitudes on irregular triangulations. The mean
/// interior area is returned in [`Laplacian::average_area`].
///
/// # Errors
///
/// Returns [`MeshError::DegenerateVertexArea`] if any interior vertex has an
/// area that is not strictly positive.
pub fn construct_scaled_cotangent_laplacian<M: MeshTopology>(
    mesh: &M,
    linearization: &VertexLinearization,
    clamp_scale: bool,
) -> Result<Laplacian> {
    let mut laplacian = construct_cotangent_laplacian(mesh, linearization);
    let area = laplacian.area.as_ref().map(|a| a.as_slice()).unwrap_or(&[]);

    // `!(a > 0.0)` also rejects NaN.
    if let Some(i) = area.iter().position(|&a| !(a > 0.0)) {
        let vertex = linearization.to_id(i);
        log::warn!("vertex {} has degenerate one-ring area {}", vertex, area[i]);
        return Err(MeshError::DegenerateVertexArea {
            vertex,
            area: area[i],
        });
    }

    let average_area = if area.is_empty() {
        0.0
    } else {
        area.iter().sum::<f64>() / area.len() as f64
    };

    let scale: Vec<f64> = area
        .iter()
        .map(|&a| {
            let s = average_area / a;
            if clamp_scale {
                s.clamp(MIN_AREA_SCALE, MAX_AREA_SCALE)
            } else {
                s
            }
        })
        .collect();

    scale_rows(&mut laplacian.interior, &scale);
    scale_rows(&mut laplacian.boundary, &scale);
    laplacian.average_area = Some(average_area);

    Ok(laplacian)
}

/// Shared row pass: emit the weighted row of every interior vertex.
fn assemble<M, F>(mesh: &M, linearization: &VertexLinearization, weights: F) -> Laplacian
where
    M: MeshTopology,
    F: Fn(&M, usize) -> Vec<(usize, f64)>,
{
    let num_interior = linearization.num_interior_verts();
    let num_boundary = linearization.num_boundary_verts();

    let mut interior = Vec::new();
    let mut boundary = Vec::new();

    for (i, &v) in linearization.interior_ids().iter().enumerate() {
        let mut diagonal = 0.0;
        for (neighbor, w) in weights(mesh, v) {
            let Some(j) = linearization.to_index(neighbor) else {
                continue;
            };
            diagonal += w;
            if j < num_interior {
                interior.push((i, j, -w));
            } else {
                boundary.push((i, j - num_interior, -w));
            }
        }
        // Isolated vertices keep an explicit zero row.
        interior.push((i, i, diagonal));
    }

    Laplacian {
        interior: csr_from_triplets(num_interior, num_interior, &interior),
        boundary: csr_from_triplets(num_interior, num_boundary, &boundary),
        area: None,
        average_area: None,
    }
}

fn uniform_weights<M: MeshTopology>(mesh: &M, v: usize) -> Vec<(usize, f64)> {
    mesh.one_ring(v).map(|n| (n, 1.0)).collect()
}

fn valence_weights<M: MeshTopology>(mesh: &M, v: usize) -> Vec<(usize, f64)> {
    let ring: Vec<usize> = mesh.one_ring(v).collect();
    let w = 1.0 / ring.len() as f64;
    ring.into_iter().map(|n| (n, w)).collect()
}

fn umbrella_weights<M: MeshTopology>(mesh: &M, v: usize) -> Vec<(usize, f64)> {
    let ring: Vec<usize> = mesh.one_ring(v).collect();
    let valence = ring.len() as f64;
    ring.into_iter()
        .map(|n| {
            let neighbor_valence = mesh.one_ring(n).count() as f64;
            (n, 1.0 / (valence * neighbor_valence).sqrt())
        })
        .collect()
}

fn cotangent_weights<M: MeshTopology>(mesh: &M, v: usize) -> Vec<(usize, f64)> {
    let mut weights = Vec::new();
    let p = mesh.vertex_position(v);

    for triangle in mesh.incident_triangles(v) {
        let Some([_, a, b]) = rotate_to_front(triangle, v) else {
            continue;
        };
        let pa = mesh.vertex_position(a);
        let pb = mesh.vertex_position(b);

        // Edge (v, a) is opposite b, edge (v, b) is opposite a.
        accumulate(&mut weights, a, 0.5 * cotangent_angle(&pb, &p, &pa));
        accumulate(&mut weights, b, 0.5 * cotangent_angle(&pa, &p, &pb));
    }

    weights
}

fn mean_value_weights<M: MeshTopology>(mesh: &M, v: usize) -> Vec<(usize, f64)> {
    let mut weights = Vec::new();
    let p = mesh.vertex_position(v);

    for triangle in mesh.incident_triangles(v) {
        let Some([_, a, b]) = rotate_to_front(triangle, v) else {
            continue;
        };
        let ea = mesh.vertex_position(a) - p;
        let eb = mesh.vertex_position(b) - p;
        let (la, lb) = (ea.norm(), eb.norm());
        if la < 1e-12 || lb < 1e-12 {
            continue;
        }

        // tan(θ/2) = sin θ / (1 + cos θ), scaled through by |ea||eb|.
        let denom = la * lb + ea.dot(&eb);
        let half_tan = if denom > 1e-12 {
            ea.cross(&eb).norm() / denom
        } else {
            0.0
        };

        accumulate(&mut weights, a, half_tan / la);
        accumulate(&mut weights, b, half_tan / lb);
    }

    weights
}

/// Lumped area of a vertex: one third of its incident triangle areas.
fn vertex_area<M: MeshTopology>(mesh: &M, v: usize) -> f64 {
    mesh.incident_triangles(v)
        .map(|[a, b, c]| {
            let pa = mesh.vertex_position(a);
            let e1 = mesh.vertex_position(b) - pa;
            let e2 = mesh.vertex_position(c) - pa;
            0.5 * e1.cross(&e2).norm()
        })
        .sum::<f64>()
        / 3.0
}

/// Compute the cotangent of the angle at vertex `a` in triangle (a, b, c).
fn cotangent_angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;

    let cross_norm = ab.cross(&ac).norm();
    if cross_norm < 1e-12 {
        return 0.0; // Degenerate triangle
    }

    ab.dot(&ac) / cross_norm
}

/// Rotate a triangle so that `v` comes first, keeping the winding.
fn rotate_to_front(triangle: [usize; 3], v: usize) -> Option<[usize; 3]> {
    let k = triangle.iter().position(|&u| u == v)?;
    Some([triangle[k], triangle[(k + 1) % 3], triangle[(k + 2) % 3]])
}

fn accumulate(weights: &mut Vec<(usize, f64)>, neighbor: usize, w: f64) {
    match weights.iter_mut().find(|(n, _)| *n == neighbor) {
        Some((_, total)) => *total += w,
        None => weights.push((neighbor, w)),
    }
}
