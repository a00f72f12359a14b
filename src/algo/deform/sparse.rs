//! Sparse matrix helpers and a conjugate gradient solver.
//!
//! Matrices are `nalgebra_sparse` CSR matrices assembled from
//! `(row, col, value)` triplets. Duplicate entries at the same position are
//! summed during assembly.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::{MeshError, Result};

/// Assemble a CSR matrix from triplets, summing duplicates.
pub(crate) fn csr_from_triplets(
    rows: usize,
    cols: usize,
    triplets: &[(usize, usize, f64)],
) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(rows, cols);
    for &(row, col, val) in triplets {
        coo.push(row, col, val);
    }
    CsrMatrix::from(&coo)
}

/// Compute `Aᵀ·A`.
pub(crate) fn normal_matrix(a: &CsrMatrix<f64>) -> CsrMatrix<f64> {
    let at = a.transpose();
    &at * a
}

/// Return `A + diag`, where `diag` lists `(index, value)` pairs.
pub(crate) fn add_diagonal(a: &CsrMatrix<f64>, diag: &[(usize, f64)]) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(a.nrows(), a.ncols());
    for (row, col, &val) in a.triplet_iter() {
        coo.push(row, col, val);
    }
    for &(i, val) in diag {
        coo.push(i, i, val);
    }
    CsrMatrix::from(&coo)
}

/// Left-multiply by a diagonal matrix: row `i` is scaled by `scale[i]`.
pub(crate) fn scale_rows(a: &mut CsrMatrix<f64>, scale: &[f64]) {
    assert_eq!(a.nrows(), scale.len(), "Scale dimension mismatch");

    let (row_offsets, _, values) = a.csr_data_mut();
    for (row, &s) in scale.iter().enumerate() {
        for value in &mut values[row_offsets[row]..row_offsets[row + 1]] {
            *value *= s;
        }
    }
}

/// Multiply matrix by vector: `y = A·x`.
pub(crate) fn mul_vec(a: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    assert_eq!(x.len(), a.ncols(), "Vector dimension mismatch");

    let mut y = DVector::zeros(a.nrows());
    for (i, row) in a.row_iter().enumerate() {
        y[i] = row
            .col_indices()
            .iter()
            .zip(row.values())
            .map(|(&j, &v)| v * x[j])
            .sum();
    }
    y
}

/// Multiply matrix by every column of `x`.
pub(crate) fn mul_columns(a: &CsrMatrix<f64>, x: &DMatrix<f64>) -> DMatrix<f64> {
    let mut y = DMatrix::zeros(a.nrows(), x.ncols());
    for c in 0..x.ncols() {
        let column = mul_vec(a, &x.column(c).into_owned());
        y.set_column(c, &column);
    }
    y
}

/// Solve `A·x = b` with the conjugate gradient method, starting from the
/// current contents of `x`.
///
/// Requires `A` to be symmetric positive definite. On success returns the
/// number of iterations used. On failure `x` holds the last iterate, which
/// callers may still use as a best-effort answer.
///
/// # Errors
///
/// Returns [`MeshError::ConvergenceFailed`] with the number of iterations
/// actually run if the relative residual does not drop below `tolerance`
/// within `max_iter` iterations, or earlier if the search direction falls
/// into the null space of `a`.
pub(crate) fn conjugate_gradient(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    max_iter: usize,
    tolerance: f64,
) -> Result<usize> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "Matrix-vector dimension mismatch");
    assert_eq!(a.ncols(), n, "Matrix must be square");
    assert_eq!(x.len(), n, "Initial guess dimension mismatch");

    let b_norm = b.norm();
    if b_norm < 1e-15 {
        x.fill(0.0);
        return Ok(0);
    }

    // r = b - A*x
    let mut r = b - mul_vec(a, x);
    let mut r_norm_sq = r.dot(&r);
    if r_norm_sq.sqrt() / b_norm < tolerance {
        return Ok(0);
    }

    let mut p = r.clone();
    let mut iterations = 0;

    for iter in 0..max_iter {
        let ap = mul_vec(a, &p);

        let p_ap = p.dot(&ap);
        if p_ap.abs() < 1e-300 {
            // Search direction in the null space: singular system.
            log::debug!("conjugate gradient broke down after {} iterations", iter);
            break;
        }
        iterations = iter + 1;
        let alpha = r_norm_sq / p_ap;

        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        let new_r_norm_sq = r.dot(&r);
        if new_r_norm_sq.sqrt() / b_norm < tolerance {
            return Ok(iter + 1);
        }

        let beta = new_r_norm_sq / r_norm_sq;
        p = &r + beta * &p;
        r_norm_sq = new_r_norm_sq;
    }

    Err(MeshError::ConvergenceFailed { iterations })
}
