use faer::linalg::solvers::{self, Llt as FaerLlt, Solve as FaerSolve};
use faer::{Mat, MatRef, Side};
use ndarray::Array2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaerLinalgError {
    #[error("Cholesky factorization failed: {0:?}")]
    Cholesky(solvers::LltError),
}

pub fn array2_to_mat(array: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(array.nrows(), array.ncols(), |i, j| array[[i, j]])
}

pub fn mat_to_array2(mat: MatRef<'_, f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((mat.nrows(), mat.ncols()));
    for j in 0..mat.ncols() {
        for i in 0..mat.nrows() {
            out[[i, j]] = mat[(i, j)];
        }
    }
    out
}

/// Compute A^T * A, dispatching to faer's GEMM for moderate+ sizes.
pub fn fast_ata(a: &Array2<f64>) -> Array2<f64> {
    use faer::linalg::matmul::matmul;
    use faer::{Accum, Par};

    // Stay on ndarray for tiny products to avoid conversion overhead.
    const MIN_DIM: usize = 32;
    let (n, p) = a.dim();
    if n < MIN_DIM && p < MIN_DIM {
        return a.t().dot(a);
    }

    let am = array2_to_mat(a);
    let mut result = Mat::<f64>::zeros(p, p);
    matmul(
        result.as_mut(),
        Accum::Replace,
        am.as_ref().transpose(),
        am.as_ref(),
        1.0,
        Par::Seq,
    );
    mat_to_array2(result.as_ref())
}

/// Cholesky-factorize a symmetric positive-definite `matrix` and solve
/// against a multi-column right-hand side in one pass. The factorization
/// error surfaces verbatim so callers can report non-positive-definite
/// systems distinctly.
pub fn cholesky_solve(
    matrix: &Array2<f64>,
    rhs: &Array2<f64>,
) -> Result<Array2<f64>, FaerLinalgError> {
    let m = array2_to_mat(matrix);
    let llt = FaerLlt::new(m.as_ref(), Side::Lower).map_err(FaerLinalgError::Cholesky)?;
    let b = array2_to_mat(rhs);
    let solution = llt.solve(b.as_ref());
    Ok(mat_to_array2(solution.as_ref()))
}
