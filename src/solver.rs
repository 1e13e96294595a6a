use crate::faer_ndarray::{FaerLinalgError, cholesky_solve, fast_ata};
use crate::spline::Spline;
use ndarray::{Array1, Array2, s};
use thiserror::Error;

const SYMMETRY_REL_TOL: f64 = 1e-12;
const SYMMETRY_ABS_TOL: f64 = 1e-12;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error(
        "Penalty matrix must be {expected}x{expected} to match the basis, but was {rows}x{cols}."
    )]
    PenaltyShapeMismatch {
        expected: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Penalty matrix must be symmetric, but entries ({i},{j}) and ({j},{i}) differ.")]
    PenaltyNotSymmetric { i: usize, j: usize },

    #[error("Smoothing parameter must be finite and non-negative, but was {0}.")]
    InvalidLambda(f64),

    #[error(
        "Normal-equations matrix is not positive-definite; adjust lambda, order, or knots: {0}"
    )]
    NotPositiveDefinite(#[from] FaerLinalgError),

    #[error("Solver has not been factorized; call factorize() first.")]
    NotFactorized,

    #[error("Expected {expected} observations (one per unpadded knot), but {found} were supplied.")]
    ObservationLengthMismatch { expected: usize, found: usize },

    #[error(
        "Difference-penalty order ({order}) must be positive and less than the number of basis functions ({num_basis})."
    )]
    InvalidPenaltyOrder { order: usize, num_basis: usize },
}

/// Penalized least-squares solver for spline coefficients.
///
/// The regression matrix `B` holds every basis function evaluated at every
/// unpadded knot, so the fitted system is the normal equations
/// `(B'B + lambda * S) c = B'y` for an observation vector `y` taken at the
/// knots. [`SmoothingSolver::factorize`] reduces the system once through a
/// Cholesky factorization; [`SmoothingSolver::solve`] is then a single
/// matrix-vector product, reusable across observation vectors.
///
/// Internal matrices are write-once-then-read: changing `lambda` or the
/// penalty drops the cached reduction and requires a new `factorize` call.
#[derive(Debug, Clone)]
pub struct SmoothingSolver {
    regression: Array2<f64>,
    penalty: Option<Array2<f64>>,
    lambda: f64,
    solver_matrix: Option<Array2<f64>>,
}

impl SmoothingSolver {
    /// Builds the regression matrix from the spline's basis family. The
    /// penalty, when given, must be square over the basis dimension and
    /// symmetric; `None` means ordinary least squares.
    pub fn new(
        spline: &Spline,
        penalty: Option<Array2<f64>>,
        lambda: f64,
    ) -> Result<Self, SolverError> {
        let basis = spline.basis();
        let n = basis.knots().count();
        let num_basis = basis.len();

        validate_lambda(lambda)?;
        if let Some(p) = &penalty {
            validate_penalty(p, num_basis)?;
        }

        let mut regression = Array2::<f64>::zeros((n, num_basis));
        for i in 0..n {
            let x = basis.knots().at(i as i64);
            for j in 0..num_basis {
                regression[[i, j]] = basis.eval_storage(j, x);
            }
        }

        Ok(Self {
            regression,
            penalty,
            lambda,
            solver_matrix: None,
        })
    }

    /// The `N x (N + order)` matrix of basis evaluations at the unpadded
    /// knots.
    pub fn regression_matrix(&self) -> &Array2<f64> {
        &self.regression
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Replaces the smoothing parameter and drops the cached factorization.
    pub fn set_lambda(&mut self, lambda: f64) -> Result<(), SolverError> {
        validate_lambda(lambda)?;
        self.lambda = lambda;
        self.solver_matrix = None;
        Ok(())
    }

    /// Replaces the penalty matrix and drops the cached factorization.
    pub fn set_penalty(&mut self, penalty: Option<Array2<f64>>) -> Result<(), SolverError> {
        if let Some(p) = &penalty {
            validate_penalty(p, self.regression.ncols())?;
        }
        self.penalty = penalty;
        self.solver_matrix = None;
        Ok(())
    }

    /// Forms `B'B + lambda * S`, Cholesky-factorizes it, and stores the
    /// reusable solver matrix `(B'B + lambda * S)^-1 B'`. A system that is
    /// not positive-definite (rank-deficient regression with too small a
    /// penalty) is fatal for this configuration: retrying with the same
    /// inputs cannot succeed, the caller must adjust lambda, order, or
    /// knots.
    pub fn factorize(&mut self) -> Result<(), SolverError> {
        let mut m = fast_ata(&self.regression);
        if let Some(p) = &self.penalty {
            if self.lambda != 0.0 {
                m.scaled_add(self.lambda, p);
            }
        }
        let bt = self.regression.t().to_owned();
        let solver_matrix = cholesky_solve(&m, &bt)?;
        self.solver_matrix = Some(solver_matrix);
        Ok(())
    }

    /// Coefficients for one observation vector (one value per unpadded
    /// knot): a single matrix-vector product against the reduced system.
    pub fn solve(&self, observations: &[f64]) -> Result<Array1<f64>, SolverError> {
        let solver_matrix = self
            .solver_matrix
            .as_ref()
            .ok_or(SolverError::NotFactorized)?;
        let n = self.regression.nrows();
        if observations.len() != n {
            return Err(SolverError::ObservationLengthMismatch {
                expected: n,
                found: observations.len(),
            });
        }
        let y = Array1::from_iter(observations.iter().copied());
        Ok(solver_matrix.dot(&y))
    }
}

fn validate_lambda(lambda: f64) -> Result<(), SolverError> {
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(SolverError::InvalidLambda(lambda));
    }
    Ok(())
}

fn validate_penalty(penalty: &Array2<f64>, num_basis: usize) -> Result<(), SolverError> {
    let (rows, cols) = penalty.dim();
    if rows != num_basis || cols != num_basis {
        return Err(SolverError::PenaltyShapeMismatch {
            expected: num_basis,
            rows,
            cols,
        });
    }
    for i in 0..rows {
        for j in (i + 1)..cols {
            let a = penalty[[i, j]];
            let b = penalty[[j, i]];
            let scale = a.abs().max(b.abs());
            if (a - b).abs() > SYMMETRY_ABS_TOL + SYMMETRY_REL_TOL * scale {
                return Err(SolverError::PenaltyNotSymmetric { i, j });
            }
        }
    }
    Ok(())
}

/// Difference roughness penalty `S = D'D`, penalizing squared `order`-th
/// differences of adjacent spline coefficients.
pub fn difference_penalty(num_basis: usize, order: usize) -> Result<Array2<f64>, SolverError> {
    if order == 0 || order >= num_basis {
        return Err(SolverError::InvalidPenaltyOrder { order, num_basis });
    }

    // Apply the differencing operation `order` times; each pass drops a row.
    let mut d = Array2::<f64>::eye(num_basis);
    for _ in 0..order {
        d = &d.slice(s![1.., ..]) - &d.slice(s![..-1, ..]);
    }
    Ok(d.t().dot(&d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knots::KnotVector;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn test_spline() -> Spline {
        let knots = KnotVector::uniform(0.0, 1.0, 10, 3).unwrap();
        Spline::zeros(3, knots)
    }

    #[test]
    fn test_regression_matrix_shape_and_row_sums() {
        let spline = test_spline();
        let solver = SmoothingSolver::new(&spline, None, 0.0).unwrap();
        let b = solver.regression_matrix();
        assert_eq!(b.dim(), (11, 14));
        // Partition of unity at every unpadded knot.
        for i in 0..11 {
            let row_sum: f64 = b.row(i).sum();
            assert_abs_diff_eq!(row_sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_regression_matrix_is_banded() {
        // At knot i only the `order` functions with storage columns
        // i .. i + order - 1 are nonzero: the function whose support starts
        // at knot i vanishes at its own left endpoint.
        let spline = test_spline();
        let solver = SmoothingSolver::new(&spline, None, 0.0).unwrap();
        let b = solver.regression_matrix();
        for i in 0..11usize {
            for j in 0..14usize {
                let inside = j >= i && j < i + 3;
                if !inside {
                    assert_abs_diff_eq!(b[[i, j]], 0.0, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_penalty_validation() {
        let spline = test_spline();
        let wrong_shape = Array2::<f64>::eye(5);
        assert!(matches!(
            SmoothingSolver::new(&spline, Some(wrong_shape), 1.0),
            Err(SolverError::PenaltyShapeMismatch { .. })
        ));

        let mut asymmetric = Array2::<f64>::eye(14);
        asymmetric[[0, 1]] = 1.0;
        assert!(matches!(
            SmoothingSolver::new(&spline, Some(asymmetric), 1.0),
            Err(SolverError::PenaltyNotSymmetric { .. })
        ));

        assert!(matches!(
            SmoothingSolver::new(&spline, None, -1.0),
            Err(SolverError::InvalidLambda(_))
        ));
        assert!(matches!(
            SmoothingSolver::new(&spline, None, f64::NAN),
            Err(SolverError::InvalidLambda(_))
        ));
    }

    #[test]
    fn test_solve_requires_factorization() {
        let spline = test_spline();
        let solver = SmoothingSolver::new(&spline, None, 0.0).unwrap();
        assert!(matches!(
            solver.solve(&vec![0.0; 11]),
            Err(SolverError::NotFactorized)
        ));
    }

    #[test]
    fn test_observation_length_is_checked() {
        let spline = test_spline();
        let penalty = Array2::<f64>::eye(14);
        let mut solver = SmoothingSolver::new(&spline, Some(penalty), 1.0).unwrap();
        solver.factorize().unwrap();
        assert!(matches!(
            solver.solve(&vec![0.0; 10]),
            Err(SolverError::ObservationLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_setting_lambda_invalidates_factorization() {
        let spline = test_spline();
        let penalty = Array2::<f64>::eye(14);
        let mut solver = SmoothingSolver::new(&spline, Some(penalty), 1.0).unwrap();
        solver.factorize().unwrap();
        assert!(solver.solve(&vec![0.0; 11]).is_ok());

        solver.set_lambda(2.0).unwrap();
        assert!(matches!(
            solver.solve(&vec![0.0; 11]),
            Err(SolverError::NotFactorized)
        ));
    }

    #[test]
    fn test_unpenalized_system_is_rank_deficient() {
        // The last basis column is identically zero at the unpadded knots,
        // so B'B alone can never be positive-definite.
        let spline = test_spline();
        let mut solver = SmoothingSolver::new(&spline, None, 0.0).unwrap();
        assert!(matches!(
            solver.factorize(),
            Err(SolverError::NotPositiveDefinite(_))
        ));
    }

    #[test]
    fn test_difference_penalty_second_order() {
        let s = difference_penalty(5, 2).unwrap();
        assert_eq!(s.dim(), (5, 5));
        let expected = array![
            [1., -2., 1., 0., 0.],
            [-2., 5., -4., 1., 0.],
            [1., -4., 6., -4., 1.],
            [0., 1., -4., 5., -2.],
            [0., 0., 1., -2., 1.]
        ];
        assert_abs_diff_eq!(
            s.as_slice().unwrap(),
            expected.as_slice().unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_difference_penalty_rejects_bad_order() {
        assert!(matches!(
            difference_penalty(5, 0),
            Err(SolverError::InvalidPenaltyOrder { .. })
        ));
        assert!(matches!(
            difference_penalty(5, 5),
            Err(SolverError::InvalidPenaltyOrder { .. })
        ));
    }
}
