use crate::basis::BasisFunctionSet;
use crate::knots::KnotVector;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplineError {
    #[error("Expected {expected} coefficients (count + order), but {found} were supplied.")]
    CoefficientLengthMismatch { expected: usize, found: usize },
}

/// A B-spline curve: a basis family plus one coefficient per basis function.
///
/// The coefficient buffer is the only mutable state and is not synchronized;
/// concurrent writers need external coordination (fit into a fresh buffer and
/// swap it in via [`Spline::set_coefficients`]).
#[derive(Debug, Clone)]
pub struct Spline {
    basis: BasisFunctionSet,
    coefficients: Vec<f64>,
}

impl Spline {
    /// Builds the basis family for `order` over `knots` and attaches the
    /// given coefficients, which must number `count + order` (storage
    /// order: index `0` holds the coefficient of the leftmost function).
    pub fn new(
        order: usize,
        knots: KnotVector,
        coefficients: Vec<f64>,
    ) -> Result<Self, SplineError> {
        let expected = knots.count() + order;
        if coefficients.len() != expected {
            return Err(SplineError::CoefficientLengthMismatch {
                expected,
                found: coefficients.len(),
            });
        }
        Ok(Self {
            basis: BasisFunctionSet::new(order, knots),
            coefficients,
        })
    }

    /// Convenience constructor with all coefficients at zero.
    pub fn zeros(order: usize, knots: KnotVector) -> Self {
        let len = knots.count() + order;
        Self {
            basis: BasisFunctionSet::new(order, knots),
            coefficients: vec![0.0; len],
        }
    }

    /// Evaluates the spline at `x` by summing the `order + 1` basis
    /// functions whose support contains the interval of `x`.
    pub fn at(&self, x: f64) -> f64 {
        let idx = self.knots().index_of(x);
        let mut acc = 0.0;
        for d in -(self.order() as i64)..=0 {
            acc += self.get_coef(idx + d) * self.basis.evaluate(idx + d, x);
        }
        acc
    }

    /// Sets the coefficient at external index `index` (internal `+order`
    /// shift). Out-of-range indices are ignored with a warning; this is a
    /// documented warning condition, not an error.
    pub fn set_coef(&mut self, index: i64, value: f64) {
        let shifted = index + self.order() as i64;
        if shifted < 0 || shifted >= self.coefficients.len() as i64 {
            log::warn!(
                "[Spline] coefficient index {index} is outside the valid range \
                 ({} functions); ignoring",
                self.coefficients.len()
            );
            return;
        }
        self.coefficients[shifted as usize] = value;
    }

    /// Coefficient at external index `index`, or `0.0` outside the valid
    /// range (both ends independently).
    pub fn get_coef(&self, index: i64) -> f64 {
        let shifted = index + self.order() as i64;
        if shifted < 0 || shifted >= self.coefficients.len() as i64 {
            return 0.0;
        }
        self.coefficients[shifted as usize]
    }

    /// The coefficient buffer in storage order.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Replaces the whole coefficient buffer (storage order); this is the
    /// installation path for solver output.
    pub fn set_coefficients(&mut self, coefficients: Vec<f64>) -> Result<(), SplineError> {
        if coefficients.len() != self.coefficients.len() {
            return Err(SplineError::CoefficientLengthMismatch {
                expected: self.coefficients.len(),
                found: coefficients.len(),
            });
        }
        self.coefficients = coefficients;
        Ok(())
    }

    pub fn order(&self) -> usize {
        self.basis.order()
    }

    pub fn knots(&self) -> &KnotVector {
        self.basis.knots()
    }

    pub fn basis(&self) -> &BasisFunctionSet {
        &self.basis
    }
}
