#![deny(dead_code)]
#![deny(unused_imports)]

pub mod basis;
pub mod faer_ndarray;
pub mod knots;
pub mod solver;
pub mod spline;

pub use basis::{BasisFunction, BasisFunctionSet};
pub use knots::{ArbitraryKnotBuilder, KnotError, KnotVector};
pub use solver::{SmoothingSolver, SolverError, difference_penalty};
pub use spline::{Spline, SplineError};
