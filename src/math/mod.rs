//! Numerical utilities: linear solves, Levenberg–Marquardt, sample statistics.

pub mod lm;
pub mod ols;
pub mod stats;

pub use lm::*;
pub use ols::*;
pub use stats::*;
