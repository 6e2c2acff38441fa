//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - weighted Levenberg–Marquardt fits of each model (`lsq`)
//! - model comparison with BIC (`selection`)
//! - bounded log-probability and ensemble MCMC (`posterior`, `ensemble`, `sampling`)

pub mod ensemble;
pub mod lsq;
pub mod posterior;
pub mod sampling;
pub mod selection;

pub use ensemble::*;
pub use lsq::*;
pub use posterior::*;
pub use sampling::*;
pub use selection::*;
