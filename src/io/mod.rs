//! Input/output helpers.
//!
//! - extinction curve calculation and JSON read/write (`extdata`)
//! - MCMC chain JSON read/write (`chain`)
//! - curve file lists (`filelist`)
//! - summary table export (CSV) (`export`)

pub mod chain;
pub mod export;
pub mod extdata;
pub mod filelist;

pub use chain::*;
pub use export::*;
pub use extdata::*;
pub use filelist::*;
