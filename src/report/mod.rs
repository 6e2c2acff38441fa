//! Reporting: terminal tables and per-sightline summary statistics.

pub mod format;
pub mod summary;

pub use format::*;
pub use summary::*;
