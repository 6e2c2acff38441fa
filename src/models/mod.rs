//! Extinction curve models.
//!
//! Shapes are small, pure functions; parameters and composition sit on top so
//! fitting and sampling code can stay generic.

pub mod model;
pub mod params;
pub mod presets;
pub mod shapes;

pub use model::*;
pub use params::*;
pub use presets::*;
