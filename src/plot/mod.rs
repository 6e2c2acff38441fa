//! Figures.
//!
//! - terminal previews (`ascii`)
//! - Plotters output and the [`Figure`] trait (`figure`)
//! - fit, MCMC, multi-curve and summary figures

pub mod ascii;
pub mod chains;
pub mod figure;
pub mod fit;
pub mod multi;
pub mod summary;

pub use chains::{TriangleFigure, WalkerFigure};
pub use figure::{Figure, figure_path, output_figure};
pub use fit::FitFigure;
pub use multi::MultiFigure;
pub use summary::SummaryFigure;
