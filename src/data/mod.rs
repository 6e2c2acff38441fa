//! Stellar observations: band photometry and spectra.

pub mod star;

pub use star::*;
