//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model selection enums (`ModelSpec`, `ModelKind`)
//! - figure output options (`FigureFormat`, `FigureOptions`)
//! - per-subcommand run configuration (`FitConfig`, `MultiConfig`, ...)

pub mod types;

pub use types::*;
