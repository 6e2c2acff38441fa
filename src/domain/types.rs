//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - built from CLI flags and handed to the pipeline
//! - written into saved curve/chain files
//! - reloaded later for plotting or summaries

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which model(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpec {
    P92,
    G20,
    Poly,
    All,
}

impl ModelSpec {
    pub fn kinds(self) -> Vec<ModelKind> {
        match self {
            ModelSpec::P92 => vec![ModelKind::P92],
            ModelSpec::G20 => vec![ModelKind::G20],
            ModelSpec::Poly => vec![ModelKind::PolyDrude],
            ModelSpec::All => vec![ModelKind::P92, ModelKind::G20, ModelKind::PolyDrude],
        }
    }
}

/// Concrete fitted model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    P92,
    G20,
    PolyDrude,
}

impl ModelKind {
    /// Human-readable label for terminal output (also the key in saved curves).
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::P92 => "P92",
            ModelKind::G20 => "G20",
            ModelKind::PolyDrude => "Poly+Drude",
        }
    }

    /// Iteration cap used when `--maxiter` is not given.
    pub fn default_maxiter(self) -> usize {
        match self {
            ModelKind::P92 | ModelKind::PolyDrude => 100,
            ModelKind::G20 => 1000,
        }
    }
}

/// Output format for figure files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureFormat {
    Png,
    Svg,
}

impl FigureFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FigureFormat::Png => "png",
            FigureFormat::Svg => "svg",
        }
    }
}

/// Extinction curve normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtType {
    /// E(λ - V)
    Elx,
    /// A(λ)/A(V)
    Alax,
}

impl ExtType {
    pub fn axis_label(self) -> &'static str {
        match self {
            ExtType::Elx => "E(λ - V)",
            ExtType::Alax => "A(λ)/A(V)",
        }
    }
}

/// Observed curve prepared for fitting, sorted by wavelength.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitData {
    /// Wavelength (micron).
    pub wave: Vec<f64>,
    /// Wavenumber (1/micron), `1 / wave`.
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// 1-sigma uncertainties, all > 0.
    pub unc: Vec<f64>,
}

impl FitData {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Stored MCMC samples of one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub model: String,
    pub param_names: Vec<String>,
    pub nburn: usize,
    pub seed: u64,
    /// `[walker][step][dim]`
    pub samples: Vec<Vec<Vec<f64>>>,
    /// `[walker][step]`
    pub lnprob: Vec<Vec<f64>>,
    pub acceptance_fraction: Vec<f64>,
}

impl Chain {
    pub fn nwalkers(&self) -> usize {
        self.samples.len()
    }

    pub fn nsteps(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    pub fn ndim(&self) -> usize {
        self.param_names.len()
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.param_names.iter().position(|n| n == name)
    }

    /// One parameter over all walkers, skipping the first `skip` steps of each.
    pub fn flat_param(&self, dim: usize, skip: usize) -> Vec<f64> {
        self.samples
            .iter()
            .flat_map(|walker| walker.iter().skip(skip))
            .filter_map(|s| s.get(dim).copied())
            .collect()
    }
}

/// Where figures go.
///
/// `format = None` means "show": a fixed-size ASCII preview on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureOptions {
    pub format: Option<FigureFormat>,
    /// Pixel size for file output.
    pub width: u32,
    pub height: u32,
    /// Character grid for the terminal preview.
    pub term_width: usize,
    pub term_height: usize,
}

impl Default for FigureOptions {
    fn default() -> Self {
        Self {
            format: None,
            width: 1200,
            height: 800,
            term_width: 100,
            term_height: 25,
        }
    }
}

/// A full `ext fit` run as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub red_star: String,
    pub comp_star: String,
    /// Root of the star data (`DAT_files/` and spectra live below it).
    pub data_path: PathBuf,
    pub outdir: PathBuf,
    pub model_spec: ModelSpec,
    /// Sources used for fitting (`BAND`, `IUE`, ...).
    pub sources: Vec<String>,
    pub remove_uvwind: bool,
    pub remove_lya: bool,
    /// Tie the P92 FIR amplitude to the SIL1 amplitude.
    pub tie_fir: bool,
    /// Overrides the per-model iteration cap.
    pub maxiter: Option<usize>,

    pub emcee: bool,
    pub nburn: usize,
    pub nsteps: usize,
    pub seed: u64,

    pub figures: FigureOptions,
}

impl FitConfig {
    /// Base name of every output file for this star pair.
    pub fn file_base(&self) -> PathBuf {
        self.outdir.join(format!("{}_{}", self.red_star, self.comp_star))
    }
}

/// `ext plot` options.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub curve: PathBuf,
    pub figures: FigureOptions,
}

/// `ext multi` options.
#[derive(Debug, Clone)]
pub struct MultiConfig {
    pub filelist: PathBuf,
    /// Overlay the saved P92 model of each curve.
    pub models: bool,
    /// Only draw the models (implies `models`).
    pub modonly: bool,
    /// Rebin spectra by this factor before plotting.
    pub rebin_fac: Option<usize>,
    pub figures: FigureOptions,
}

/// `ext summary` options.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub filelist: PathBuf,
    /// Fraction of each chain's steps discarded before computing statistics.
    pub burn_frac: f64,
    /// Sightlines treated as dense (plotted/flagged separately).
    pub dense: Vec<String>,
    /// Seed for the E(B-V) draws.
    pub seed: u64,
    pub figures: FigureOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_spec_expands_to_kinds() {
        assert_eq!(ModelSpec::G20.kinds(), vec![ModelKind::G20]);
        assert_eq!(ModelSpec::All.kinds().len(), 3);
        assert_eq!(ModelKind::G20.default_maxiter(), 1000);
        assert_eq!(ModelKind::P92.default_maxiter(), 100);
    }

    #[test]
    fn file_base_joins_star_names() {
        let config = FitConfig {
            red_star: "hd283809".to_string(),
            comp_star: "hd003360".to_string(),
            data_path: PathBuf::from("."),
            outdir: PathBuf::from("fits"),
            model_spec: ModelSpec::P92,
            sources: vec!["BAND".to_string()],
            remove_uvwind: true,
            remove_lya: true,
            tie_fir: false,
            maxiter: None,
            emcee: false,
            nburn: 100,
            nsteps: 500,
            seed: 42,
            figures: FigureOptions::default(),
        };
        assert_eq!(config.file_base(), PathBuf::from("fits/hd283809_hd003360"));
    }
}
