//! Command-line parsing for the extinction curve fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code. Each subcommand's flags are converted into the plain
//! config types in [`crate::domain`] before anything runs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    FigureFormat, FigureOptions, FitConfig, ModelSpec, MultiConfig, PlotConfig, SummaryConfig,
};
use crate::error::AppError;
use crate::io::canonical_source;
use crate::report::summary::{DEFAULT_BURN_FRAC, DEFAULT_DENSE};

/// Environment variable holding the default star data directory.
pub const DATA_PATH_ENV: &str = "EXTSTAR_DATA_PATH";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ext", version, about = "Dust extinction curve fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute the extinction curve of a star pair, fit models and optionally sample them.
    Fit(FitArgs),
    /// Plot a previously saved curve file with its saved models.
    Plot(PlotArgs),
    /// Plot many saved curves on one UV / mid-IR figure.
    Multi(MultiArgs),
    /// Silicate feature statistics over saved curves and chains.
    Summary(SummaryArgs),
}

/// Figure output flags shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct FigureArgs {
    /// Write figures as PNG files.
    #[arg(long, conflicts_with = "svg")]
    pub png: bool,

    /// Write figures as SVG files.
    #[arg(long)]
    pub svg: bool,

    /// Figure width in pixels.
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels.
    #[arg(long, default_value_t = 800)]
    pub height: u32,
}

impl FigureArgs {
    pub fn options(&self) -> FigureOptions {
        let format = if self.png {
            Some(FigureFormat::Png)
        } else if self.svg {
            Some(FigureFormat::Svg)
        } else {
            None
        };
        FigureOptions {
            format,
            width: self.width,
            height: self.height,
            ..FigureOptions::default()
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Reddened star.
    pub red_star: String,

    /// Comparison (unreddened) star.
    pub comp_star: String,

    /// Star data directory [default: $EXTSTAR_DATA_PATH or .]
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Directory for curve, chain and figure files.
    #[arg(long, default_value = ".")]
    pub outdir: PathBuf,

    /// Which model(s) to fit.
    #[arg(long, value_enum, default_value_t = ModelSpec::P92)]
    pub model: ModelSpec,

    /// Sources used in the fit.
    #[arg(long, value_delimiter = ',', default_value = "BAND,IUE,IRS")]
    pub sources: Vec<String>,

    /// Keep the IUE points in the stellar wind windows.
    #[arg(long)]
    pub keep_uvwind: bool,

    /// Keep the IUE points around Lyman alpha.
    #[arg(long)]
    pub keep_lya: bool,

    /// Tie the P92 FIR amplitude to the SIL1 amplitude.
    #[arg(long)]
    pub tie_fir: bool,

    /// Least-squares iteration cap (default depends on the model).
    #[arg(long)]
    pub maxiter: Option<usize>,

    /// Refine the preferred fit with the ensemble sampler.
    #[arg(long)]
    pub emcee: bool,

    /// Burn-in steps per walker.
    #[arg(long, default_value_t = 100)]
    pub nburn: usize,

    /// Production steps per walker.
    #[arg(long, default_value_t = 500)]
    pub nsteps: usize,

    /// Worker threads for walker evaluation (default: all cores).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Sampler seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[command(flatten)]
    pub figures: FigureArgs,
}

#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Curve file produced by `ext fit`.
    #[arg(value_name = "CURVE")]
    pub curve: PathBuf,

    #[command(flatten)]
    pub figures: FigureArgs,
}

#[derive(Debug, Args, Clone)]
pub struct MultiArgs {
    /// File listing one curve file per line.
    pub filelist: PathBuf,

    /// Overlay each curve's saved P92 model.
    #[arg(long)]
    pub models: bool,

    /// Only draw the saved models.
    #[arg(long)]
    pub modonly: bool,

    /// Rebin spectra by this factor.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub rebin_fac: Option<u64>,

    #[command(flatten)]
    pub figures: FigureArgs,
}

#[derive(Debug, Args, Clone)]
pub struct SummaryArgs {
    /// File listing one curve file per line (chains are found next to them).
    pub filelist: PathBuf,

    /// Fraction of each chain discarded as burn-in.
    #[arg(long, default_value_t = DEFAULT_BURN_FRAC)]
    pub burn_frac: f64,

    /// Sightline treated as dense (repeatable).
    #[arg(long)]
    pub dense: Vec<String>,

    /// Seed for the E(B-V) draws.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[command(flatten)]
    pub figures: FigureArgs,
}

/// Resolve the star data directory: flag, then environment, then `.`.
pub fn resolve_data_path(flag: Option<&PathBuf>, env: Option<String>) -> PathBuf {
    match (flag, env) {
        (Some(p), _) => p.clone(),
        (None, Some(e)) if !e.trim().is_empty() => PathBuf::from(e.trim()),
        _ => PathBuf::from("."),
    }
}

/// Source names in their stored spelling (`spex_sxd` -> `SpeX_SXD`).
pub fn resolve_sources(names: &[String]) -> Result<Vec<String>, AppError> {
    names
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            canonical_source(s)
                .map(str::to_string)
                .ok_or_else(|| AppError::new(2, format!("Unknown source '{}'.", s.trim())))
        })
        .collect()
}

pub fn fit_config_from_args(args: &FitArgs, env_path: Option<String>) -> Result<FitConfig, AppError> {
    Ok(FitConfig {
        red_star: args.red_star.clone(),
        comp_star: args.comp_star.clone(),
        data_path: resolve_data_path(args.path.as_ref(), env_path),
        outdir: args.outdir.clone(),
        model_spec: args.model,
        sources: resolve_sources(&args.sources)?,
        remove_uvwind: !args.keep_uvwind,
        remove_lya: !args.keep_lya,
        tie_fir: args.tie_fir,
        maxiter: args.maxiter,
        emcee: args.emcee,
        nburn: args.nburn,
        nsteps: args.nsteps,
        seed: args.seed,
        figures: args.figures.options(),
    })
}

pub fn plot_config_from_args(args: &PlotArgs) -> PlotConfig {
    PlotConfig {
        curve: args.curve.clone(),
        figures: args.figures.options(),
    }
}

pub fn multi_config_from_args(args: &MultiArgs) -> MultiConfig {
    MultiConfig {
        filelist: args.filelist.clone(),
        models: args.models,
        modonly: args.modonly,
        rebin_fac: args.rebin_fac.map(|f| f as usize),
        figures: args.figures.options(),
    }
}

pub fn summary_config_from_args(args: &SummaryArgs) -> SummaryConfig {
    let dense = if args.dense.is_empty() {
        DEFAULT_DENSE.iter().map(|s| s.to_string()).collect()
    } else {
        args.dense.clone()
    };
    SummaryConfig {
        filelist: args.filelist.clone(),
        burn_frac: args.burn_frac,
        dense,
        seed: args.seed,
        figures: args.figures.options(),
    }
}
