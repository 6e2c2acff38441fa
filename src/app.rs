//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - sets up logging and the `.env` environment
//! - parses CLI arguments
//! - runs the fit pipeline or loads saved curves
//! - prints reports and writes figures

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{Command, FitArgs, MultiArgs, PlotArgs, SummaryArgs};
use crate::error::AppError;
use crate::io::{ExtData, sibling_output, write_summary_csv};
use crate::plot::{MultiFigure, SummaryFigure, TriangleFigure, WalkerFigure, output_figure};

pub mod pipeline;

/// Entry point for the `ext` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Plot(args) => handle_plot(args),
        Command::Multi(args) => handle_multi(args),
        Command::Summary(args) => handle_summary(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| AppError::new(2, format!("Failed to start {threads} worker threads: {e}")))?;
    }
    let env_path = std::env::var(crate::cli::DATA_PATH_ENV).ok();
    let config = crate::cli::fit_config_from_args(&args, env_path)?;
    let run = pipeline::run_fit(&config)?;

    println!("{}", crate::report::format_run_header(&config, &run.ext, &run.data));
    if run.selection.fits.len() > 1 || !run.selection.skipped.is_empty() {
        println!("{}", crate::report::format_model_comparison(&run.selection));
    }
    println!("{}", crate::report::format_parameters(&run.selection.best().lsq));
    if let Some(mcmc) = &run.mcmc {
        println!("{}", crate::report::format_mcmc(mcmc));
    }
    println!("Saved curve: {}", run.curve_path.display());
    if let Some(path) = &run.chain_path {
        println!("Saved chain: {}", path.display());
    }

    let base = config.file_base();
    output_figure(&pipeline::run_figure(&run)?, &suffixed(&base, "_ext"), &config.figures)?;
    if let Some(mcmc) = &run.mcmc {
        let chain = &mcmc.chain;
        output_figure(
            &WalkerFigure { chain },
            &suffixed(&base, "_walker_param_values"),
            &config.figures,
        )?;
        output_figure(
            &TriangleFigure { chain, skip: 0 },
            &suffixed(&base, "_param_triangle"),
            &config.figures,
        )?;
    }
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let config = crate::cli::plot_config_from_args(&args);
    let ext = ExtData::load(&config.curve)?;
    let figure = pipeline::saved_figure(&ext)?;
    output_figure(&figure, &config.curve.with_extension(""), &config.figures)?;
    Ok(())
}

fn handle_multi(args: MultiArgs) -> Result<(), AppError> {
    let config = crate::cli::multi_config_from_args(&args);
    let figure = MultiFigure::load(&config)?;
    let base = sibling_output(&config.filelist, "_mext_uv_mir", "");
    output_figure(&figure, &base, &config.figures)?;
    Ok(())
}

fn handle_summary(args: SummaryArgs) -> Result<(), AppError> {
    let config = crate::cli::summary_config_from_args(&args);
    let rows = crate::report::summarize_filelist(&config)?;

    let csv_path = sibling_output(&config.filelist, "_silicate", "csv");
    write_summary_csv(&csv_path, &rows)?;
    println!("{}", crate::report::format_summary_table(&rows));
    println!("Saved table: {}", csv_path.display());

    let base = sibling_output(&config.filelist, "_silicate", "");
    output_figure(&SummaryFigure { rows: &rows }, &base, &config.figures)?;
    Ok(())
}

/// `{base}{suffix}` without touching any extension-like part of `base`.
fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{suffix}", base.display()))
}
