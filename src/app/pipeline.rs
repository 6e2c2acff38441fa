//! Shared "fit pipeline" logic behind `ext fit`.
//!
//! Keeping this in one place avoids mixing the core workflow with printing:
//! star files -> E(λ - V) curve -> least-squares fits -> selection ->
//! optional MCMC -> saved curve (and chain)
//!
//! The app layer then focuses on presentation (reports and figures).

use std::path::PathBuf;

use plotters::style::{BLACK, BLUE, RED};

use crate::data::StarData;
use crate::domain::{FitConfig, FitData};
use crate::error::AppError;
use crate::fit::{FitSelection, McmcFit, McmcOptions, SelectionOptions, fit_and_select, sample_posterior};
use crate::io::{ExtData, write_chain_json};
use crate::models::CurveModel;
use crate::plot::FitFigure;
use crate::plot::figure::palette;
use crate::plot::multi::OVERLAY_MODEL;

/// All computed outputs of a single `ext fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ext: ExtData,
    pub data: FitData,
    pub selection: FitSelection,
    pub mcmc: Option<McmcFit>,
    pub curve_path: PathBuf,
    pub chain_path: Option<PathBuf>,
}

impl RunOutput {
    /// Model whose parameters end up in the curve's `AV` column.
    pub fn final_model(&self) -> &CurveModel {
        match &self.mcmc {
            Some(m) => &m.model,
            None => &self.selection.best().lsq.model,
        }
    }
}

/// Execute the full fitting pipeline and write the curve (and chain) files.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    // 1) Load both stars.
    let red = StarData::load(&config.data_path, &config.red_star)?;
    let comp = StarData::load(&config.data_path, &config.comp_star)?;

    // 2) E(λ - V) and the points used in the fit.
    let mut ext = ExtData::calc_elx(&red, &comp)?;
    let data = ext.fit_data(&config.sources, config.remove_uvwind, config.remove_lya)?;
    log::info!("{} points from [{}]", data.len(), config.sources.join(", "));

    // 3) Least squares for each requested model.
    let selection = fit_and_select(
        &data,
        &config.model_spec.kinds(),
        &SelectionOptions {
            tie_fir: config.tie_fir,
            maxiter: config.maxiter,
        },
    )?;

    // 4) Optional MCMC around the preferred fit.
    let mcmc = if config.emcee {
        let best = selection.best();
        let opts = McmcOptions {
            nburn: config.nburn,
            nsteps: config.nsteps,
            seed: config.seed,
        };
        Some(sample_posterior(&best.lsq.model, &data, None, &opts)?)
    } else {
        None
    };

    // 5) Save.
    let best_kind = selection.best().kind;
    for fit in &selection.fits {
        let sampled = mcmc.as_ref().filter(|_| fit.kind == best_kind);
        ext.set_fit(fit.kind.display_name(), &fit.lsq.model, &fit.lsq.uncertainties, sampled);
    }
    set_av_column(&mut ext, &selection, mcmc.as_ref());

    std::fs::create_dir_all(&config.outdir).map_err(|e| {
        AppError::new(2, format!("Failed to create output directory '{}': {e}", config.outdir.display()))
    })?;
    let base = config.file_base();
    let curve_path = PathBuf::from(format!("{}_ext.json", base.display()));
    ext.save(&curve_path)?;
    log::info!("wrote {}", curve_path.display());

    let chain_path = match &mcmc {
        Some(m) => {
            let path = PathBuf::from(format!("{}_chain.json", base.display()));
            write_chain_json(&path, &m.chain)?;
            log::info!("wrote {}", path.display());
            Some(path)
        }
        None => None,
    };

    Ok(RunOutput {
        ext,
        data,
        selection,
        mcmc,
        curve_path,
        chain_path,
    })
}

fn set_av_column(ext: &mut ExtData, selection: &FitSelection, mcmc: Option<&McmcFit>) {
    let best = &selection.best().lsq;
    let (av, unc) = match mcmc {
        Some(m) => {
            let sampled = m.params.iter().find(|p| p.name == "Av");
            (m.model.av(), sampled.map(|p| 0.5 * (p.plus + p.minus)))
        }
        None => (best.model.av(), best.uncertainty("Av")),
    };
    match av {
        Some(av) => ext.set_av(av, unc),
        None => log::warn!("{}: model has no A(V) parameter", best.model.name),
    }
}

fn pair_title(ext: &ExtData) -> String {
    let stem = |f: &str| {
        std::path::Path::new(f)
            .file_stem()
            .map_or_else(|| f.to_string(), |s| s.to_string_lossy().into_owned())
    };
    format!("{} / {}", stem(&ext.red_file), stem(&ext.comp_file))
}

/// Fit figure for a finished run: initial guess, every fit, the MCMC model
/// and the components of the final model.
pub fn run_figure(run: &RunOutput) -> Result<FitFigure, AppError> {
    let best = run.selection.best();
    let mut fig = FitFigure::new(pair_title(&run.ext), &run.ext).with_model(
        "Initial guess",
        &best.lsq.initial,
        BLACK,
        0.25,
        ':',
    )?;
    for fit in &run.selection.fits {
        let color = if fit.kind == best.kind { RED } else { BLUE };
        fig = fig.with_model(format!("{} fit", fit.kind.display_name()), &fit.lsq.model, color, 0.7, '-')?;
    }
    if let Some(m) = &run.mcmc {
        fig = fig.with_model(format!("{} MCMC", best.kind.display_name()), &m.model, BLUE, 1.0, '=')?;
    }
    let final_model = run.final_model();
    Ok(fig.with_components(final_model)?.with_av(final_model.av()))
}

/// Fit figure for a saved curve: every saved model, with the components of
/// the P92 fit (or the first saved one).
pub fn saved_figure(ext: &ExtData) -> Result<FitFigure, AppError> {
    let mut fig = FitFigure::new(pair_title(ext), ext);
    for (i, (key, saved)) in ext.fits.iter().enumerate() {
        fig = fig.with_model(key.as_str(), &saved.model, palette(i + 1), 1.0, '-')?;
    }
    let primary = ext
        .saved_model(OVERLAY_MODEL)
        .or_else(|| ext.fits.values().next().map(|f| &f.model));
    match primary {
        Some(model) => {
            let av = ext.column("AV").or_else(|| model.av());
            Ok(fig.with_components(model)?.with_av(av))
        }
        None => {
            log::warn!("no saved fits in curve; plotting data only");
            Ok(fig.with_av(ext.column("AV")))
        }
    }
}
