//! Fit every requested model and compare them with BIC.
//!
//! For each model kind we compute χ², reduced χ² and
//! `BIC = n ln(χ²/n) + k ln(n)` (k = free parameters).
//!
//! Selection rules:
//! 1. Skip underdetermined models: require `n >= k + 5`
//! 2. Choose the model with minimum BIC
//! 3. If ΔBIC <= 2 between the best and a model with fewer free parameters,
//!    pick the simpler model

use crate::domain::{FitData, ModelKind};
use crate::error::AppError;
use crate::fit::lsq::{LsqFit, fit_least_squares};
use crate::math::LmOptions;
use crate::models::{PresetOptions, av_guess, initial_model};

/// Minimum number of extra observations beyond parameter count.
const MIN_N_BUFFER: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionOptions {
    pub tie_fir: bool,
    /// Overrides [`ModelKind::default_maxiter`].
    pub maxiter: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ModelFit {
    pub kind: ModelKind,
    pub lsq: LsqFit,
}

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    /// Fits for all attempted models, in request order.
    pub fits: Vec<ModelFit>,
    best: usize,
    /// Models that were skipped and why.
    pub skipped: Vec<(ModelKind, String)>,
    /// Initial A(V) used by every model.
    pub av_guess: f64,
}

impl FitSelection {
    pub fn best(&self) -> &ModelFit {
        &self.fits[self.best]
    }
}

/// Fit each kind in `kinds` to `data` and pick the preferred one.
pub fn fit_and_select(
    data: &FitData,
    kinds: &[ModelKind],
    opts: &SelectionOptions,
) -> Result<FitSelection, AppError> {
    let n = data.len();
    let av = av_guess(&data.wave, &data.y);
    log::info!("initial A(V) guess: {av:.3}");

    let mut fits = Vec::new();
    let mut skipped = Vec::new();

    for &kind in kinds {
        let initial = initial_model(
            kind,
            PresetOptions {
                av_guess: av,
                tie_fir: opts.tie_fir,
            },
        )?;
        let k = initial.params.free_indices().len();
        if n < k + MIN_N_BUFFER {
            skipped.push((
                kind,
                format!("Underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER),
            ));
            continue;
        }

        let lm = LmOptions {
            maxiter: opts.maxiter.unwrap_or(kind.default_maxiter()),
            ..LmOptions::default()
        };
        log::info!("fitting {} ({k} free parameters, maxiter {})", kind.display_name(), lm.maxiter);
        let lsq = fit_least_squares(&initial, data, &lm)?;
        fits.push(ModelFit { kind, lsq });
    }

    if fits.is_empty() {
        return Err(AppError::new(3, "Insufficient data to fit any model after guardrails."));
    }

    let best = if fits.len() == 1 { 0 } else { select_by_bic(&fits) };

    Ok(FitSelection {
        fits,
        best,
        skipped,
        av_guess: av,
    })
}

fn select_by_bic(fits: &[ModelFit]) -> usize {
    let mut best = 0;
    for (i, f) in fits.iter().enumerate().skip(1) {
        if f.lsq.quality.bic < fits[best].lsq.quality.bic {
            best = i;
        }
    }
    let best_bic = fits[best].lsq.quality.bic;

    // Prefer simplicity if within 2 BIC points.
    let mut order: Vec<usize> = (0..fits.len()).collect();
    order.sort_by_key(|&i| fits[i].lsq.quality.k);
    order
        .into_iter()
        .find(|&i| fits[i].lsq.quality.bic <= best_bic + 2.0)
        .unwrap_or(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::lsq::FitQuality;
    use crate::models::{CurveModel, Term};

    fn fake_fit(kind: ModelKind, k: usize, bic: f64) -> ModelFit {
        let model = CurveModel::new("m", vec![Term::Polynomial { degree: 1 }]);
        ModelFit {
            kind,
            lsq: LsqFit {
                initial: model.clone(),
                model,
                quality: FitQuality {
                    chi2: 1.0,
                    reduced_chi2: 1.0,
                    bic,
                    n: 100,
                    k,
                },
                uncertainties: Vec::new(),
                iterations: 1,
                converged: true,
                message: String::new(),
            },
        }
    }

    #[test]
    fn bic_prefers_simpler_when_close() {
        let fits = vec![fake_fit(ModelKind::P92, 13, 10.0), fake_fit(ModelKind::G20, 12, 11.5)];
        assert_eq!(fits[select_by_bic(&fits)].kind, ModelKind::G20);
    }

    #[test]
    fn bic_picks_clear_winner() {
        let fits = vec![
            fake_fit(ModelKind::P92, 13, 10.0),
            fake_fit(ModelKind::G20, 12, 30.0),
            fake_fit(ModelKind::PolyDrude, 17, 20.0),
        ];
        assert_eq!(fits[select_by_bic(&fits)].kind, ModelKind::P92);
    }

    #[test]
    fn underdetermined_models_are_skipped() {
        let data = FitData {
            wave: vec![0.5, 1.0, 2.0],
            x: vec![2.0, 1.0, 0.5],
            y: vec![1.0, 0.0, -0.5],
            unc: vec![0.1; 3],
        };
        let opts = SelectionOptions { tie_fir: false, maxiter: None };
        let err = fit_and_select(&data, &[ModelKind::P92, ModelKind::G20], &opts).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
