//! Weighted nonlinear least squares for one curve model.
//!
//! Residuals are `(model(x) - y) / unc`, so the minimized sum is χ². Only the
//! free parameters move; tied parameters are recomputed for every evaluation.

use serde::{Deserialize, Serialize};

use crate::domain::FitData;
use crate::error::{AppError, ModelError};
use crate::math::{LmOptions, invert_spd, levenberg_marquardt};
use crate::models::{Bounds, CurveModel};

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub chi2: f64,
    pub reduced_chi2: f64,
    pub bic: f64,
    pub n: usize,
    /// Number of free parameters.
    pub k: usize,
}

/// Output of a least-squares fit.
#[derive(Debug, Clone)]
pub struct LsqFit {
    pub initial: CurveModel,
    pub model: CurveModel,
    pub quality: FitQuality,
    /// `(name, 1-sigma)` per free parameter; empty if `JᵀJ` was singular.
    pub uncertainties: Vec<(String, f64)>,
    pub iterations: usize,
    pub converged: bool,
    pub message: String,
}

impl LsqFit {
    pub fn uncertainty(&self, name: &str) -> Option<f64> {
        self.uncertainties.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }
}

/// Normalized residuals for a full parameter vector.
pub fn weighted_residuals(
    model: &CurveModel,
    data: &FitData,
    values: &[f64],
) -> Result<Vec<f64>, ModelError> {
    let y_model = model.evaluate_with(&data.x, values)?;
    Ok(y_model
        .iter()
        .zip(&data.y)
        .zip(&data.unc)
        .map(|((m, y), s)| (m - y) / s)
        .collect())
}

/// χ² of the model's current parameter values.
pub fn chi_square(model: &CurveModel, data: &FitData) -> Result<f64, ModelError> {
    let r = weighted_residuals(model, data, &model.params.values())?;
    Ok(r.iter().map(|v| v * v).sum())
}

/// BIC = n ln(χ²/n) + k ln(n).
pub fn bic(n: usize, chi2: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let chi2 = chi2.max(1e-300);
    n_f * (chi2 / n_f).ln() + (k as f64) * n_f.ln()
}

/// Fit `initial` to `data` with Levenberg–Marquardt.
pub fn fit_least_squares(
    initial: &CurveModel,
    data: &FitData,
    opts: &LmOptions,
) -> Result<LsqFit, AppError> {
    if data.is_empty() {
        return Err(AppError::new(3, "No data points to fit."));
    }
    if data.unc.iter().any(|s| !(*s > 0.0 && s.is_finite())) {
        return Err(AppError::new(2, "Fit uncertainties must be positive and finite."));
    }

    let free = initial.params.free_indices();
    let bounds: Vec<Bounds> = free.iter().map(|&i| initial.params.bounds_at(i)).collect();
    let start = initial.params.values();
    let x0: Vec<f64> = free.iter().map(|&i| start[i]).collect();

    let residuals = |p: &[f64]| -> Result<Vec<f64>, ModelError> {
        let values = initial.params.expand(&free, p)?;
        weighted_residuals(initial, data, &values)
    };

    let result = levenberg_marquardt(residuals, &x0, &bounds, opts).map_err(|e| {
        AppError::new(4, format!("{}: cannot evaluate starting model: {e}", initial.name))
    })?;

    let mut model = initial.clone();
    let values = model.params.expand(&free, &result.x)?;
    model.params.set_values(&values)?;

    let n = data.len();
    let k = free.len();
    let chi2 = result.cost;
    let dof = n.saturating_sub(k).max(1);
    let quality = FitQuality {
        chi2,
        reduced_chi2: chi2 / dof as f64,
        bic: bic(n, chi2, k),
        n,
        k,
    };

    let jtj = result.jacobian.transpose() * &result.jacobian;
    let uncertainties = match invert_spd(&jtj) {
        Some(cov) => free
            .iter()
            .enumerate()
            .map(|(j, &i)| (model.params.name_at(i).to_string(), cov[(j, j)].max(0.0).sqrt()))
            .collect(),
        None => {
            log::warn!("{}: JᵀJ is singular, no least-squares uncertainties", model.name);
            Vec::new()
        }
    };

    if !result.converged {
        log::warn!("{}: {}", model.name, result.message);
    }
    log::info!(
        "{}: chi2={:.3} reduced={:.3} after {} iterations",
        model.name,
        quality.chi2,
        quality.reduced_chi2,
        result.iterations
    );

    Ok(LsqFit {
        initial: initial.clone(),
        model,
        quality,
        uncertainties,
        iterations: result.iterations,
        converged: result.converged,
        message: result.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::models::{PresetOptions, Term, initial_model};

    fn synthetic(model: &CurveModel, wave: &[f64]) -> FitData {
        let x: Vec<f64> = wave.iter().map(|w| 1.0 / w).collect();
        let y = model.evaluate(&x).unwrap();
        let unc = y.iter().map(|v| 0.01 * v.abs().max(0.1)).collect();
        FitData { wave: wave.to_vec(), x, y, unc }
    }

    #[test]
    fn recovers_drude_parameters_from_noiseless_data() {
        let mut truth = CurveModel::new(
            "drude",
            vec![Term::Polynomial { degree: 1 }, Term::Drude { label: "NUV".into() }],
        )
        .with_elx(1.5);
        truth.params.set_values(&[0.3, 0.8, 1.2, 4.6, 1.0, 1.5]).unwrap();
        let wave: Vec<f64> = (0..80).map(|i| 0.12 + i as f64 * 0.01).collect();
        let data = synthetic(&truth, &wave);

        let mut start = truth.clone();
        start.params.set_values(&[0.2, 1.0, 0.9, 4.5, 0.8, 1.5]).unwrap();
        start.params.set_fixed("Av", true).unwrap();

        let opts = LmOptions { maxiter: 500, ..LmOptions::default() };
        let fit = fit_least_squares(&start, &data, &opts).unwrap();
        for (got, want) in fit.model.params.values().iter().zip(truth.params.values()) {
            assert!((got - want).abs() < 1e-5, "{:?}", fit.model.params.values());
        }
        assert!(fit.quality.chi2 < 1e-8);
        assert_eq!(fit.quality.k, 5);
        assert_eq!(fit.uncertainties.len(), 5);
    }

    #[test]
    fn p92_fit_keeps_fixed_and_tied_values() {
        let opts_p = PresetOptions { av_guess: 1.0, tie_fir: true };
        let start = initial_model(ModelKind::P92, opts_p).unwrap();
        let truth = start.clone();
        let wave: Vec<f64> = (0..120).map(|i| 0.1 * 1.05f64.powi(i)).filter(|w| *w < 30.0).collect();
        let data = synthetic(&truth, &wave);

        let fit = fit_least_squares(&start, &data, &LmOptions::default()).unwrap();
        assert_eq!(fit.model.params.value("BKG_b").unwrap(), 90.0);
        let sil1 = fit.model.params.value("SIL1_amp").unwrap();
        let fir = fit.model.params.value("FIR_amp").unwrap();
        assert!((fir - 6.0 * sil1).abs() < 1e-12 * fir.abs().max(1.0));
        assert!(fit.quality.chi2 < 1e-6);
    }

    /// Fit the preset for `kind` to a curve made from the same preset with
    /// `shifts` applied as relative changes.
    fn recover_preset(kind: ModelKind, shifts: &[(&str, f64)]) {
        let start = initial_model(kind, PresetOptions { av_guess: 1.5, tie_fir: false }).unwrap();
        let mut truth = start.clone();
        for &(name, factor) in shifts {
            let v = truth.params.value(name).unwrap();
            truth.params.set_value(name, v * factor).unwrap();
        }
        let wave: Vec<f64> = (0..130).map(|i| 0.1 * 1.045f64.powi(i)).filter(|w| *w < 35.0).collect();
        let data = synthetic(&truth, &wave);
        let start_chi2 = chi_square(&start, &data).unwrap();

        let opts = LmOptions { maxiter: 1000, ..LmOptions::default() };
        let fit = fit_least_squares(&start, &data, &opts).unwrap();
        assert!(fit.quality.chi2 < 1e-4 * start_chi2, "{kind:?}: chi2 {} from {start_chi2}", fit.quality.chi2);
        for &(name, _) in shifts {
            let got = fit.model.params.value(name).unwrap();
            let want = truth.params.value(name).unwrap();
            assert!((got - want).abs() < 0.05 * want.abs(), "{kind:?} {name}: {got} vs {want}");
        }
    }

    #[test]
    fn p92_recovers_shifted_extinction() {
        recover_preset(ModelKind::P92, &[("Av", 1.2), ("NUV_amp", 1.15), ("SIL1_amp", 1.1)]);
    }

    #[test]
    fn g20_recovers_shifted_extinction() {
        recover_preset(ModelKind::G20, &[("Av", 0.85), ("NUV_amp", 1.2), ("SIL1_amp", 1.1)]);
    }

    #[test]
    fn bic_penalizes_parameters() {
        assert!(bic(100, 50.0, 5) > bic(100, 50.0, 3));
        assert!(bic(100, 40.0, 3) < bic(100, 50.0, 3));
    }

    #[test]
    fn rejects_non_positive_uncertainties() {
        let model = CurveModel::new("poly", vec![Term::Polynomial { degree: 1 }]);
        let data = FitData {
            wave: vec![1.0, 2.0],
            x: vec![1.0, 0.5],
            y: vec![1.0, 2.0],
            unc: vec![0.1, 0.0],
        };
        let err = fit_least_squares(&model, &data, &LmOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
