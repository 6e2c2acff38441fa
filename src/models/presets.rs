//! Starting models for fitting observed E(λ - V) curves.
//!
//! The starting values, fixed flags and bounds below keep the fits away from
//! parameters the data cannot constrain (e.g. the FUV and FIR centers, which
//! lie outside the observed wavelength range for most sightlines).

use crate::domain::ModelKind;
use crate::error::ModelError;
use crate::models::model::{CurveModel, Term};
use crate::models::params::Bounds;

/// FIR/SIL1 amplitude ratio of the P92 defaults.
pub const FIR_SIL1_RATIO: f64 = 0.012 / 0.002;

/// Wavelength (micron) beyond which E(λ - V) approaches -A(V).
const AV_GUESS_MIN_WAVE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetOptions {
    pub av_guess: f64,
    /// Tie `FIR_amp` to `SIL1_amp` in the P92 model.
    pub tie_fir: bool,
}

/// Initial A(V): minus the mean E(λ - V) at λ > 5 micron, else 1.
pub fn av_guess(wave: &[f64], y: &[f64]) -> f64 {
    let long: Vec<f64> = wave
        .iter()
        .zip(y)
        .filter(|&(&w, _)| w > AV_GUESS_MIN_WAVE)
        .map(|(_, &v)| v)
        .collect();
    if long.is_empty() {
        return 1.0;
    }
    let guess = -long.iter().sum::<f64>() / long.len() as f64;
    if guess.is_finite() { guess } else { 1.0 }
}

/// Build the starting model for `kind`.
pub fn initial_model(kind: ModelKind, opts: PresetOptions) -> Result<CurveModel, ModelError> {
    match kind {
        ModelKind::P92 => p92_elx(opts),
        ModelKind::G20 => g20_elx(opts),
        ModelKind::PolyDrude => poly_drude_elx(opts),
    }
}

fn p92_elx(opts: PresetOptions) -> Result<CurveModel, ModelError> {
    let mut m = CurveModel::new(ModelKind::P92.display_name(), vec![Term::P92]).with_elx(opts.av_guess);
    let p = &mut m.params;
    p.set_value("BKG_amp", 200.0)?;
    p.set_value("FUV_amp", 100.0)?;
    p.set_value("FUV_lambda", 0.06)?;

    for name in ["BKG_b", "FUV_lambda", "FUV_b", "FUV_n", "SIL2_b", "FIR_lambda", "FIR_b"] {
        p.set_fixed(name, true)?;
    }
    p.set_bounds("SIL2_lambda", Bounds::new(15.0, 25.0))?;
    p.set_bounds("Av", Bounds::lower(0.1))?;

    if opts.tie_fir {
        p.tie("FIR_amp", "SIL1_amp", FIR_SIL1_RATIO)?;
    }
    Ok(m)
}

fn g20_elx(opts: PresetOptions) -> Result<CurveModel, ModelError> {
    let mut m = CurveModel::new(ModelKind::G20.display_name(), vec![Term::G20]).with_elx(opts.av_guess);
    let p = &mut m.params;
    p.set_value("BKG_amp", 200.0)?;
    p.set_value("FUV_amp", 2.0)?;
    p.set_value("FUV_lambda", 0.06)?;
    p.set_value("FUV_width", 0.15)?;
    p.set_value("NUV_amp", 0.25)?;

    for name in ["BKG_b", "BKG_n", "FUV_lambda", "FUV_width", "SIL2_width", "FIR_lambda", "FIR_width"] {
        p.set_fixed(name, true)?;
    }
    p.set_bounds("FUV_amp", Bounds::lower(1.0))?;
    p.set_bounds("NUV_width", Bounds::lower(0.0))?;
    p.set_bounds("SIL1_width", Bounds::new(0.5, 3.0))?;
    p.set_bounds("SIL2_lambda", Bounds::new(15.0, 25.0))?;
    p.set_bounds("SIL2_amp", Bounds::lower(3e-3))?;
    p.set_bounds("SIL2_width", Bounds::new(0.5, 3.0))?;
    p.set_bounds("Av", Bounds::lower(0.1))?;
    Ok(m)
}

/// Polynomial background plus four Drude features, in wavenumber space.
fn poly_drude_elx(opts: PresetOptions) -> Result<CurveModel, ModelError> {
    let terms = vec![
        Term::Polynomial { degree: 5 },
        Term::Drude { label: "FUV".to_string() },
        Term::Drude { label: "NUV".to_string() },
        Term::Drude { label: "SIL1".to_string() },
        Term::Drude { label: "SIL2".to_string() },
    ];
    let mut m = CurveModel::new(ModelKind::PolyDrude.display_name(), terms).with_elx(opts.av_guess);
    let p = &mut m.params;

    p.set_value("c1", 2.0)?;
    p.set_value("c2", 3.0)?;
    p.set_fixed("c0", true)?;

    // (label, amp, x0, fwhm, amp bounds, x0 bounds, fwhm bounds)
    let drudes = [
        ("FUV", 30.0, 13.5, 2.0, Bounds::lower(10.0), Bounds::new(13.0, 14.0), Bounds::new(0.5, 40.5)),
        ("NUV", 1.0, 4.6, 1.0, Bounds::new(0.0, 10.0), Bounds::new(4.4, 4.8), Bounds::new(0.5, 1.5)),
        (
            "SIL1",
            0.1,
            1.0 / 10.0,
            0.1,
            Bounds::lower(0.01),
            Bounds::new(1.0 / 12.0, 1.0 / 8.0),
            Bounds::new(0.01, 0.5),
        ),
        (
            "SIL2",
            1.0,
            1.0 / 20.0,
            0.05,
            Bounds::lower(0.01),
            Bounds::new(1.0 / 22.0, 1.0 / 17.0),
            Bounds::new(0.001, 0.05),
        ),
    ];
    for (label, amp, x0, fwhm, amp_b, x0_b, fwhm_b) in drudes {
        p.set_value(&format!("{label}_amp"), amp)?;
        p.set_value(&format!("{label}_x0"), x0)?;
        p.set_value(&format!("{label}_fwhm"), fwhm)?;
        p.set_bounds(&format!("{label}_amp"), amp_b)?;
        p.set_bounds(&format!("{label}_x0"), x0_b)?;
        p.set_bounds(&format!("{label}_fwhm"), fwhm_b)?;
    }
    p.set_fixed("FUV_x0", true)?;
    p.set_fixed("FUV_fwhm", true)?;
    p.set_bounds("Av", Bounds::lower(0.1))?;
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(tie_fir: bool) -> PresetOptions {
        PresetOptions { av_guess: 1.3, tie_fir }
    }

    #[test]
    fn av_guess_uses_long_wavelengths() {
        let wave = [0.5, 1.0, 6.0, 10.0];
        let y = [2.0, 0.5, -1.2, -1.4];
        assert!((av_guess(&wave, &y) - 1.3).abs() < 1e-12);
        assert_eq!(av_guess(&[0.5, 1.0], &[1.0, 2.0]), 1.0);
    }

    #[test]
    fn p92_preset_free_parameters() {
        let m = initial_model(ModelKind::P92, opts(false)).unwrap();
        let free: Vec<&str> = m.params.free_indices().iter().map(|&i| m.params.name_at(i)).collect();
        assert_eq!(
            free,
            vec![
                "BKG_amp", "BKG_lambda", "FUV_amp", "NUV_amp", "NUV_lambda", "NUV_b", "SIL1_amp",
                "SIL1_lambda", "SIL1_b", "SIL2_amp", "SIL2_lambda", "FIR_amp", "Av"
            ]
        );
        assert_eq!(m.av(), Some(1.3));
        assert_eq!(m.params.get("SIL2_lambda").unwrap().bounds, Bounds::new(15.0, 25.0));
    }

    #[test]
    fn p92_preset_fir_tie() {
        let m = initial_model(ModelKind::P92, opts(true)).unwrap();
        let fir = m.params.get("FIR_amp").unwrap();
        assert!(!fir.is_free());
        let sil1 = m.params.value("SIL1_amp").unwrap();
        assert!((fir.value - FIR_SIL1_RATIO * sil1).abs() < 1e-15);
    }

    #[test]
    fn g20_and_poly_presets_evaluate() {
        let x: Vec<f64> = [0.12, 0.22, 0.55, 2.2, 9.7, 20.0].iter().map(|w| 1.0 / w).collect();
        for kind in [ModelKind::G20, ModelKind::PolyDrude] {
            let m = initial_model(kind, opts(false)).unwrap();
            let y = m.evaluate(&x).unwrap();
            assert!(y.iter().all(|v| v.is_finite()), "{kind:?}: {y:?}");
        }
        let g20 = initial_model(ModelKind::G20, opts(false)).unwrap();
        assert!(g20.params.get("FUV_width").unwrap().fixed);
        let poly = initial_model(ModelKind::PolyDrude, opts(false)).unwrap();
        assert!(poly.params.get("c0").unwrap().fixed);
    }
}
