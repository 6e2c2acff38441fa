//! Closed-form extinction curve shapes.
//!
//! Conventions:
//! - `x` is wavenumber in 1/micron, `lam = 1/x` is wavelength in micron
//! - every function here is a pure element-wise formula; parameter handling
//!   and composition live in [`crate::models::model`]
//!
//! The P92 term is the Pei (1992) building block
//! `a / ((λ/λ0)^n + (λ0/λ)^n + b)`, which is also the G20 background.
//! Discrete features in G20 (and the polynomial model) use Drude profiles.

use crate::error::ModelError;

/// Wavenumber range (1/micron) over which P92 and G20 are defined.
pub const PG_X_RANGE: (f64, f64) = (1.0 / 1e3, 1.0 / 1e-3);

/// Conversion from A(x)/A(B) to A(x)/A(V) used by the P92/G20 defaults.
pub const AB_AV: f64 = 1.0 / 3.08 + 1.0;

/// Ensure every wavenumber lies within `range` (inclusive).
pub fn check_x_range(x: &[f64], range: (f64, f64), model: &'static str) -> Result<(), ModelError> {
    match x.iter().find(|&&v| !(v >= range.0 && v <= range.1)) {
        Some(&value) => Err(ModelError::OutOfRange {
            model,
            min: range.0,
            max: range.1,
            value,
        }),
        None => Ok(()),
    }
}

/// Ensure a center wavelength/wavenumber can be divided by.
pub fn check_center(center: f64, model: &'static str, name: &str) -> Result<(), ModelError> {
    if center == 0.0 {
        return Err(ModelError::ZeroCenter {
            model,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// One Drude profile in wavenumber space.
///
/// `f(x) = A (fwhm/x0)^2 / ((x/x0 - x0/x)^2 + (fwhm/x0)^2)`, so `f(x0) = A`.
#[inline]
pub fn drude(x: f64, amplitude: f64, x0: f64, fwhm: f64) -> f64 {
    let gamma = (fwhm / x0).powi(2);
    let dev = x / x0 - x0 / x;
    amplitude * gamma / (dev * dev + gamma)
}

/// P92 term (and G20 background) at wavelength `lam`.
///
/// Central value is `a / (2 + b)`.
#[inline]
pub fn p92_term(lam: f64, amplitude: f64, cen_wave: f64, b: f64, n: f64) -> f64 {
    let l_norm = lam / cen_wave;
    amplitude / (l_norm.powf(n) + l_norm.powf(-n) + b)
}

/// G20 Drude term at wavelength `lam`; peaks at `amplitude` when `lam == cen_wave`.
#[inline]
pub fn g20_drude(lam: f64, amplitude: f64, cen_wave: f64, width: f64) -> f64 {
    let w = (width / cen_wave).powi(2);
    let dev = lam / cen_wave - cen_wave / lam;
    amplitude * w / (dev * dev + w)
}

/// Polynomial `Σ c_i x^i` (Horner).
#[inline]
pub fn polynomial(x: f64, coeffs: &[f64]) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Convert A(x)/A(V) to E(x - V) given A(V).
#[inline]
pub fn axav_to_exv(axav: f64, av: f64) -> f64 {
    (axav - 1.0) * av
}

/// Convert E(x - V) to A(x)/A(V) given A(V).
#[inline]
pub fn exv_to_axav(exv: f64, av: f64) -> f64 {
    exv / av + 1.0
}

/// P92 feature width (micron) from its center and `b` coefficient.
pub fn p92_width(cen_wave: f64, b: f64) -> f64 {
    cen_wave * (2.0 + b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drude_peaks_at_center() {
        for &(a, x0, fwhm) in &[(1.0, 10.0, 1.0), (30.0, 13.5, 2.0), (0.1, 0.1, 0.05), (2.5, 4.6, 0.9)] {
            let peak = drude(x0, a, x0, fwhm);
            assert!((peak - a).abs() < 1e-12 * a.abs().max(1.0), "peak {peak} != amplitude {a}");
            // Off-center values are strictly lower for a positive amplitude.
            assert!(drude(x0 * 1.1, a, x0, fwhm) < a);
            assert!(drude(x0 * 0.9, a, x0, fwhm) < a);
        }
    }

    #[test]
    fn g20_drude_peaks_at_center() {
        for &(a, lam0, width) in &[(0.25, 0.22, 1.0), (0.004, 9.7, 2.0), (2.0, 0.06, 0.15)] {
            let peak = g20_drude(lam0, a, lam0, width);
            assert!((peak - a).abs() < 1e-12, "peak {peak} != amplitude {a}");
        }
    }

    #[test]
    fn p92_term_central_value() {
        let (a, lam0, b, n) = (0.045 * AB_AV, 0.22, -1.95, 2.0);
        let central = p92_term(lam0, a, lam0, b, n);
        assert!((central - a / (2.0 + b)).abs() < 1e-12);
    }

    #[test]
    fn polynomial_uses_ascending_coefficients() {
        // 1 + 2x + 3x^2 at x = 2
        assert!((polynomial(2.0, &[1.0, 2.0, 3.0]) - 17.0).abs() < 1e-12);
        assert_eq!(polynomial(3.0, &[]), 0.0);
    }

    #[test]
    fn elx_conversion_round_trips() {
        let av = 2.3;
        let axav = 1.7;
        let exv = axav_to_exv(axav, av);
        assert!((exv - 0.7 * 2.3).abs() < 1e-12);
        assert!((exv_to_axav(exv, av) - axav).abs() < 1e-12);
    }

    #[test]
    fn x_range_check_reports_offending_value() {
        assert!(check_x_range(&[0.5, 3.0, 8.0], PG_X_RANGE, "P92").is_ok());
        let err = check_x_range(&[1.0, 2e3], PG_X_RANGE, "G20").unwrap_err();
        assert_eq!(
            err,
            ModelError::OutOfRange {
                model: "G20",
                min: 1e-3,
                max: 1e3,
                value: 2e3
            }
        );
        assert!(check_x_range(&[f64::NAN], PG_X_RANGE, "P92").is_err());
    }

    #[test]
    fn zero_center_rejected() {
        assert!(check_center(9.7, "Drude1D", "SIL1_x0").is_ok());
        assert!(matches!(
            check_center(0.0, "Drude1D", "SIL1_x0"),
            Err(ModelError::ZeroCenter { .. })
        ));
    }
}
