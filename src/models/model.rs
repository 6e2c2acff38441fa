//! Composite extinction curve models.
//!
//! A [`CurveModel`] is an ordered sum of [`Term`]s, optionally composed with the
//! A(x)/A(V) → E(x - V) conversion. The fitter and the sampler only ever need
//! one primitive: evaluate the model on wavenumbers `x` for a full parameter
//! vector (see [`CurveModel::evaluate_with`]).

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::models::params::{Bounds, Parameter, Parameters};
use crate::models::shapes::{
    AB_AV, PG_X_RANGE, axav_to_exv, check_center, check_x_range, drude, g20_drude, p92_term,
    polynomial,
};

/// Feature names shared by P92 and G20, in parameter order after `BKG`.
pub const FEATURES: [&str; 5] = ["FUV", "NUV", "SIL1", "SIL2", "FIR"];

/// `(amp / AbAv, lambda, b, n, lambda bounds)` per P92 term.
const P92_DEFAULTS: [(&str, f64, f64, f64, f64, Option<(f64, f64)>); 6] = [
    ("BKG", 165.0, 0.047, 90.0, 2.0, None),
    ("FUV", 14.0, 0.07, 4.0, 6.5, Some((0.06, 0.08))),
    ("NUV", 0.045, 0.22, -1.95, 2.0, Some((0.20, 0.24))),
    ("SIL1", 0.002, 9.7, -1.95, 2.0, Some((7.0, 13.0))),
    ("SIL2", 0.002, 18.0, -1.80, 2.0, Some((15.0, 23.0))),
    ("FIR", 0.012, 25.0, 0.0, 2.0, Some((20.0, 30.0))),
];

/// One additive component of a curve model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Term {
    /// Pei (1992): background + five P92 terms, 24 parameters.
    P92,
    /// Gordon et al. (2020): P92-style background + five Drude terms, 19 parameters.
    G20,
    /// Drude profile in wavenumber space with `{label}_amp/_x0/_fwhm` parameters.
    Drude { label: String },
    /// `c0 + c1 x + ... + cn x^n`.
    Polynomial { degree: usize },
}

impl Term {
    pub fn display_name(&self) -> String {
        match self {
            Term::P92 => "P92".to_string(),
            Term::G20 => "G20".to_string(),
            Term::Drude { label } => format!("Drude1D[{label}]"),
            Term::Polynomial { degree } => format!("Polynomial1D[{degree}]"),
        }
    }

    pub fn n_params(&self) -> usize {
        match self {
            Term::P92 => 24,
            Term::G20 => 19,
            Term::Drude { .. } => 3,
            Term::Polynomial { degree } => degree + 1,
        }
    }

    /// Default parameter set for this term, in evaluation order.
    pub fn default_parameters(&self) -> Vec<Parameter> {
        match self {
            Term::P92 => {
                let mut out = Vec::with_capacity(24);
                for (name, amp, lambda, b, n, lam_bounds) in P92_DEFAULTS {
                    out.push(
                        Parameter::new(format!("{name}_amp"), amp * AB_AV)
                            .with_bounds(Bounds::lower(0.0)),
                    );
                    let lam_bounds = match lam_bounds {
                        Some((lo, hi)) => Bounds::new(lo, hi),
                        None => Bounds::lower(0.0),
                    };
                    out.push(Parameter::new(format!("{name}_lambda"), lambda).with_bounds(lam_bounds));
                    out.push(Parameter::new(format!("{name}_b"), b));
                    let n_param = Parameter::new(format!("{name}_n"), n);
                    out.push(if name == "FUV" { n_param } else { n_param.fixed() });
                }
                out
            }
            Term::G20 => {
                let mut out = Vec::with_capacity(19);
                let (_, amp, lambda, b, n, _) = P92_DEFAULTS[0];
                out.push(Parameter::new("BKG_amp", amp * AB_AV).with_bounds(Bounds::lower(0.0)));
                out.push(Parameter::new("BKG_lambda", lambda).with_bounds(Bounds::lower(0.0)));
                out.push(Parameter::new("BKG_b", b));
                out.push(Parameter::new("BKG_n", n).fixed());
                for (name, amp, lambda, _, _, lam_bounds) in P92_DEFAULTS.iter().skip(1).copied() {
                    out.push(
                        Parameter::new(format!("{name}_amp"), amp * AB_AV)
                            .with_bounds(Bounds::lower(0.0)),
                    );
                    let lam_bounds = lam_bounds.map(|(lo, hi)| Bounds::new(lo, hi)).unwrap_or_default();
                    out.push(Parameter::new(format!("{name}_lambda"), lambda).with_bounds(lam_bounds));
                    out.push(Parameter::new(format!("{name}_width"), 1.0));
                }
                out
            }
            Term::Drude { label } => vec![
                Parameter::new(format!("{label}_amp"), 1.0),
                Parameter::new(format!("{label}_x0"), 1.0),
                Parameter::new(format!("{label}_fwhm"), 1.0),
            ],
            Term::Polynomial { degree } => (0..=*degree)
                .map(|i| Parameter::new(format!("c{i}"), 0.0))
                .collect(),
        }
    }

    /// Add this term's contribution at every `x` into `out`.
    fn accumulate(&self, x: &[f64], p: &[f64], out: &mut [f64]) -> Result<(), ModelError> {
        match self {
            Term::P92 => {
                check_x_range(x, PG_X_RANGE, "P92")?;
                for (k, chunk) in p.chunks_exact(4).enumerate() {
                    check_center(chunk[1], "P92", &format!("{}_lambda", P92_DEFAULTS[k].0))?;
                }
                for (xi, yi) in x.iter().zip(out.iter_mut()) {
                    let lam = 1.0 / xi;
                    *yi += p
                        .chunks_exact(4)
                        .map(|c| p92_term(lam, c[0], c[1], c[2], c[3]))
                        .sum::<f64>();
                }
            }
            Term::G20 => {
                check_x_range(x, PG_X_RANGE, "G20")?;
                check_center(p[1], "G20", "BKG_lambda")?;
                let drudes = &p[4..];
                for (k, chunk) in drudes.chunks_exact(3).enumerate() {
                    check_center(chunk[1], "G20", &format!("{}_lambda", FEATURES[k]))?;
                }
                for (xi, yi) in x.iter().zip(out.iter_mut()) {
                    let lam = 1.0 / xi;
                    let bkg = p92_term(lam, p[0], p[1], p[2], p[3]);
                    let feats: f64 = drudes
                        .chunks_exact(3)
                        .map(|c| g20_drude(lam, c[0], c[1], c[2]))
                        .sum();
                    *yi += bkg + feats;
                }
            }
            Term::Drude { label } => {
                check_center(p[1], "Drude1D", &format!("{label}_x0"))?;
                for (xi, yi) in x.iter().zip(out.iter_mut()) {
                    *yi += drude(*xi, p[0], p[1], p[2]);
                }
            }
            Term::Polynomial { .. } => {
                for (xi, yi) in x.iter().zip(out.iter_mut()) {
                    *yi += polynomial(*xi, p);
                }
            }
        }
        Ok(())
    }

    /// Names of the amplitude parameters of discrete features (not the background).
    fn feature_amplitudes(&self) -> Vec<String> {
        match self {
            Term::P92 | Term::G20 => FEATURES.iter().map(|f| format!("{f}_amp")).collect(),
            Term::Drude { label } => vec![format!("{label}_amp")],
            Term::Polynomial { .. } => Vec::new(),
        }
    }
}

/// Sum of terms, optionally converted to E(x - V) with an extra `Av` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveModel {
    pub name: String,
    terms: Vec<Term>,
    #[serde(default)]
    to_elx: bool,
    pub params: Parameters,
}

impl CurveModel {
    /// Build a model in A(x)/A(V) with every term's default parameters.
    pub fn new(name: impl Into<String>, terms: Vec<Term>) -> Self {
        let params = Parameters::new(terms.iter().flat_map(Term::default_parameters).collect());
        Self {
            name: name.into(),
            terms,
            to_elx: false,
            params,
        }
    }

    /// Compose with A(x)/A(V) → E(x - V); appends the `Av` parameter.
    pub fn with_elx(mut self, av: f64) -> Self {
        if !self.to_elx {
            self.params.push(Parameter::new("Av", av));
            self.to_elx = true;
        }
        self
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_elx(&self) -> bool {
        self.to_elx
    }

    /// Fitted/initial A(V) for E(x - V) models.
    pub fn av(&self) -> Option<f64> {
        if self.to_elx {
            self.params.value("Av").ok()
        } else {
            None
        }
    }

    /// Evaluate with the stored parameter values.
    pub fn evaluate(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.evaluate_with(x, &self.params.values())
    }

    /// Evaluate for a full parameter vector (collection order, ties already applied).
    pub fn evaluate_with(&self, x: &[f64], values: &[f64]) -> Result<Vec<f64>, ModelError> {
        if values.len() != self.params.len() {
            return Err(ModelError::ParameterCount {
                expected: self.params.len(),
                got: values.len(),
            });
        }

        let mut out = vec![0.0; x.len()];
        let mut offset = 0;
        for term in &self.terms {
            let n = term.n_params();
            term.accumulate(x, &values[offset..offset + n], &mut out)?;
            offset += n;
        }

        if self.to_elx {
            let av = values[offset];
            for v in out.iter_mut() {
                *v = axav_to_exv(*v, av);
            }
        }
        Ok(out)
    }

    /// Amplitude parameter names of every discrete feature, in term order.
    pub fn feature_amplitudes(&self) -> Vec<String> {
        self.terms.iter().flat_map(Term::feature_amplitudes).collect()
    }

    /// Copy with the named parameters set to zero (ties are not re-applied).
    pub fn with_zeroed(&self, names: &[String]) -> Result<CurveModel, ModelError> {
        let mut out = self.clone();
        for name in names {
            out.params.set_value(name, 0.0)?;
        }
        Ok(out)
    }

    /// Background-only curve followed by background + each single feature.
    pub fn components(&self) -> Result<Vec<(String, CurveModel)>, ModelError> {
        let amps = self.feature_amplitudes();
        let mut out = Vec::with_capacity(amps.len() + 1);
        out.push(("background".to_string(), self.with_zeroed(&amps)?));
        for keep in &amps {
            let others: Vec<String> = amps.iter().filter(|a| *a != keep).cloned().collect();
            let label = keep.trim_end_matches("_amp").to_string();
            out.push((label, self.with_zeroed(&others)?));
        }
        Ok(out)
    }
}
