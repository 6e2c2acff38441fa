//! Log-probability for sampling curve-model parameters.
//!
//! The prior is flat inside each parameter's bounds and zero outside, so
//! `ln p = -inf` for any out-of-bounds component and the likelihood is never
//! evaluated there.

use crate::domain::FitData;
use crate::error::ModelError;
use crate::fit::lsq::weighted_residuals;
use crate::models::{Bounds, CurveModel};

/// Target density for the ensemble sampler.
///
/// `Sync` because walkers of one half-ensemble are evaluated in parallel.
pub trait LogProb: Sync {
    fn ln_like(&self, params: &[f64]) -> f64;
    fn ln_prior(&self, params: &[f64]) -> f64;

    fn ln_prob(&self, params: &[f64]) -> f64 {
        let lnp = self.ln_prior(params);
        if lnp.is_finite() {
            lnp + self.ln_like(params)
        } else {
            f64::NEG_INFINITY
        }
    }
}

/// Gaussian likelihood of a curve model with box priors from its bounds.
#[derive(Debug, Clone)]
pub struct BoundedLikelihood<'a> {
    model: &'a CurveModel,
    data: &'a FitData,
    indices: Vec<usize>,
    bounds: Vec<Bounds>,
}

impl<'a> BoundedLikelihood<'a> {
    /// Sample the parameters named in `names`, in that order.
    pub fn new(model: &'a CurveModel, data: &'a FitData, names: &[String]) -> Result<Self, ModelError> {
        let indices = model.params.indices_of(names)?;
        let bounds = indices.iter().map(|&i| model.params.bounds_at(i)).collect();
        Ok(Self {
            model,
            data,
            indices,
            bounds,
        })
    }

    pub fn ndim(&self) -> usize {
        self.indices.len()
    }

    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    /// Full parameter vector with the sampled values applied and ties refreshed.
    pub fn full_values(&self, params: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.model.params.expand(&self.indices, params)
    }
}

impl LogProb for BoundedLikelihood<'_> {
    fn ln_like(&self, params: &[f64]) -> f64 {
        let resid = self
            .full_values(params)
            .and_then(|values| weighted_residuals(self.model, self.data, &values));
        match resid {
            Ok(r) => {
                let chi2: f64 = r.iter().map(|v| v * v).sum();
                if chi2.is_finite() { -0.5 * chi2 } else { f64::NEG_INFINITY }
            }
            Err(e) => {
                log::debug!("{}: rejecting sample: {e}", self.model.name);
                f64::NEG_INFINITY
            }
        }
    }

    fn ln_prior(&self, params: &[f64]) -> f64 {
        let inside = params.len() == self.bounds.len()
            && params.iter().zip(&self.bounds).all(|(&v, b)| b.contains(v));
        if inside { 0.0 } else { f64::NEG_INFINITY }
    }
}
