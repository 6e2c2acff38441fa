//! MCMC refinement of a least-squares fit.
//!
//! Walkers start in a tight ball around the least-squares solution, run a
//! burn-in, are reset, and then run the production steps from the final burn
//! positions with the same RNG stream.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

use crate::domain::{Chain, FitData};
use crate::error::AppError;
use crate::fit::ensemble::EnsembleSampler;
use crate::fit::posterior::BoundedLikelihood;
use crate::math::median_and_errors;
use crate::models::CurveModel;

/// Walkers per sampled parameter.
pub const WALKERS_PER_DIM: usize = 10;

/// Replacement for zero starting values so the initial ball has a width.
const ZERO_START: f64 = 2.4e-3;

/// Relative width of the initial walker ball.
const BALL_WIDTH: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McmcOptions {
    pub nburn: usize,
    pub nsteps: usize,
    pub seed: u64,
}

impl Default for McmcOptions {
    fn default() -> Self {
        Self {
            nburn: 100,
            nsteps: 500,
            seed: 42,
        }
    }
}

/// Marginal summary of one sampled parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSummary {
    pub name: String,
    pub p50: f64,
    /// `p84 - p50`
    pub plus: f64,
    /// `p50 - p16`
    pub minus: f64,
    /// Value in the highest-probability sample.
    pub best: f64,
}

#[derive(Debug, Clone)]
pub struct McmcFit {
    /// Copy of the input model with sampled parameters at their medians.
    pub model: CurveModel,
    pub params: Vec<ParamSummary>,
    pub best_lnprob: f64,
    pub chain: Chain,
}

impl McmcFit {
    pub fn mean_acceptance(&self) -> f64 {
        crate::math::mean(&self.chain.acceptance_fraction)
    }
}

/// Sample the free parameters of `model` (or the explicit `names`).
pub fn sample_posterior(
    model: &CurveModel,
    data: &FitData,
    names: Option<&[String]>,
    opts: &McmcOptions,
) -> Result<McmcFit, AppError> {
    let names: Vec<String> = match names {
        Some(n) => n.to_vec(),
        None => model
            .params
            .free_indices()
            .into_iter()
            .map(|i| model.params.name_at(i).to_string())
            .collect(),
    };
    let target = BoundedLikelihood::new(model, data, &names)?;
    let ndim = target.ndim();
    let nwalkers = WALKERS_PER_DIM * ndim;

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let p0 = initial_ball(model, &names, &target, nwalkers, &mut rng)?;

    log::info!(
        "{}: sampling {ndim} parameters with {nwalkers} walkers ({} burn + {} steps)",
        model.name,
        opts.nburn,
        opts.nsteps
    );

    let mut sampler = EnsembleSampler::new(nwalkers, ndim, &target)?;
    let pos = sampler.run_mcmc(&p0, opts.nburn, &mut rng)?;
    sampler.reset();
    sampler.run_mcmc(&pos, opts.nsteps, &mut rng)?;

    let (best, best_lnprob) = sampler
        .best_sample()
        .ok_or_else(|| AppError::new(3, "MCMC produced no samples (nsteps = 0)."))?;

    let mut params = Vec::with_capacity(ndim);
    let mut medians = Vec::with_capacity(ndim);
    for (dim, name) in names.iter().enumerate() {
        let (p50, plus, minus) = median_and_errors(&sampler.flat_param(dim));
        medians.push(p50);
        params.push(ParamSummary {
            name: name.clone(),
            p50,
            plus,
            minus,
            best: best[dim],
        });
    }

    let indices = model.params.indices_of(&names)?;
    let values = model.params.expand(&indices, &medians)?;
    let mut out_model = model.clone();
    out_model.params.set_values(&values)?;

    let chain = Chain {
        model: model.name.clone(),
        param_names: names,
        nburn: opts.nburn,
        seed: opts.seed,
        samples: sampler.chain().to_vec(),
        lnprob: sampler.lnprobability().to_vec(),
        acceptance_fraction: sampler.acceptance_fraction(),
    };

    let fit = McmcFit {
        model: out_model,
        params,
        best_lnprob,
        chain,
    };
    log::info!(
        "{}: mean acceptance fraction {:.3}, best ln p {:.3}",
        model.name,
        fit.mean_acceptance(),
        best_lnprob
    );
    Ok(fit)
}

/// `p0 (1 + 1e-4 N(0, 1))` per walker, clamped into the bounds.
fn initial_ball(
    model: &CurveModel,
    names: &[String],
    target: &BoundedLikelihood<'_>,
    nwalkers: usize,
    rng: &mut StdRng,
) -> Result<Vec<Vec<f64>>, AppError> {
    let center: Vec<f64> = names
        .iter()
        .map(|n| model.params.value(n).map(|v| if v == 0.0 { ZERO_START } else { v }))
        .collect::<Result<_, _>>()?;

    Ok((0..nwalkers)
        .map(|_| {
            center
                .iter()
                .zip(target.bounds())
                .map(|(&c, b)| {
                    let z: f64 = StandardNormal.sample(rng);
                    b.clamp(c * (1.0 + BALL_WIDTH * z))
                })
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bounds, Term};
    use rand_distr::Normal;

    #[test]
    fn recovers_line_parameters() {
        let mut truth = CurveModel::new("line", vec![Term::Polynomial { degree: 1 }]);
        truth.params.set_values(&[0.5, 2.0]).unwrap();
        let x: Vec<f64> = (1..=40).map(|i| i as f64 * 0.2).collect();
        let clean = truth.evaluate(&x).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let data = FitData {
            wave: x.iter().map(|v| 1.0 / v).collect(),
            y: clean.iter().map(|v| v + noise.sample(&mut rng)).collect(),
            unc: vec![0.05; x.len()],
            x,
        };

        let mut start = truth.clone();
        start.params.set_bounds("c1", Bounds::new(0.0, 10.0)).unwrap();
        let opts = McmcOptions { nburn: 100, nsteps: 400, seed: 42 };
        let fit = sample_posterior(&start, &data, None, &opts).unwrap();

        assert_eq!(fit.chain.nwalkers(), 20);
        assert_eq!(fit.chain.nsteps(), 400);
        assert_eq!(fit.params.len(), 2);
        let c1 = &fit.params[1];
        assert!((c1.p50 - 2.0).abs() < 0.05, "{c1:?}");
        assert!(c1.plus > 0.0 && c1.minus > 0.0 && c1.plus < 0.05);
        assert_eq!(fit.model.params.value("c1").unwrap(), c1.p50);

        for s in fit.chain.flat_param(1, 0) {
            assert!((0.0..=10.0).contains(&s));
        }
    }

    #[test]
    fn zero_start_values_are_replaced() {
        let model = CurveModel::new("line", vec![Term::Polynomial { degree: 1 }]);
        let data = FitData {
            wave: vec![1.0],
            x: vec![1.0],
            y: vec![0.0],
            unc: vec![1.0],
        };
        let names = vec!["c0".to_string(), "c1".to_string()];
        let target = BoundedLikelihood::new(&model, &data, &names).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let ball = initial_ball(&model, &names, &target, 20, &mut rng).unwrap();
        for w in &ball {
            assert!((w[0] - ZERO_START).abs() < 1e-3 * ZERO_START);
        }
        // Walkers are distinct.
        assert_ne!(ball[0], ball[1]);
    }
}
