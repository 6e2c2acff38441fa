//! Affine-invariant ensemble sampler (Goodman & Weare 2010 stretch move).
//!
//! The ensemble is split into two halves; each half is updated using walkers
//! from the other half as the complementary ensemble, so proposals within a
//! half are independent and their log-probabilities are evaluated in parallel
//! with rayon. All random numbers are drawn serially beforehand, which keeps
//! a run reproducible for a given seed regardless of the thread count.

use rand::Rng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::error::AppError;
use crate::fit::posterior::LogProb;

/// Default stretch scale `a`.
pub const STRETCH_SCALE: f64 = 2.0;

pub struct EnsembleSampler<'a, P: LogProb> {
    nwalkers: usize,
    ndim: usize,
    target: &'a P,
    a: f64,
    /// `[walker][step][dim]`
    chain: Vec<Vec<Vec<f64>>>,
    /// `[walker][step]`
    lnprob: Vec<Vec<f64>>,
    accepted: Vec<usize>,
    iterations: usize,
}

impl<'a, P: LogProb> EnsembleSampler<'a, P> {
    /// `nwalkers` must be even and at least `2 * ndim`.
    pub fn new(nwalkers: usize, ndim: usize, target: &'a P) -> Result<Self, AppError> {
        if ndim == 0 {
            return Err(AppError::new(2, "Cannot sample zero parameters."));
        }
        if nwalkers % 2 != 0 || nwalkers < 2 * ndim {
            return Err(AppError::new(
                2,
                format!("Need an even number of walkers >= 2*ndim={} (got {nwalkers}).", 2 * ndim),
            ));
        }
        Ok(Self {
            nwalkers,
            ndim,
            target,
            a: STRETCH_SCALE,
            chain: vec![Vec::new(); nwalkers],
            lnprob: vec![Vec::new(); nwalkers],
            accepted: vec![0; nwalkers],
            iterations: 0,
        })
    }

    pub fn nwalkers(&self) -> usize {
        self.nwalkers
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Advance every walker `nsteps` times from `p0`; returns the final positions.
    pub fn run_mcmc(
        &mut self,
        p0: &[Vec<f64>],
        nsteps: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Vec<f64>>, AppError> {
        if p0.len() != self.nwalkers || p0.iter().any(|p| p.len() != self.ndim) {
            return Err(AppError::new(
                2,
                format!("Initial positions must be {} walkers x {} parameters.", self.nwalkers, self.ndim),
            ));
        }

        let mut pos: Vec<Vec<f64>> = p0.to_vec();
        let mut lnp: Vec<f64> = pos.par_iter().map(|p| self.target.ln_prob(p)).collect();
        if lnp.iter().any(|v| v.is_nan()) {
            return Err(AppError::new(4, "Log-probability is NaN at the initial positions."));
        }
        let n_bad = lnp.iter().filter(|v| !v.is_finite()).count();
        if n_bad > 0 {
            log::warn!("{n_bad} of {} walkers start with zero probability", self.nwalkers);
        }

        let half = self.nwalkers / 2;
        for _ in 0..nsteps {
            for first in [0, half] {
                let (active, other) = if first == 0 { (0..half, half..self.nwalkers) } else { (half..self.nwalkers, 0..half) };

                // Serial draws: partner index, stretch factor, acceptance uniform.
                let draws: Vec<(usize, f64, f64)> = active
                    .clone()
                    .map(|_| {
                        let j = rng.gen_range(other.clone());
                        let u: f64 = rng.r#gen();
                        let z = ((self.a - 1.0) * u + 1.0).powi(2) / self.a;
                        let r: f64 = rng.r#gen();
                        (j, z, r)
                    })
                    .collect();

                let proposals: Vec<Vec<f64>> = active
                    .clone()
                    .zip(&draws)
                    .map(|(k, &(j, z, _))| {
                        pos[j].iter().zip(&pos[k]).map(|(c, x)| c + z * (x - c)).collect()
                    })
                    .collect();

                let new_lnp: Vec<f64> = proposals.par_iter().map(|p| self.target.ln_prob(p)).collect();

                for ((k, proposal), (&(_, z, r), &lp)) in
                    active.clone().zip(proposals).zip(draws.iter().zip(&new_lnp))
                {
                    let log_ratio = (self.ndim as f64 - 1.0) * z.ln() + lp - lnp[k];
                    if lp.is_finite() && r.ln() < log_ratio {
                        pos[k] = proposal;
                        lnp[k] = lp;
                        self.accepted[k] += 1;
                    }
                }
            }

            for k in 0..self.nwalkers {
                self.chain[k].push(pos[k].clone());
                self.lnprob[k].push(lnp[k]);
            }
            self.iterations += 1;
        }

        Ok(pos)
    }

    /// Drop the stored chain and acceptance counts (e.g. after burn-in).
    pub fn reset(&mut self) {
        self.chain.iter_mut().for_each(Vec::clear);
        self.lnprob.iter_mut().for_each(Vec::clear);
        self.accepted.iter_mut().for_each(|a| *a = 0);
        self.iterations = 0;
    }

    /// Stored samples, `[walker][step][dim]`.
    pub fn chain(&self) -> &[Vec<Vec<f64>>] {
        &self.chain
    }

    /// Stored log-probabilities, `[walker][step]`.
    pub fn lnprobability(&self) -> &[Vec<f64>] {
        &self.lnprob
    }

    /// Samples of all walkers concatenated walker by walker.
    pub fn flat_chain(&self) -> Vec<Vec<f64>> {
        self.chain.iter().flatten().cloned().collect()
    }

    /// Values of one parameter across every walker and step.
    pub fn flat_param(&self, dim: usize) -> Vec<f64> {
        self.chain.iter().flatten().map(|s| s[dim]).collect()
    }

    pub fn acceptance_fraction(&self) -> Vec<f64> {
        self.accepted
            .iter()
            .map(|&a| if self.iterations == 0 { 0.0 } else { a as f64 / self.iterations as f64 })
            .collect()
    }

    /// Highest-probability stored sample; the first occurrence wins ties.
    pub fn best_sample(&self) -> Option<(Vec<f64>, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for (w, row) in self.lnprob.iter().enumerate() {
            for (s, &lp) in row.iter().enumerate() {
                if best.is_none_or(|(_, _, b)| lp > b) {
                    best = Some((w, s, lp));
                }
            }
        }
        best.map(|(w, s, lp)| (self.chain[w][s].clone(), lp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{mean, std_dev};
    use crate::models::Bounds;
    use rand::SeedableRng;

    struct Gaussian {
        mu: [f64; 2],
        sigma: [f64; 2],
        bounds: [Bounds; 2],
    }

    impl LogProb for Gaussian {
        fn ln_like(&self, p: &[f64]) -> f64 {
            p.iter()
                .zip(self.mu.iter().zip(&self.sigma))
                .map(|(x, (m, s))| -0.5 * ((x - m) / s).powi(2))
                .sum()
        }

        fn ln_prior(&self, p: &[f64]) -> f64 {
            if p.iter().zip(&self.bounds).all(|(&v, b)| b.contains(v)) { 0.0 } else { f64::NEG_INFINITY }
        }
    }

    fn start(nwalkers: usize, center: &[f64], rng: &mut StdRng) -> Vec<Vec<f64>> {
        (0..nwalkers)
            .map(|_| center.iter().map(|c| c + 1e-2 * (rng.r#gen::<f64>() - 0.5)).collect())
            .collect()
    }

    #[test]
    fn rejects_bad_walker_counts() {
        let g = Gaussian { mu: [0.0; 2], sigma: [1.0; 2], bounds: [Bounds::NONE; 2] };
        assert!(EnsembleSampler::new(3, 1, &g).is_err());
        assert!(EnsembleSampler::new(2, 2, &g).is_err());
        assert!(EnsembleSampler::new(4, 2, &g).is_ok());
    }

    #[test]
    fn reproduces_gaussian_moments() {
        let g = Gaussian { mu: [1.0, -2.0], sigma: [0.5, 2.0], bounds: [Bounds::NONE; 2] };
        let mut rng = StdRng::seed_from_u64(42);
        let mut sampler = EnsembleSampler::new(20, 2, &g).unwrap();
        let p0 = start(20, &[1.0, -2.0], &mut rng);

        let pos = sampler.run_mcmc(&p0, 300, &mut rng).unwrap();
        sampler.reset();
        sampler.run_mcmc(&pos, 3000, &mut rng).unwrap();

        let x0 = sampler.flat_param(0);
        let x1 = sampler.flat_param(1);
        assert_eq!(x0.len(), 20 * 3000);
        assert!((mean(&x0) - 1.0).abs() < 0.1, "mean0 {}", mean(&x0));
        assert!((mean(&x1) + 2.0).abs() < 0.4, "mean1 {}", mean(&x1));
        assert!((std_dev(&x0) - 0.5).abs() < 0.1, "sd0 {}", std_dev(&x0));
        assert!((std_dev(&x1) - 2.0).abs() < 0.4, "sd1 {}", std_dev(&x1));

        let acc = sampler.acceptance_fraction();
        assert!(acc.iter().all(|a| *a > 0.2 && *a < 0.95), "{acc:?}");
    }

    #[test]
    fn samples_respect_bounds_and_best_is_max() {
        let g = Gaussian {
            mu: [0.0, 0.0],
            sigma: [1.0, 1.0],
            bounds: [Bounds::new(0.2, 3.0), Bounds::lower(-0.5)],
        };
        let mut rng = StdRng::seed_from_u64(3);
        let mut sampler = EnsembleSampler::new(8, 2, &g).unwrap();
        let p0 = start(8, &[0.5, 0.0], &mut rng);
        sampler.run_mcmc(&p0, 500, &mut rng).unwrap();

        for s in sampler.flat_chain() {
            assert!(s[0] >= 0.2 && s[0] <= 3.0 && s[1] >= -0.5, "{s:?}");
        }

        let (best, best_lp) = sampler.best_sample().unwrap();
        let max_lp = sampler
            .lnprobability()
            .iter()
            .flatten()
            .fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        assert_eq!(best_lp, max_lp);
        assert_eq!(g.ln_prob(&best), best_lp);
    }

    #[test]
    fn same_seed_same_chain() {
        let g = Gaussian { mu: [0.0; 2], sigma: [1.0; 2], bounds: [Bounds::NONE; 2] };
        let run = || {
            let mut rng = StdRng::seed_from_u64(9);
            let mut s = EnsembleSampler::new(6, 2, &g).unwrap();
            let p0 = start(6, &[0.0, 0.0], &mut rng);
            s.run_mcmc(&p0, 50, &mut rng).unwrap();
            s.flat_chain()
        };
        assert_eq!(run(), run());
    }
}
