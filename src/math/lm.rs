//! Bounded Levenberg–Marquardt minimization of `Σ r_i(p)^2`.
//!
//! - forward-difference Jacobian (step `sqrt(eps) * |p|`, backwards at an upper bound)
//! - Marquardt scaling: damping uses `diag(JᵀJ)` so parameters with very
//!   different magnitudes (amplitudes ~100 vs. centers ~0.06) behave alike
//! - trial points are clamped into the bounds before evaluation
//! - damping update from Nielsen (1999): shrink on good steps, double on rejects
//!
//! A residual or Jacobian evaluation that fails at a trial point (e.g. a center
//! driven to zero) counts as a rejected step rather than aborting the fit.

use nalgebra::{DMatrix, DVector};

use crate::math::ols::solve_spd;
use crate::models::Bounds;

/// Relative tolerance default (minpack's `sqrt(machine eps)`).
pub const DEFAULT_TOL: f64 = 1.49012e-8;

const MAX_REJECTS: usize = 40;
const MAX_DAMPING: f64 = 1e16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    pub maxiter: usize,
    /// Stop when the relative reduction of the sum of squares falls below this.
    pub ftol: f64,
    /// Stop when the relative step length falls below this.
    pub xtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            maxiter: 100,
            ftol: DEFAULT_TOL,
            xtol: DEFAULT_TOL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmResult {
    pub x: Vec<f64>,
    /// Sum of squared residuals at `x`.
    pub cost: f64,
    /// Jacobian at `x` (rows = residuals, cols = parameters).
    pub jacobian: DMatrix<f64>,
    pub iterations: usize,
    pub nfev: usize,
    pub converged: bool,
    pub message: String,
}

/// Minimize `Σ f(p)_i^2` starting from `x0`.
///
/// `bounds` must have one entry per parameter. Fails only if the residuals
/// or the Jacobian cannot be evaluated at the (clamped) starting point.
pub fn levenberg_marquardt<F, E>(
    f: F,
    x0: &[f64],
    bounds: &[Bounds],
    opts: &LmOptions,
) -> Result<LmResult, E>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, E>,
{
    let n = x0.len();
    let mut x: Vec<f64> = x0.iter().zip(bounds).map(|(&v, b)| b.clamp(v)).collect();
    let mut r = f(&x)?;
    let mut nfev = 1;
    let mut cost = sum_sq(&r);

    let mut mu = 0.0;
    let mut nu = 2.0;
    let mut converged = false;
    let mut message = "maximum number of iterations reached".to_string();
    let mut iterations = 0;
    let mut jac = jacobian(&f, &x, &r, bounds, &mut nfev)?;

    if n == 0 {
        return Ok(LmResult {
            x,
            cost,
            jacobian: jac,
            iterations: 0,
            nfev,
            converged: true,
            message: "no free parameters".to_string(),
        });
    }

    for iter in 1..=opts.maxiter {
        iterations = iter;
        let jt = jac.transpose();
        let a = &jt * &jac;
        let rv = DVector::from_column_slice(&r);
        let g = &jt * &rv;

        if g.amax() <= f64::EPSILON * cost.max(f64::MIN_POSITIVE) {
            converged = true;
            message = "gradient is zero to machine precision".to_string();
            break;
        }

        let max_diag = a.diagonal().max().max(f64::MIN_POSITIVE);
        let scale: Vec<f64> = a.diagonal().iter().map(|&d| d.max(1e-12 * max_diag)).collect();
        if mu == 0.0 {
            mu = 1e-3;
        }

        let mut accepted = None;
        for _ in 0..MAX_REJECTS {
            let mut damped = a.clone();
            for (j, &s) in scale.iter().enumerate() {
                damped[(j, j)] += mu * s;
            }
            let Some(delta) = solve_spd(&damped, &(-&g)) else {
                if !increase_damping(&mut mu, &mut nu) {
                    break;
                }
                continue;
            };

            let trial: Vec<f64> = x
                .iter()
                .zip(delta.iter())
                .zip(bounds)
                .map(|((&xi, &di), b)| b.clamp(xi + di))
                .collect();
            let step = DVector::from_iterator(n, trial.iter().zip(&x).map(|(t, xi)| t - xi));

            // Predicted reduction for the (clamped) step actually taken.
            let lin = &rv + &jac * &step;
            let predicted = cost - lin.norm_squared();

            nfev += 1;
            let trial_r = match f(&trial) {
                Ok(v) if v.iter().all(|e| e.is_finite()) => v,
                _ => {
                    if !increase_damping(&mut mu, &mut nu) {
                        break;
                    }
                    continue;
                }
            };
            let trial_cost = sum_sq(&trial_r);

            if trial_cost < cost && predicted > 0.0 {
                let Ok(trial_jac) = jacobian(&f, &trial, &trial_r, bounds, &mut nfev) else {
                    if !increase_damping(&mut mu, &mut nu) {
                        break;
                    }
                    continue;
                };
                let rho = (cost - trial_cost) / predicted;
                mu *= (1.0f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
                nu = 2.0;
                accepted = Some((trial, trial_r, trial_jac, trial_cost, step.norm()));
                break;
            }
            if !increase_damping(&mut mu, &mut nu) {
                break;
            }
        }

        let Some((trial, trial_r, trial_jac, trial_cost, step_norm)) = accepted else {
            converged = true;
            message = "no further reduction in the sum of squares is possible".to_string();
            break;
        };

        let reduction = cost - trial_cost;
        let x_norm = DVector::from_column_slice(&trial).norm();
        x = trial;
        r = trial_r;
        cost = trial_cost;
        jac = trial_jac;

        if reduction <= opts.ftol * cost.max(f64::MIN_POSITIVE) {
            converged = true;
            message = "relative reduction in the sum of squares is at most ftol".to_string();
            break;
        }
        if step_norm <= opts.xtol * (x_norm + opts.xtol) {
            converged = true;
            message = "relative change in the parameters is at most xtol".to_string();
            break;
        }
    }

    log::debug!("levenberg-marquardt: {message} after {iterations} iterations ({nfev} evaluations)");

    Ok(LmResult {
        x,
        cost,
        jacobian: jac,
        iterations,
        nfev,
        converged,
        message,
    })
}

/// Returns `false` once the damping is too large to produce a useful step.
fn increase_damping(mu: &mut f64, nu: &mut f64) -> bool {
    *mu *= *nu;
    *nu *= 2.0;
    *mu <= MAX_DAMPING
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

fn jacobian<F, E>(
    f: &F,
    x: &[f64],
    r: &[f64],
    bounds: &[Bounds],
    nfev: &mut usize,
) -> Result<DMatrix<f64>, E>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, E>,
{
    let m = r.len();
    let n = x.len();
    let eps = DEFAULT_TOL;
    let mut jac = DMatrix::zeros(m, n);
    let mut xp = x.to_vec();

    for j in 0..n {
        let mut h = eps * x[j].abs();
        if h == 0.0 {
            h = eps;
        }
        if bounds[j].max.is_some_and(|hi| x[j] + h > hi) {
            h = -h;
        }
        xp[j] = x[j] + h;
        *nfev += 1;
        let rp = f(&xp)?;
        xp[j] = x[j];
        for i in 0..m {
            jac[(i, j)] = (rp[i] - r[i]) / h;
        }
    }
    Ok(jac)
}
