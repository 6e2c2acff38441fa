//! Per-sightline statistics from saved P92 chains.
//!
//! For every curve in a file list the matching chain is read, the first
//! `burn_frac` of each walker's steps is discarded and the remaining samples
//! give:
//!
//! - A(V) as 16/50/84 percentiles
//! - E(B-V) from the photometric point between 0.4 and 0.5 micron, drawn from
//!   a normal distribution (one draw per A(V) sample)
//! - R(V) = A(V)/E(B-V) percentiles over the paired draws
//! - silicate amplitudes, center and width as mean ± sd, plus the SIL1/SIL2
//!   amplitude ratio
//! - the NUV central intensity `a / (2 + b)` as percentiles (when sampled)

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{Chain, SummaryConfig};
use crate::error::AppError;
use crate::io::{BAND_SOURCE, ExtData, chain_path_for, read_chain_json, read_filelist, sightline_name};
use crate::math::{mean, percentiles, std_dev};
use crate::models::shapes::p92_width;

pub const DEFAULT_BURN_FRAC: f64 = 0.4;

/// Sightlines through dense clouds.
pub const DEFAULT_DENSE: [&str; 2] = ["hd283809", "hd029647"];

/// Value with (possibly asymmetric) errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub plus: f64,
    pub minus: f64,
}

impl Estimate {
    /// Median with 84th/16th percentile offsets.
    pub fn from_percentiles(samples: &[f64]) -> Self {
        let p = percentiles(samples, &[16.0, 50.0, 84.0]);
        Estimate {
            value: p[1],
            plus: p[2] - p[1],
            minus: p[1] - p[0],
        }
    }

    /// Mean with the standard deviation on both sides.
    pub fn from_moments(samples: &[f64]) -> Self {
        let sd = std_dev(samples);
        Estimate {
            value: mean(samples),
            plus: sd,
            minus: sd,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SightlineSummary {
    pub name: String,
    pub dense: bool,
    pub av: Estimate,
    pub ebv: Estimate,
    pub rv: Estimate,
    pub sil1_amp: Estimate,
    pub sil1_lambda: Estimate,
    pub sil1_b: Estimate,
    /// `λ0 √(2 + b)`
    pub sil1_width: Estimate,
    pub sil2_amp: Estimate,
    pub sil_ratio: Estimate,
    pub nuv_ceninten: Option<Estimate>,
}

fn column(chain: &Chain, name: &str, skip: usize) -> Result<Vec<f64>, AppError> {
    let dim = chain
        .param_index(name)
        .ok_or_else(|| AppError::new(3, format!("Chain for {} does not sample {name}.", chain.model)))?;
    Ok(chain.flat_param(dim, skip))
}

/// E(B-V) and its uncertainty from the curve.
fn ebv_point(ext: &ExtData) -> Option<(f64, f64)> {
    let band = ext.segments.get(BAND_SOURCE)?;
    band.good()
        .find(|&i| band.waves[i] > 0.4 && band.waves[i] < 0.5)
        .map(|i| (band.exts[i], band.uncs[i]))
}

pub fn summarize_sightline(
    name: &str,
    ext: &ExtData,
    chain: &Chain,
    burn_frac: f64,
    dense: bool,
    rng: &mut StdRng,
) -> Result<SightlineSummary, AppError> {
    let skip = (burn_frac.clamp(0.0, 1.0) * chain.nsteps() as f64) as usize;

    let av = column(chain, "Av", skip)?;
    if av.is_empty() {
        return Err(AppError::new(3, format!("{name}: no chain samples left after burn-in.")));
    }

    let (ebv_value, ebv_unc) = ebv_point(ext)
        .ok_or_else(|| AppError::new(3, format!("{name}: no photometric point between 0.4 and 0.5 micron.")))?;
    let normal = Normal::new(ebv_value, ebv_unc)
        .map_err(|e| AppError::new(4, format!("{name}: invalid E(B-V) distribution: {e}")))?;
    let ebv: Vec<f64> = (0..av.len()).map(|_| normal.sample(rng)).collect();
    let rv: Vec<f64> = av.iter().zip(&ebv).map(|(a, e)| a / e).collect();

    let sil1_amp = column(chain, "SIL1_amp", skip)?;
    let sil1_lambda = column(chain, "SIL1_lambda", skip)?;
    let sil1_b = column(chain, "SIL1_b", skip)?;
    let sil2_amp = column(chain, "SIL2_amp", skip)?;

    let width: Vec<f64> = sil1_lambda.iter().zip(&sil1_b).map(|(&l, &b)| p92_width(l, b)).collect();
    let ratio: Vec<f64> = sil1_amp.iter().zip(&sil2_amp).map(|(a1, a2)| a1 / a2).collect();

    let nuv_ceninten = match (column(chain, "NUV_amp", skip), column(chain, "NUV_b", skip)) {
        (Ok(a), Ok(b)) => {
            let ci: Vec<f64> = a.iter().zip(&b).map(|(a, b)| a / (2.0 + b)).collect();
            Some(Estimate::from_percentiles(&ci))
        }
        _ => None,
    };

    Ok(SightlineSummary {
        name: name.to_string(),
        dense,
        av: Estimate::from_percentiles(&av),
        ebv: Estimate::from_moments(&ebv),
        rv: Estimate::from_percentiles(&rv),
        sil1_amp: Estimate::from_moments(&sil1_amp),
        sil1_lambda: Estimate::from_moments(&sil1_lambda),
        sil1_b: Estimate::from_moments(&sil1_b),
        sil1_width: Estimate::from_moments(&width),
        sil2_amp: Estimate::from_moments(&sil2_amp),
        sil_ratio: Estimate::from_moments(&ratio),
        nuv_ceninten,
    })
}

/// Summaries for every curve named in the file list, in list order.
pub fn summarize_filelist(config: &SummaryConfig) -> Result<Vec<SightlineSummary>, AppError> {
    let files = read_filelist(&config.filelist)?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut out = Vec::with_capacity(files.len());
    for curve in &files {
        out.push(summarize_file(curve, config, &mut rng)?);
    }
    Ok(out)
}

fn summarize_file(curve: &Path, config: &SummaryConfig, rng: &mut StdRng) -> Result<SightlineSummary, AppError> {
    let name = sightline_name(curve);
    let ext = ExtData::load(curve)?;
    let chain_path: PathBuf = chain_path_for(curve);
    let chain = read_chain_json(&chain_path)?;
    let dense = config.dense.iter().any(|d| d == &name);
    log::info!(
        "{name}: {} walkers x {} steps from {}",
        chain.nwalkers(),
        chain.nsteps(),
        chain_path.display()
    );
    summarize_sightline(&name, &ext, &chain, config.burn_frac, dense, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExtType;
    use crate::io::ExtSegment;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn curve(ebv: f64, unc: f64) -> ExtData {
        let mut segments = BTreeMap::new();
        segments.insert(
            BAND_SOURCE.to_string(),
            ExtSegment {
                waves: vec![0.366, 0.438, 0.545],
                exts: vec![1.2, ebv, 0.0],
                uncs: vec![0.02, unc, 0.01],
                npts: vec![1.0; 3],
                names: vec!["U".to_string(), "B".to_string(), "V".to_string()],
            },
        );
        ExtData {
            ext_type: ExtType::Elx,
            red_file: "red.dat".to_string(),
            comp_file: "comp.dat".to_string(),
            created: chrono::Utc::now(),
            segments,
            columns: BTreeMap::new(),
            fits: BTreeMap::new(),
        }
    }

    /// Chain whose steps are constant per dimension except for `Av`.
    fn chain(nsteps: usize) -> Chain {
        let names = ["Av", "SIL1_amp", "SIL1_lambda", "SIL1_b", "SIL2_amp", "NUV_amp", "NUV_b"];
        let walker = |w: usize| {
            (0..nsteps)
                .map(|s| {
                    let av = if s < nsteps / 2 { 100.0 } else { 3.0 + 0.01 * w as f64 };
                    vec![av, 0.06, 9.7, -1.95, 0.03, 0.5, -1.0]
                })
                .collect::<Vec<_>>()
        };
        Chain {
            model: "P92".to_string(),
            param_names: names.iter().map(|s| s.to_string()).collect(),
            nburn: 0,
            seed: 1,
            samples: (0..4).map(walker).collect(),
            lnprob: vec![vec![0.0; nsteps]; 4],
            acceptance_fraction: vec![0.3; 4],
        }
    }

    #[test]
    fn burn_fraction_discards_early_steps() {
        let mut rng = StdRng::seed_from_u64(3);
        let s = summarize_sightline("hd1", &curve(1.0, 1e-9), &chain(10), 0.5, false, &mut rng).unwrap();
        assert!(s.av.value < 3.1, "{:?}", s.av);
        assert_relative_eq!(s.ebv.value, 1.0, max_relative = 1e-6);
        assert_relative_eq!(s.rv.value, s.av.value, max_relative = 1e-6);
        assert_relative_eq!(s.sil_ratio.value, 2.0, max_relative = 1e-12);
        assert!(s.sil1_amp.plus < 1e-12);
        assert_relative_eq!(s.sil1_width.value, 9.7 * 0.05f64.sqrt(), max_relative = 1e-12);
        assert_relative_eq!(s.nuv_ceninten.unwrap().value, 0.5, max_relative = 1e-12);
    }

    #[test]
    fn missing_silicate_parameter_is_reported() {
        let mut c = chain(4);
        c.param_names[1] = "FUV_amp".to_string();
        let mut rng = StdRng::seed_from_u64(3);
        let err = summarize_sightline("hd1", &curve(1.0, 0.01), &c, 0.4, false, &mut rng).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.message().contains("SIL1_amp"));
    }

    #[test]
    fn ebv_draws_follow_band_uncertainty() {
        let mut rng = StdRng::seed_from_u64(5);
        let s = summarize_sightline("hd1", &curve(0.8, 0.05), &chain(2000), 0.5, true, &mut rng).unwrap();
        assert!(s.dense);
        assert!((s.ebv.value - 0.8).abs() < 0.005, "{:?}", s.ebv);
        assert!((s.ebv.plus - 0.05).abs() < 0.005, "{:?}", s.ebv);
    }

    #[test]
    fn moments_and_percentiles() {
        let e = Estimate::from_moments(&[1.0, 3.0]);
        assert_eq!(e, Estimate { value: 2.0, plus: 1.0, minus: 1.0 });
        let p = Estimate::from_percentiles(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_relative_eq!(p.value, 2.0);
        assert_relative_eq!(p.plus, 1.36, max_relative = 1e-12);
    }
}
