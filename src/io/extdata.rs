//! Extinction curves: calculation, fit preparation, save/load.
//!
//! An [`ExtData`] holds one curve split by source (`BAND` for photometry plus
//! one segment per spectrum instrument), a few named scalar columns (`AV`,
//! `EBV`, `RV`) and the saved results of every fitted model. It is written as a
//! pretty-printed JSON document.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{SPECTRUM_KEYS, StarData, band_wavelength};
use crate::domain::{ExtType, FitData};
use crate::error::AppError;
use crate::fit::McmcFit;
use crate::models::CurveModel;

/// UV wind-line regions (1/micron) removed from fits by default.
pub const UV_WIND_REGIONS: [(f64, f64); 2] = [(6.4, 6.6), (7.1, 7.3)];

/// Lyman-alpha region (1/micron).
pub const LYA_REGION: (f64, f64) = (8.0, 8.45);

pub const BAND_SOURCE: &str = "BAND";

/// Stored spelling of a source name, matched case-insensitively against
/// `BAND` and the spectrum instrument keys.
pub fn canonical_source(name: &str) -> Option<&'static str> {
    let name = name.trim();
    std::iter::once(BAND_SOURCE)
        .chain(SPECTRUM_KEYS)
        .find(|key| key.eq_ignore_ascii_case(name))
}

const LOG10_SCALE: f64 = 2.5 / std::f64::consts::LN_10;

/// One source's part of the curve; all arrays have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtSegment {
    pub waves: Vec<f64>,
    pub exts: Vec<f64>,
    pub uncs: Vec<f64>,
    pub npts: Vec<f64>,
    /// Band names (only for `BAND`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

impl ExtSegment {
    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    fn check_lengths(&self, source: &str) -> Result<(), AppError> {
        let n = self.waves.len();
        let names_ok = self.names.is_empty() || self.names.len() == n;
        if self.exts.len() != n || self.uncs.len() != n || self.npts.len() != n || !names_ok {
            return Err(AppError::new(2, format!("Segment {source}: array lengths differ.")));
        }
        Ok(())
    }

    /// Indices of usable points (`npts > 0`).
    pub fn good(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&i| self.npts[i] > 0.0)
    }

    /// Inverse-variance average of consecutive groups of `fac` usable points.
    pub fn rebinned(&self, fac: usize) -> ExtSegment {
        if fac <= 1 {
            return self.clone();
        }
        let good: Vec<usize> = self.good().collect();
        let mut out = ExtSegment::default();
        for group in good.chunks(fac) {
            let mut sw = 0.0;
            let mut swave = 0.0;
            let mut sext = 0.0;
            let mut npts = 0.0;
            for &i in group {
                let w = if self.uncs[i] > 0.0 { 1.0 / self.uncs[i].powi(2) } else { 1.0 };
                sw += w;
                swave += w * self.waves[i];
                sext += w * self.exts[i];
                npts += self.npts[i];
            }
            out.waves.push(swave / sw);
            out.exts.push(sext / sw);
            out.uncs.push(1.0 / sw.sqrt());
            out.npts.push(npts);
        }
        out
    }
}

/// Named scalar with optional uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub value: f64,
    #[serde(default)]
    pub unc: Option<f64>,
}

/// Best-fit parameters of one model as stored in a curve file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFit {
    pub names: Vec<String>,
    pub values: Vec<f64>,
    /// `+` uncertainties (MCMC p84 - p50, or least-squares sigma).
    #[serde(default)]
    pub unc_plus: Option<Vec<f64>>,
    #[serde(default)]
    pub unc_minus: Option<Vec<f64>>,
    /// Full model (terms, bounds, fixed flags) so it can be re-evaluated.
    pub model: CurveModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtData {
    #[serde(rename = "type")]
    pub ext_type: ExtType,
    pub red_file: String,
    pub comp_file: String,
    pub created: DateTime<Utc>,
    pub segments: BTreeMap<String, ExtSegment>,
    #[serde(default)]
    pub columns: BTreeMap<String, Column>,
    #[serde(default)]
    pub fits: BTreeMap<String, SavedFit>,
}

impl ExtData {
    /// E(λ - V) of `red` relative to `comp`.
    ///
    /// Bands: `(m_red - V_red) - (m_comp - V_comp)` for every band both stars
    /// share. Spectra: `-2.5 log10(f_red / f_comp) + (V_comp - V_red)` where both
    /// points are usable.
    pub fn calc_elx(red: &StarData, comp: &StarData) -> Result<Self, AppError> {
        let (Some(red_v), Some(comp_v)) = (red.band("V"), comp.band("V")) else {
            return Err(AppError::new(
                2,
                format!("Both {} and {} need a V magnitude.", red.name, comp.name),
            ));
        };
        let v_unc2 = red_v.unc.powi(2) + comp_v.unc.powi(2);

        let mut segments = BTreeMap::new();

        let mut band = ExtSegment::default();
        for (name, r) in &red.bands {
            let Some(c) = comp.band(name) else { continue };
            let Some(wave) = band_wavelength(name) else {
                log::warn!("unknown band '{name}', skipping");
                continue;
            };
            band.waves.push(wave);
            band.exts.push((r.mag - red_v.mag) - (c.mag - comp_v.mag));
            band.uncs.push((r.unc.powi(2) + c.unc.powi(2) + v_unc2).sqrt());
            band.npts.push(1.0);
            band.names.push(name.clone());
        }
        if !band.is_empty() {
            segments.insert(BAND_SOURCE.to_string(), band);
        }

        for (key, rs) in &red.spectra {
            let Some(cs) = comp.spectra.get(key) else { continue };
            if rs.len() != cs.len() {
                log::warn!("{key}: {} and {} spectra have different lengths, skipping", red.name, comp.name);
                continue;
            }
            let mut seg = ExtSegment {
                waves: rs.wave.clone(),
                exts: vec![0.0; rs.len()],
                uncs: vec![0.0; rs.len()],
                npts: vec![0.0; rs.len()],
                names: Vec::new(),
            };
            for i in 0..rs.len() {
                let usable = rs.npts[i] > 0.0 && cs.npts[i] > 0.0 && rs.flux[i] > 0.0 && cs.flux[i] > 0.0;
                if !usable {
                    continue;
                }
                let ratio = rs.flux[i] / cs.flux[i];
                seg.exts[i] = -2.5 * ratio.log10() + (comp_v.mag - red_v.mag);
                let frac2 = (rs.unc[i] / rs.flux[i]).powi(2) + (cs.unc[i] / cs.flux[i]).powi(2);
                seg.uncs[i] = (LOG10_SCALE.powi(2) * frac2 + v_unc2).sqrt();
                seg.npts[i] = rs.npts[i].min(cs.npts[i]);
            }
            segments.insert(key.clone(), seg);
        }

        if segments.is_empty() {
            return Err(AppError::new(
                3,
                format!("No common bands or spectra between {} and {}.", red.name, comp.name),
            ));
        }

        let mut columns = BTreeMap::new();
        if let (Some(rb), Some(cb)) = (red.band("B"), comp.band("B")) {
            let ebv = (rb.mag - red_v.mag) - (cb.mag - comp_v.mag);
            let unc = (rb.unc.powi(2) + cb.unc.powi(2) + v_unc2).sqrt();
            columns.insert("EBV".to_string(), Column { value: ebv, unc: Some(unc) });
        }

        Ok(ExtData {
            ext_type: ExtType::Elx,
            red_file: format!("{}.dat", red.name),
            comp_file: format!("{}.dat", comp.name),
            created: Utc::now(),
            segments,
            columns,
            fits: BTreeMap::new(),
        })
    }

    /// Usable points from `sources`, optionally without UV wind/Lyα regions,
    /// sorted by wavelength.
    pub fn fit_data(
        &self,
        sources: &[String],
        remove_uvwind: bool,
        remove_lya: bool,
    ) -> Result<FitData, AppError> {
        let mut points: Vec<(f64, f64, f64)> = Vec::new();
        for source in sources {
            let Some(seg) = self.segments.get(source) else {
                log::warn!("source {source} not present in curve");
                continue;
            };
            for i in seg.good() {
                let (w, y, s) = (seg.waves[i], seg.exts[i], seg.uncs[i]);
                if !(w > 0.0 && s > 0.0 && y.is_finite()) {
                    continue;
                }
                let x = 1.0 / w;
                let in_region = |r: (f64, f64)| x >= r.0 && x <= r.1;
                if remove_uvwind && UV_WIND_REGIONS.iter().any(|&r| in_region(r)) {
                    continue;
                }
                if remove_lya && in_region(LYA_REGION) {
                    continue;
                }
                points.push((w, y, s));
            }
        }
        if points.is_empty() {
            return Err(AppError::new(3, format!("No usable points in sources [{}].", sources.join(", "))));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(FitData {
            x: points.iter().map(|p| 1.0 / p.0).collect(),
            wave: points.iter().map(|p| p.0).collect(),
            y: points.iter().map(|p| p.1).collect(),
            unc: points.iter().map(|p| p.2).collect(),
        })
    }

    /// Store a fit; MCMC results (if any) take precedence for values and errors.
    pub fn set_fit(&mut self, key: &str, model: &CurveModel, sigmas: &[(String, f64)], mcmc: Option<&McmcFit>) {
        let (model, names, values, plus, minus) = match mcmc {
            Some(m) => {
                let names: Vec<String> = m.model.params.names().iter().map(|s| s.to_string()).collect();
                let lookup = |n: &String| m.params.iter().find(|p| &p.name == n);
                let plus = names.iter().map(|n| lookup(n).map_or(0.0, |p| p.plus)).collect();
                let minus = names.iter().map(|n| lookup(n).map_or(0.0, |p| p.minus)).collect();
                (m.model.clone(), names.clone(), m.model.params.values(), Some(plus), Some(minus))
            }
            None => {
                let names: Vec<String> = model.params.names().iter().map(|s| s.to_string()).collect();
                let unc: Vec<f64> = names
                    .iter()
                    .map(|n| sigmas.iter().find(|(s, _)| s == n).map_or(0.0, |(_, v)| *v))
                    .collect();
                let plus = (!sigmas.is_empty()).then(|| unc.clone());
                let minus = (!sigmas.is_empty()).then_some(unc);
                (model.clone(), names, model.params.values(), plus, minus)
            }
        };
        self.fits.insert(
            key.to_string(),
            SavedFit {
                names,
                values,
                unc_plus: plus,
                unc_minus: minus,
                model,
            },
        );
    }

    pub fn saved_model(&self, key: &str) -> Option<&CurveModel> {
        self.fits.get(key).map(|f| &f.model)
    }

    /// Set `AV` (and `RV` if a nonzero `EBV` is known).
    pub fn set_av(&mut self, av: f64, unc: Option<f64>) {
        self.columns.insert("AV".to_string(), Column { value: av, unc });
        self.columns.remove("RV");
        if let Some(ebv) = self.columns.get("EBV").copied() {
            if !(ebv.value.is_finite() && ebv.value != 0.0) {
                log::warn!("E(B-V) = {}, not setting R(V)", ebv.value);
                return;
            }
            let rv = av / ebv.value;
            let rv_unc = match (unc, ebv.unc) {
                (Some(a), Some(e)) => Some(rv * ((a / av).powi(2) + (e / ebv.value).powi(2)).sqrt()),
                _ => None,
            }
            .filter(|u| u.is_finite());
            self.columns.insert("RV".to_string(), Column { value: rv, unc: rv_unc });
        }
    }

    pub fn column(&self, name: &str) -> Option<f64> {
        self.columns.get(name).map(|c| c.value)
    }

    /// Copy converted to A(λ)/A(V) = E(λ - V)/A(V) + 1.
    pub fn to_alav(&self, av: f64) -> ExtData {
        let mut out = self.clone();
        if self.ext_type == ExtType::Alax {
            return out;
        }
        for seg in out.segments.values_mut() {
            for (e, u) in seg.exts.iter_mut().zip(seg.uncs.iter_mut()) {
                *e = *e / av + 1.0;
                *u /= av;
            }
        }
        out.ext_type = ExtType::Alax;
        out
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let file = File::create(path)
            .map_err(|e| AppError::new(2, format!("Failed to create curve file '{}': {e}", path.display())))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| AppError::new(2, format!("Failed to write curve file '{}': {e}", path.display())))
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open curve file '{}': {e}", path.display())))?;
        let ext: ExtData = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| AppError::new(2, format!("Invalid curve file '{}': {e}", path.display())))?;
        for (source, seg) in &ext.segments {
            seg.check_lengths(source)?;
        }
        Ok(ext)
    }
}
