//! Reduced observations of one star.
//!
//! A star is described by a `.dat` file:
//!
//! ```text
//! # comment
//! name = HD 283809
//! sptype = B1.5 V
//! V = 10.73 +/- 0.01
//! B = 11.89 +/- 0.02
//! IUE = IUE_Data/hd283809_iue.txt
//! ```
//!
//! - `KEY = VALUE +/- UNC` lines are band magnitudes
//! - `KEY = path` lines with a known instrument key reference an ASCII spectrum,
//!   resolved relative to the data directory
//! - anything else is kept as free-form metadata

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Instruments whose spectra can be referenced from a `.dat` file.
pub const SPECTRUM_KEYS: [&str; 5] = ["IUE", "STIS", "SpeX_SXD", "SpeX_LXD", "IRS"];

/// Effective wavelengths (micron) of the supported photometric bands.
const BAND_WAVELENGTHS: [(&str, f64); 19] = [
    ("U", 0.366),
    ("B", 0.438),
    ("V", 0.545),
    ("R", 0.641),
    ("I", 0.798),
    ("J", 1.22),
    ("H", 1.63),
    ("K", 2.19),
    ("L", 3.45),
    ("M", 4.75),
    ("IRAC1", 3.52),
    ("IRAC2", 4.46),
    ("IRAC3", 5.67),
    ("IRAC4", 7.59),
    ("MIPS24", 23.7),
    ("WISE1", 3.35),
    ("WISE2", 4.60),
    ("WISE3", 11.56),
    ("WISE4", 22.08),
];

/// Effective wavelength of a band, if known.
pub fn band_wavelength(name: &str) -> Option<f64> {
    BAND_WAVELENGTHS.iter().find(|(n, _)| *n == name).map(|(_, w)| *w)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandMag {
    pub mag: f64,
    pub unc: f64,
}

/// Spectrum arrays; `npts = 0` marks unusable points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    pub wave: Vec<f64>,
    pub flux: Vec<f64>,
    pub unc: Vec<f64>,
    pub npts: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.wave.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wave.is_empty()
    }

    /// Parse whitespace columns `wave flux unc [npts]`.
    pub fn parse(text: &str, source: &str) -> Result<Self, AppError> {
        let mut spec = Spectrum::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<f64> = line
                .split_whitespace()
                .map(|t| t.parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|e| AppError::new(2, format!("{source}:{}: invalid number: {e}", idx + 1)))?;
            if cols.len() < 3 {
                return Err(AppError::new(
                    2,
                    format!("{source}:{}: expected `wave flux unc [npts]`, got {} columns", idx + 1, cols.len()),
                ));
            }
            spec.wave.push(cols[0]);
            spec.flux.push(cols[1]);
            spec.unc.push(cols[2]);
            spec.npts.push(cols.get(3).copied().unwrap_or(1.0));
        }
        if spec.is_empty() {
            return Err(AppError::new(3, format!("{source}: spectrum has no data rows")));
        }
        Ok(spec)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::new(2, format!("Failed to read spectrum '{}': {e}", path.display())))?;
        Self::parse(&text, &path.display().to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StarData {
    pub name: String,
    /// Band magnitudes in file order.
    pub bands: Vec<(String, BandMag)>,
    pub meta: BTreeMap<String, String>,
    pub spectra: BTreeMap<String, Spectrum>,
}

impl StarData {
    pub fn band(&self, name: &str) -> Option<BandMag> {
        self.bands.iter().find(|(n, _)| n == name).map(|(_, b)| *b)
    }

    /// Load `{data_path}/DAT_files/{name}.dat` and every spectrum it references.
    pub fn load(data_path: &Path, name: &str) -> Result<Self, AppError> {
        let path = dat_path(data_path, name);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| AppError::new(2, format!("Failed to read star file '{}': {e}", path.display())))?;
        let parsed = parse_dat(&text, &path.display().to_string())?;

        let mut spectra = BTreeMap::new();
        for (key, rel) in &parsed.spectrum_files {
            let spec = Spectrum::load(&data_path.join(rel))?;
            log::debug!("{name}: {key} spectrum with {} points", spec.len());
            spectra.insert(key.clone(), spec);
        }

        log::info!(
            "loaded {name}: {} bands, spectra [{}]",
            parsed.bands.len(),
            spectra.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        Ok(StarData {
            name: name.to_string(),
            bands: parsed.bands,
            meta: parsed.meta,
            spectra,
        })
    }
}

pub fn dat_path(data_path: &Path, name: &str) -> PathBuf {
    data_path.join("DAT_files").join(format!("{name}.dat"))
}

/// Contents of a `.dat` file before spectra are read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatFile {
    pub bands: Vec<(String, BandMag)>,
    pub meta: BTreeMap<String, String>,
    pub spectrum_files: Vec<(String, String)>,
}

pub fn parse_dat(text: &str, source: &str) -> Result<DatFile, AppError> {
    let mut out = DatFile::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            log::warn!("{source}:{}: ignoring line without `=`", idx + 1);
            continue;
        };
        let key = key.trim().to_string();
        let value = value.trim();

        if let Some((mag, unc)) = value.split_once("+/-") {
            let parse = |s: &str| {
                s.trim()
                    .parse::<f64>()
                    .map_err(|e| AppError::new(2, format!("{source}:{}: invalid magnitude for {key}: {e}", idx + 1)))
            };
            out.bands.push((
                key.clone(),
                BandMag {
                    mag: parse(mag)?,
                    unc: parse(unc)?,
                },
            ));
        } else if SPECTRUM_KEYS.contains(&key.as_str()) {
            out.spectrum_files.push((key, value.to_string()));
        } else {
            out.meta.insert(key, value.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dat_sections() {
        let text = "# star\nname = HD 1\nV = 10.5 +/- 0.01\nB=11.0+/-0.02\nIUE = IUE_Data/hd1.txt\nnonsense\n";
        let dat = parse_dat(text, "hd1.dat").unwrap();
        assert_eq!(dat.bands.len(), 2);
        assert_eq!(dat.bands[1].0, "B");
        assert_eq!(dat.bands[1].1, BandMag { mag: 11.0, unc: 0.02 });
        assert_eq!(dat.meta.get("name").map(String::as_str), Some("HD 1"));
        assert_eq!(dat.spectrum_files, vec![("IUE".to_string(), "IUE_Data/hd1.txt".to_string())]);
    }

    #[test]
    fn bad_magnitude_reports_line() {
        let err = parse_dat("V = 10.5 +/- 0.01\nB = abc +/- 0.1\n", "x.dat").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().starts_with("x.dat:2:"), "{}", err.message());
    }

    #[test]
    fn parses_spectrum_columns() {
        let s = Spectrum::parse("# w f u n\n0.12 1e-12 1e-14 3\n0.13 2e-12 1e-14\n", "s.txt").unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.npts, vec![3.0, 1.0]);
        assert!(Spectrum::parse("0.1 1.0\n", "s.txt").is_err());
        assert_eq!(Spectrum::parse("# only comments\n", "s.txt").unwrap_err().exit_code(), 3);
    }

    #[test]
    fn band_table_lookup() {
        assert_eq!(band_wavelength("V"), Some(0.545));
        assert_eq!(band_wavelength("WISE4"), Some(22.08));
        assert_eq!(band_wavelength("Z"), None);
    }
}
