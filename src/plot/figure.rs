//! Figure output: PNG/SVG through Plotters, or an ASCII preview on stdout.

use std::error::Error;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::{FigureFormat, FigureOptions};
use crate::error::AppError;

pub type DrawResult = Result<(), Box<dyn Error>>;

/// Series colors, cycled.
pub const PALETTE: [RGBColor; 6] = [BLUE, RED, GREEN, MAGENTA, CYAN, BLACK];

pub fn palette(i: usize) -> RGBColor {
    PALETTE[i % PALETTE.len()]
}

/// Something that can be drawn on any Plotters backend and previewed as text.
pub trait Figure {
    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static;

    fn preview(&self, width: usize, height: usize) -> String;
}

/// `{base}.{ext}`
pub fn figure_path(base: &Path, format: FigureFormat) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(format.extension());
    PathBuf::from(name)
}

/// Write `figure` to `{base}.{png|svg}`, or print its preview when no format
/// is selected. Returns the written path.
pub fn output_figure<F: Figure>(figure: &F, base: &Path, opts: &FigureOptions) -> Result<Option<PathBuf>, AppError> {
    let Some(format) = opts.format else {
        println!("{}", figure.preview(opts.term_width, opts.term_height));
        return Ok(None);
    };

    let path = figure_path(base, format);
    let size = (opts.width, opts.height);
    let result = match format {
        FigureFormat::Png => figure.draw(&BitMapBackend::new(&path, size).into_drawing_area()),
        FigureFormat::Svg => figure.draw(&SVGBackend::new(&path, size).into_drawing_area()),
    };
    result.map_err(|e| AppError::new(2, format!("Failed to draw figure '{}': {e}", path.display())))?;
    log::info!("wrote {}", path.display());
    Ok(Some(path))
}

/// `n` points evenly spaced in log10 between `10^lo` and `10^hi`.
pub fn logspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![10f64.powf(lo)],
        _ => (0..n)
            .map(|i| 10f64.powf(lo + (hi - lo) * i as f64 / (n - 1) as f64))
            .collect(),
    }
}

/// Finite min/max of `values`, padded by `pad` (absolute); `None` if empty.
pub fn padded_range(values: impl IntoIterator<Item = f64>, pad: f64) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() {
        return None;
    }
    if hi - lo < 1e-12 {
        return Some((lo - pad.max(0.5), hi + pad.max(0.5)));
    }
    Some((lo - pad, hi + pad))
}
