//! Many saved curves on one figure: UV and mid-IR panels.
//!
//! Curves are converted to A(λ)/A(V) and sorted by their mean near-UV value
//! (0.25-0.30 micron, IUE) so the stacked UV panel is ordered. In the UV panel
//! each curve is divided by that value; both panels add a per-curve offset.

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::MultiConfig;
use crate::error::AppError;
use crate::io::{BAND_SOURCE, ExtData, read_filelist, sightline_name};
use crate::models::shapes::exv_to_axav;
use crate::plot::ascii::{AsciiSeries, render_ascii_plot};
use crate::plot::figure::{DrawResult, Figure, logspace, padded_range};

/// Wavelength range (micron) used for the UV normalization.
pub const NORM_RANGE: (f64, f64) = (0.25, 0.30);

pub const NORM_SOURCE: &str = "IUE";

/// Saved model overlaid on each curve.
pub const OVERLAY_MODEL: &str = "P92";

const COLORS: [RGBColor; 2] = [BLUE, GREEN];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Panel {
    pub range: (f64, f64),
    pub offset: f64,
    pub normalize: bool,
    pub y_label: &'static str,
}

pub const UV_PANEL: Panel = Panel {
    range: (0.115, 0.33),
    offset: 0.5,
    normalize: true,
    y_label: "A(λ)/A(0.27 micron) + constant",
};

pub const IR_PANEL: Panel = Panel {
    range: (1.0, 25.0),
    offset: 0.1,
    normalize: false,
    y_label: "A(λ)/A(V) + constant",
};

#[derive(Debug, Clone)]
pub struct MultiCurve {
    pub name: String,
    /// A(λ)/A(V)
    pub ext: ExtData,
    pub normval: f64,
    /// Saved model as `(wavelength, A(λ)/A(V))`.
    pub model: Option<Vec<(f64, f64)>>,
}

impl MultiCurve {
    /// `(data, model)` points for `panel` at stack position `i`.
    fn panel_points(&self, panel: &Panel, i: usize) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
        let (lo, hi) = panel.range;
        let norm = if panel.normalize { self.normval } else { 1.0 };
        let shift = |v: f64| v / norm + i as f64 * panel.offset;
        let inside = |w: f64| w >= lo && w <= hi;

        let data = self
            .ext
            .segments
            .values()
            .flat_map(|seg| seg.good().map(move |k| (seg.waves[k], seg.exts[k])))
            .filter(|p| inside(p.0))
            .map(|(w, v)| (w, shift(v)))
            .collect();
        let model = self
            .model
            .iter()
            .flatten()
            .filter(|p| inside(p.0))
            .map(|&(w, v)| (w, shift(v)))
            .collect();
        (data, model)
    }
}

#[derive(Debug, Clone)]
pub struct MultiFigure {
    pub curves: Vec<MultiCurve>,
    pub show_data: bool,
}

/// Mean A(λ)/A(V) of the usable IUE points in [`NORM_RANGE`]; 1 without any.
pub fn uv_normalization(alav: &ExtData) -> f64 {
    let Some(seg) = alav.segments.get(NORM_SOURCE) else {
        return 1.0;
    };
    let vals: Vec<f64> = seg
        .good()
        .filter(|&k| seg.waves[k] >= NORM_RANGE.0 && seg.waves[k] <= NORM_RANGE.1)
        .map(|k| seg.exts[k])
        .collect();
    if vals.is_empty() {
        1.0
    } else {
        crate::math::mean(&vals)
    }
}

fn prepare_curve(ext: ExtData, name: String, config: &MultiConfig) -> Result<Option<MultiCurve>, AppError> {
    let saved = ext.saved_model(OVERLAY_MODEL);
    let Some(av) = ext.column("AV").or_else(|| saved.and_then(|m| m.av())) else {
        log::warn!("{name}: no A(V) column or saved {OVERLAY_MODEL} fit, skipping");
        return Ok(None);
    };

    let model = if config.models || config.modonly {
        match saved {
            Some(m) => {
                let waves = logspace(-1.0, 2.0, 200);
                let x: Vec<f64> = waves.iter().map(|w| 1.0 / w).collect();
                let y = m.evaluate(&x)?;
                let values = y.into_iter().map(|e| if m.is_elx() { exv_to_axav(e, av) } else { e });
                Some(waves.iter().copied().zip(values).collect())
            }
            None => {
                log::warn!("{name}: no saved {OVERLAY_MODEL} fit to overlay");
                None
            }
        }
    } else {
        None
    };

    let mut alav = ext.to_alav(av);
    if let Some(fac) = config.rebin_fac {
        for (source, seg) in alav.segments.iter_mut() {
            if source != BAND_SOURCE {
                *seg = seg.rebinned(fac);
            }
        }
    }
    let normval = uv_normalization(&alav);
    Ok(Some(MultiCurve {
        name,
        ext: alav,
        normval,
        model,
    }))
}

impl MultiFigure {
    pub fn load(config: &MultiConfig) -> Result<Self, AppError> {
        let files = read_filelist(&config.filelist)?;
        let mut curves = Vec::with_capacity(files.len());
        for path in &files {
            let ext = ExtData::load(path)?;
            if let Some(curve) = prepare_curve(ext, sightline_name(path), config)? {
                curves.push(curve);
            }
        }
        if curves.is_empty() {
            return Err(AppError::new(3, "No curve in the list has an A(V) to normalize by."));
        }
        curves.sort_by(|a, b| b.normval.total_cmp(&a.normval));
        log::info!("plotting {} curves", curves.len());
        Ok(MultiFigure {
            curves,
            show_data: !config.modonly,
        })
    }

    fn draw_panel<DB>(&self, area: &DrawingArea<DB, Shift>, panel: &Panel) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let sets: Vec<_> = self
            .curves
            .iter()
            .enumerate()
            .map(|(i, c)| c.panel_points(panel, i))
            .collect();
        let (y0, y1) = padded_range(
            sets.iter().flat_map(|(d, m)| {
                let d = if self.show_data { d.as_slice() } else { &[] };
                d.iter().chain(m.iter()).map(|p| p.1)
            }),
            0.05,
        )
        .unwrap_or((0.0, 1.0));

        let mut chart = ChartBuilder::on(area)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(panel.range.0..panel.range.1, y0..y1)?;
        chart
            .configure_mesh()
            .x_desc("λ [micron]")
            .y_desc(panel.y_label)
            .draw()?;

        for (i, (data, model)) in sets.iter().enumerate() {
            let color = COLORS[i % COLORS.len()];
            if self.show_data {
                chart.draw_series(data.iter().map(|&p| Circle::new(p, 2, color.filled())))?;
            }
            if !model.is_empty() {
                chart.draw_series(LineSeries::new(model.iter().copied(), color.mix(0.5).stroke_width(2)))?;
            }
        }
        Ok(())
    }
}

impl Figure for MultiFigure {
    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let panels = root.split_evenly((1, 2));
        self.draw_panel(&panels[0], &UV_PANEL)?;
        self.draw_panel(&panels[1], &IR_PANEL)?;
        root.present()?;
        Ok(())
    }

    fn preview(&self, width: usize, height: usize) -> String {
        let mut out = String::new();
        for (title, panel) in [("UV", &UV_PANEL), ("mid-IR", &IR_PANEL)] {
            let mut series = Vec::new();
            for (i, c) in self.curves.iter().enumerate() {
                let (data, model) = c.panel_points(panel, i);
                if !model.is_empty() {
                    series.push(AsciiSeries::line(model, '-'));
                }
                if self.show_data {
                    let glyph = char::from_digit((i % 10) as u32, 10).unwrap_or('o');
                    series.push(AsciiSeries::points(data, glyph));
                }
            }
            out.push_str(&render_ascii_plot(title, "λ", &series, false, width, height));
        }
        out
    }
}
