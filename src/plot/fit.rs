//! Extinction curve with fitted models.
//!
//! The main panel shows every source of the curve on a log wavelength axis
//! (photometry as points with error bars, spectra as lines), the initial and
//! fitted models, the model components and the `-A(V)` asymptote. An inset
//! zooms into the 2-35 micron region.

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::AppError;
use crate::io::{BAND_SOURCE, ExtData};
use crate::models::CurveModel;
use crate::plot::ascii::{AsciiSeries, render_ascii_plot};
use crate::plot::figure::{DrawResult, Figure, logspace, padded_range, palette};

/// Inset wavelength range (micron).
pub const INSET_RANGE: (f64, f64) = (2.0, 35.0);

const MODEL_POINTS: usize = 500;

#[derive(Debug, Clone)]
pub struct CurveLine {
    pub label: String,
    /// `(wavelength, value)`
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
    pub alpha: f64,
    pub width: u32,
    /// Glyph used in the terminal preview.
    pub glyph: char,
}

#[derive(Debug, Clone)]
pub struct FitFigure {
    pub title: String,
    pub y_label: String,
    /// `(source, [(wavelength, value, unc)])`
    pub data: Vec<(String, Vec<(f64, f64, f64)>)>,
    pub lines: Vec<CurveLine>,
    pub av: Option<f64>,
    /// Model evaluation grid (micron).
    grid: Vec<f64>,
}

impl FitFigure {
    pub fn new(title: impl Into<String>, ext: &ExtData) -> Self {
        let data: Vec<(String, Vec<(f64, f64, f64)>)> = ext
            .segments
            .iter()
            .map(|(source, seg)| {
                let pts = seg
                    .good()
                    .filter(|&i| seg.waves[i] > 0.0)
                    .map(|i| (seg.waves[i], seg.exts[i], seg.uncs[i]))
                    .collect();
                (source.clone(), pts)
            })
            .collect();
        let (lo, hi) = padded_range(data.iter().flat_map(|(_, p)| p.iter().map(|q| q.0.log10())), 0.02)
            .unwrap_or((-1.0, 1.5));
        FitFigure {
            title: title.into(),
            y_label: ext.ext_type.axis_label().to_string(),
            data,
            lines: Vec::new(),
            av: None,
            grid: logspace(lo, hi, MODEL_POINTS),
        }
    }

    fn evaluate(&self, model: &CurveModel) -> Result<Vec<(f64, f64)>, AppError> {
        let x: Vec<f64> = self.grid.iter().map(|w| 1.0 / w).collect();
        let y = model.evaluate(&x)?;
        Ok(self.grid.iter().copied().zip(y).collect())
    }

    pub fn with_model(
        mut self,
        label: impl Into<String>,
        model: &CurveModel,
        color: RGBColor,
        alpha: f64,
        glyph: char,
    ) -> Result<Self, AppError> {
        let points = self.evaluate(model)?;
        self.lines.push(CurveLine {
            label: label.into(),
            points,
            color,
            alpha,
            width: 2,
            glyph,
        });
        Ok(self)
    }

    /// Background alone and background plus each feature.
    pub fn with_components(mut self, model: &CurveModel) -> Result<Self, AppError> {
        for (i, (label, component)) in model.components()?.iter().enumerate() {
            let points = self.evaluate(component)?;
            self.lines.push(CurveLine {
                label: label.clone(),
                points,
                color: palette(i + 2),
                alpha: 0.5,
                width: 1,
                glyph: '.',
            });
        }
        Ok(self)
    }

    pub fn with_av(mut self, av: Option<f64>) -> Self {
        self.av = av;
        self
    }

    fn av_line(&self) -> Option<Vec<(f64, f64)>> {
        let av = self.av?;
        let (first, last) = (self.grid.first()?, self.grid.last()?);
        Some(vec![(*first, -av), (*last, -av)])
    }

    /// Value range of everything inside `[lo, hi]` micron.
    fn y_range(&self, lo: f64, hi: f64, pad: f64) -> (f64, f64) {
        let inside = |w: f64| w >= lo && w <= hi;
        let data = self
            .data
            .iter()
            .flat_map(|(_, p)| p.iter().filter(move |q| inside(q.0)).map(|q| q.1));
        let models = self
            .lines
            .iter()
            .flat_map(|l| l.points.iter().filter(move |p| inside(p.0)).map(|p| p.1));
        let av = self.av.map(|a| -a);
        padded_range(data.chain(models).chain(av), pad).unwrap_or((-1.0, 1.0))
    }

    fn x_range(&self) -> (f64, f64) {
        match (self.grid.first(), self.grid.last()) {
            (Some(&a), Some(&b)) if b > a => (a, b),
            _ => (0.1, 30.0),
        }
    }

    fn draw_panel<DB>(
        &self,
        area: &DrawingArea<DB, Shift>,
        (x0, x1): (f64, f64),
        (y0, y1): (f64, f64),
        main: bool,
    ) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let inside = |w: f64| w >= x0 && w <= x1;

        let mut builder = ChartBuilder::on(area);
        builder.margin(10).x_label_area_size(40).y_label_area_size(60);
        if main {
            builder.caption(&self.title, ("sans-serif", 24));
        }
        let mut chart = builder.build_cartesian_2d((x0..x1).log_scale(), y0..y1)?;

        let mut mesh = chart.configure_mesh();
        if main {
            mesh.x_desc("λ [micron]").y_desc(self.y_label.as_str());
        }
        mesh.draw()?;

        for (i, (source, points)) in self.data.iter().enumerate() {
            let color = palette(i);
            let pts: Vec<(f64, f64, f64)> = points.iter().copied().filter(|p| inside(p.0)).collect();
            if source == BAND_SOURCE {
                chart.draw_series(
                    pts.iter()
                        .map(|&(w, e, u)| ErrorBar::new_vertical(w, e - u, e, e + u, color.filled(), 6)),
                )?;
                let series = chart.draw_series(pts.iter().map(|&(w, e, _)| Circle::new((w, e), 4, color.filled())))?;
                if main {
                    series
                        .label(source.as_str())
                        .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
                }
            } else {
                let series = chart.draw_series(LineSeries::new(pts.iter().map(|&(w, e, _)| (w, e)), color))?;
                if main {
                    series
                        .label(source.as_str())
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                }
            }
        }

        for line in &self.lines {
            let style = line.color.mix(line.alpha).stroke_width(line.width);
            let series = chart.draw_series(LineSeries::new(
                line.points.iter().copied().filter(|p| inside(p.0)),
                style,
            ))?;
            if main {
                series
                    .label(line.label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            }
        }

        if let Some(av) = self.av {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(x0, -av), (x1, -av)],
                BLACK.mix(0.6),
            )))?;
        }

        if main {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
        Ok(())
    }
}

impl Figure for FitFigure {
    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let (x0, x1) = self.x_range();
        self.draw_panel(root, (x0, x1), self.y_range(x0, x1, 0.1), true)?;

        let (ilo, ihi) = (INSET_RANGE.0.max(x0), INSET_RANGE.1.min(x1));
        if ihi > ilo {
            let (w, h) = root.dim_in_pixel();
            let inset = root.clone().shrink(
                ((w as f64 * 0.58) as u32, (h as f64 * 0.33) as u32),
                ((w as f64 * 0.38) as u32, (h as f64 * 0.38) as u32),
            );
            inset.fill(&WHITE)?;
            self.draw_panel(&inset, (ilo, ihi), self.y_range(ilo, ihi, 0.1), false)?;
        }
        root.present()?;
        Ok(())
    }

    fn preview(&self, width: usize, height: usize) -> String {
        let mut series: Vec<AsciiSeries> = self
            .lines
            .iter()
            .map(|l| AsciiSeries::line(l.points.clone(), l.glyph))
            .collect();
        if let Some(av) = self.av_line() {
            series.push(AsciiSeries::line(av, '_'));
        }
        for (source, points) in &self.data {
            let glyph = if source == BAND_SOURCE { 'o' } else { '+' };
            series.push(AsciiSeries::points(points.iter().map(|p| (p.0, p.1)).collect(), glyph));
        }
        render_ascii_plot(&self.title, "λ", &series, true, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExtType, ModelKind};
    use crate::io::ExtSegment;
    use crate::models::{PresetOptions, initial_model};
    use std::collections::BTreeMap;

    fn ext() -> ExtData {
        let waves: Vec<f64> = (0..50).map(|i| 0.12 * 1.1f64.powi(i)).collect();
        let mut segments = BTreeMap::new();
        segments.insert(
            "IRS".to_string(),
            ExtSegment {
                exts: waves.iter().map(|w| -1.0 + 0.1 / w).collect(),
                uncs: vec![0.05; waves.len()],
                npts: vec![1.0; waves.len()],
                waves,
                names: Vec::new(),
            },
        );
        ExtData {
            ext_type: ExtType::Elx,
            red_file: "r.dat".to_string(),
            comp_file: "c.dat".to_string(),
            created: chrono::Utc::now(),
            segments,
            columns: BTreeMap::new(),
            fits: BTreeMap::new(),
        }
    }

    fn figure() -> FitFigure {
        let model = initial_model(ModelKind::P92, PresetOptions { av_guess: 1.0, tie_fir: false }).unwrap();
        FitFigure::new("r / c", &ext())
            .with_model("Fitted model", &model, RED, 1.0, '-')
            .unwrap()
            .with_components(&model)
            .unwrap()
            .with_av(model.av())
    }

    #[test]
    fn components_and_grid_cover_data() {
        let fig = figure();
        // fitted + background + five features
        assert_eq!(fig.lines.len(), 7);
        let (x0, x1) = fig.x_range();
        assert!(x0 < 0.12 && x1 > 0.12 * 1.1f64.powi(49));
        assert!(fig.lines.iter().all(|l| l.points.len() == MODEL_POINTS));
        let (y0, _) = fig.y_range(x0, x1, 0.0);
        assert!(y0 <= -1.0);
    }

    #[test]
    fn preview_shows_data_model_and_av() {
        let txt = figure().preview(60, 15);
        assert!(txt.starts_with("r / c: λ="));
        assert!(txt.contains('+'));
        assert!(txt.contains('-'));
        assert!(txt.contains('_'));
    }
}
