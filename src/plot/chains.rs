//! MCMC diagnostics: walker traces and a triangle (corner) plot.

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::Chain;
use crate::math::percentiles;
use crate::plot::ascii::{AsciiSeries, render_ascii_plot};
use crate::plot::figure::{DrawResult, Figure, padded_range, palette};

const HIST_BINS: usize = 20;

/// At most this many points per scatter panel.
const MAX_SCATTER: usize = 2000;

/// One panel per sampled parameter, one line per walker.
pub struct WalkerFigure<'a> {
    pub chain: &'a Chain,
}

impl Figure for WalkerFigure<'_> {
    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let ndim = self.chain.ndim().max(1);
        let nsteps = self.chain.nsteps().max(2);
        let panels = root.split_evenly((ndim, 1));

        for (dim, (area, name)) in panels.iter().zip(&self.chain.param_names).enumerate() {
            let values = self.chain.flat_param(dim, 0);
            let (y0, y1) = padded_range(values.iter().copied(), 0.0).unwrap_or((0.0, 1.0));
            let mut chart = ChartBuilder::on(area)
                .margin(4)
                .x_label_area_size(if dim + 1 == ndim { 30 } else { 0 })
                .y_label_area_size(80)
                .build_cartesian_2d(0..nsteps, y0..y1)?;
            chart.configure_mesh().y_desc(name.as_str()).y_labels(3).draw()?;

            for (w, walker) in self.chain.samples.iter().enumerate() {
                let trace = walker.iter().enumerate().filter_map(|(s, p)| p.get(dim).map(|v| (s, *v)));
                chart.draw_series(LineSeries::new(trace, palette(w).mix(0.3)))?;
            }
        }
        root.present()?;
        Ok(())
    }

    /// Best ln p per step.
    fn preview(&self, width: usize, height: usize) -> String {
        let best: Vec<(f64, f64)> = (0..self.chain.nsteps())
            .map(|s| {
                let lp = self
                    .chain
                    .lnprob
                    .iter()
                    .filter_map(|w| w.get(s).copied())
                    .fold(f64::NEG_INFINITY, f64::max);
                (s as f64, lp)
            })
            .collect();
        let title = format!("{} walkers: max ln p", self.chain.model);
        render_ascii_plot(&title, "step", &[AsciiSeries::line(best, '-')], false, width, height)
    }
}

/// Histogram counts of `values` over `[lo, hi]`.
pub fn histogram(values: &[f64], lo: f64, hi: f64, bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    if bins == 0 || hi <= lo {
        return counts;
    }
    for &v in values {
        if !(v >= lo && v <= hi) {
            continue;
        }
        let k = (((v - lo) / (hi - lo)) * bins as f64) as usize;
        counts[k.min(bins - 1)] += 1;
    }
    counts
}

/// Marginal histograms on the diagonal, pairwise scatter below it.
pub struct TriangleFigure<'a> {
    pub chain: &'a Chain,
    /// Steps discarded from the start of each walker.
    pub skip: usize,
}

impl TriangleFigure<'_> {
    fn columns(&self) -> Vec<Vec<f64>> {
        (0..self.chain.ndim()).map(|d| self.chain.flat_param(d, self.skip)).collect()
    }
}

impl Figure for TriangleFigure<'_> {
    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let ndim = self.chain.ndim();
        if ndim == 0 {
            root.present()?;
            return Ok(());
        }
        let cols = self.columns();
        let ranges: Vec<(f64, f64)> = cols
            .iter()
            .map(|c| padded_range(c.iter().copied(), 0.0).unwrap_or((0.0, 1.0)))
            .collect();
        let stride = (cols[0].len() / MAX_SCATTER).max(1);
        let panels = root.split_evenly((ndim, ndim));

        for row in 0..ndim {
            for col in 0..=row {
                let area = &panels[row * ndim + col];
                let last_row = row + 1 == ndim;
                let (x0, x1) = ranges[col];
                let mut builder = ChartBuilder::on(area);
                builder
                    .margin(2)
                    .x_label_area_size(if last_row { 30 } else { 0 })
                    .y_label_area_size(if col == 0 && row > 0 { 50 } else { 0 });

                if row == col {
                    let counts = histogram(&cols[col], x0, x1, HIST_BINS);
                    let top = counts.iter().copied().max().unwrap_or(1).max(1) as f64;
                    let mut chart = builder.build_cartesian_2d(x0..x1, 0.0..top * 1.1)?;
                    let mut mesh = chart.configure_mesh();
                    mesh.disable_mesh().y_labels(0).x_labels(3);
                    if last_row {
                        mesh.x_desc(self.chain.param_names[col].as_str());
                    }
                    mesh.draw()?;
                    let width = (x1 - x0) / HIST_BINS as f64;
                    chart.draw_series(counts.iter().enumerate().map(|(k, &c)| {
                        let left = x0 + k as f64 * width;
                        Rectangle::new([(left, 0.0), (left + width, c as f64)], BLUE.mix(0.4).filled())
                    }))?;
                    let q = percentiles(&cols[col], &[16.0, 50.0, 84.0]);
                    for v in q {
                        chart.draw_series(std::iter::once(PathElement::new(
                            vec![(v, 0.0), (v, top * 1.1)],
                            BLACK.mix(0.7),
                        )))?;
                    }
                } else {
                    let (y0, y1) = ranges[row];
                    let mut chart = builder.build_cartesian_2d(x0..x1, y0..y1)?;
                    let mut mesh = chart.configure_mesh();
                    mesh.disable_mesh().x_labels(3).y_labels(3);
                    if last_row {
                        mesh.x_desc(self.chain.param_names[col].as_str());
                    }
                    if col == 0 {
                        mesh.y_desc(self.chain.param_names[row].as_str());
                    }
                    mesh.draw()?;
                    chart.draw_series(
                        cols[col]
                            .iter()
                            .zip(&cols[row])
                            .step_by(stride)
                            .map(|(&x, &y)| Circle::new((x, y), 1, BLACK.mix(0.3).filled())),
                    )?;
                }
            }
        }
        root.present()?;
        Ok(())
    }

    /// One histogram strip per parameter with its 16/50/84 percentiles.
    fn preview(&self, width: usize, _height: usize) -> String {
        const LEVELS: [char; 8] = [' ', '.', ':', '-', '=', '+', '*', '#'];
        let bins = width.clamp(10, 60);
        let mut out = String::new();
        for (name, col) in self.chain.param_names.iter().zip(self.columns()) {
            let (lo, hi) = padded_range(col.iter().copied(), 0.0).unwrap_or((0.0, 1.0));
            let counts = histogram(&col, lo, hi, bins);
            let top = counts.iter().copied().max().unwrap_or(0).max(1) as f64;
            let strip: String = counts
                .iter()
                .map(|&c| LEVELS[((c as f64 / top) * (LEVELS.len() - 1) as f64).round() as usize])
                .collect();
            let q = percentiles(&col, &[16.0, 50.0, 84.0]);
            out.push_str(&format!(
                "{name:<12} |{strip}| {:.4e} {:.4e} {:.4e}\n",
                q[0], q[1], q[2]
            ));
        }
        out
    }
}
