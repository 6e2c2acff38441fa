//! Silicate strength against other sightline properties (2x2 panels).
//!
//! Diffuse sightlines are filled green, dense ones open blue.

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::plot::ascii::{AsciiSeries, render_ascii_plot};
use crate::plot::figure::{DrawResult, Figure, padded_range};
use crate::report::summary::{Estimate, SightlineSummary};

type Pick = fn(&SightlineSummary) -> Option<Estimate>;

fn rv(s: &SightlineSummary) -> Option<Estimate> {
    Some(s.rv)
}

fn av(s: &SightlineSummary) -> Option<Estimate> {
    Some(s.av)
}

fn nuv(s: &SightlineSummary) -> Option<Estimate> {
    s.nuv_ceninten
}

fn sil1(s: &SightlineSummary) -> Option<Estimate> {
    Some(s.sil1_amp)
}

fn sil2(s: &SightlineSummary) -> Option<Estimate> {
    Some(s.sil2_amp)
}

/// `(x label, y label, x, y)` per panel.
const PANELS: [(&str, &str, Pick, Pick); 4] = [
    ("R(V)", "A(S1)/A(V)", rv, sil1),
    ("A(V)", "A(S1)/A(V)", av, sil1),
    ("A(2175)/A(V)", "A(S1)/A(V)", nuv, sil1),
    ("A(S1)/A(V)", "A(S2)/A(V)", sil1, sil2),
];

pub struct SummaryFigure<'a> {
    pub rows: &'a [SightlineSummary],
}

impl SummaryFigure<'_> {
    /// Rows with both estimates, as `(x, y, dense)`.
    fn points(&self, x: Pick, y: Pick) -> Vec<(Estimate, Estimate, bool)> {
        self.rows
            .iter()
            .filter_map(|r| Some((x(r)?, y(r)?, r.dense)))
            .collect()
    }
}

impl Figure for SummaryFigure<'_> {
    fn draw<DB>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        let areas = root.split_evenly((2, 2));
        for (area, (x_label, y_label, x, y)) in areas.iter().zip(PANELS) {
            let pts = self.points(x, y);
            let xr = padded_range(pts.iter().flat_map(|(e, _, _)| [e.value - e.minus, e.value + e.plus]), 0.0)
                .unwrap_or((0.0, 1.0));
            let yr = padded_range(pts.iter().flat_map(|(_, e, _)| [e.value - e.minus, e.value + e.plus]), 0.0)
                .unwrap_or((0.0, 1.0));
            let xpad = 0.05 * (xr.1 - xr.0);
            let ypad = 0.05 * (yr.1 - yr.0);

            let mut chart = ChartBuilder::on(area)
                .margin(10)
                .x_label_area_size(40)
                .y_label_area_size(60)
                .build_cartesian_2d(xr.0 - xpad..xr.1 + xpad, yr.0 - ypad..yr.1 + ypad)?;
            chart.configure_mesh().x_desc(x_label).y_desc(y_label).draw()?;

            for (ex, ey, dense) in &pts {
                let style = if *dense { BLUE.stroke_width(2) } else { GREEN.filled() };
                chart.draw_series(std::iter::once(ErrorBar::new_vertical(
                    ex.value,
                    ey.value - ey.minus,
                    ey.value,
                    ey.value + ey.plus,
                    style,
                    6,
                )))?;
                chart.draw_series(std::iter::once(ErrorBar::new_horizontal(
                    ey.value,
                    ex.value - ex.minus,
                    ex.value,
                    ex.value + ex.plus,
                    style,
                    6,
                )))?;
                chart.draw_series(std::iter::once(Circle::new((ex.value, ey.value), 5, style)))?;
            }
        }
        root.present()?;
        Ok(())
    }

    /// A(V) against A(S1)/A(V); `o` diffuse, `D` dense.
    fn preview(&self, width: usize, height: usize) -> String {
        let (_, _, x, y) = PANELS[1];
        let pts = self.points(x, y);
        let diffuse = pts.iter().filter(|p| !p.2).map(|p| (p.0.value, p.1.value)).collect();
        let dense = pts.iter().filter(|p| p.2).map(|p| (p.0.value, p.1.value)).collect();
        let series = [AsciiSeries::points(diffuse, 'o'), AsciiSeries::points(dense, 'D')];
        render_ascii_plot("A(S1)/A(V) vs A(V)", "A(V)", &series, false, width, height)
    }
}
