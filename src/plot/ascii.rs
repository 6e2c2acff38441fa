//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Lines are drawn first in series order (earlier series win where they
//! cross), then point series overwrite whatever is below them.

/// One series on the character grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiSeries {
    pub points: Vec<(f64, f64)>,
    pub glyph: char,
    /// Connect consecutive points instead of marking them.
    pub connect: bool,
}

impl AsciiSeries {
    pub fn points(points: Vec<(f64, f64)>, glyph: char) -> Self {
        Self {
            points,
            glyph,
            connect: false,
        }
    }

    pub fn line(points: Vec<(f64, f64)>, glyph: char) -> Self {
        Self {
            points,
            glyph,
            connect: true,
        }
    }
}

/// Render `series` on a `width` x `height` grid with a one-line header.
///
/// With `log_x`, points with `x <= 0` are dropped and the axis is log10.
pub fn render_ascii_plot(
    title: &str,
    x_label: &str,
    series: &[AsciiSeries],
    log_x: bool,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let usable = |&(x, y): &(f64, f64)| x.is_finite() && y.is_finite() && (!log_x || x > 0.0);
    let to_axis = |x: f64| if log_x { x.log10() } else { x };

    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for p in series.iter().flat_map(|s| s.points.iter()).filter(|p| usable(p)) {
        x_min = x_min.min(p.0);
        x_max = x_max.max(p.0);
        y_min = y_min.min(p.1);
        y_max = y_max.max(p.1);
    }
    if !(x_min.is_finite() && x_max > x_min) {
        (x_min, x_max) = if log_x { (0.1, 10.0) } else { (0.0, 1.0) };
    }
    if !(y_min.is_finite() && y_max > y_min) {
        (y_min, y_max) = if y_min.is_finite() { (y_min - 0.5, y_min + 0.5) } else { (0.0, 1.0) };
    }
    let (y_lo, y_hi) = pad_range(y_min, y_max, 0.05);
    let (ax_min, ax_max) = (to_axis(x_min), to_axis(x_max));

    let mut grid = vec![vec![' '; width]; height];
    let cell = |p: &(f64, f64)| {
        (
            map_x(to_axis(p.0), ax_min, ax_max, width),
            map_y(p.1, y_lo, y_hi, height),
        )
    };

    for s in series.iter().filter(|s| s.connect) {
        let mut prev: Option<(usize, usize)> = None;
        for (cx, cy) in s.points.iter().filter(|p| usable(p)).map(cell) {
            match prev {
                Some((x0, y0)) => draw_line(&mut grid, x0, y0, cx, cy, s.glyph),
                None => {
                    if grid[cy][cx] == ' ' {
                        grid[cy][cx] = s.glyph;
                    }
                }
            }
            prev = Some((cx, cy));
        }
    }
    for s in series.iter().filter(|s| !s.connect) {
        for (cx, cy) in s.points.iter().filter(|p| usable(p)).map(cell) {
            grid[cy][cx] = s.glyph;
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{title}: {x_label}=[{x_min:.3}, {x_max:.3}] | y=[{y_lo:.3}, {y_hi:.3}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
