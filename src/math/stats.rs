//! Sample statistics used by MCMC reporting and the summary tables.

/// Percentile with linear interpolation between order statistics
/// (numpy's default): position `q/100 * (n - 1)` in the sorted sample.
///
/// Returns NaN for an empty sample.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, q)
}

/// Several percentiles from one sort.
pub fn percentiles(values: &[f64], qs: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    qs.iter().map(|&q| percentile_sorted(&sorted, q)).collect()
}

fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let pos = (q / 100.0).clamp(0.0, 1.0) * (n as f64 - 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// `(p50, p84 - p50, p50 - p16)`.
pub fn median_and_errors(values: &[f64]) -> (f64, f64, f64) {
    let p = percentiles(values, &[16.0, 50.0, 84.0]);
    (p[1], p[2] - p[1], p[1] - p[0])
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`).
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    if !m.is_finite() {
        return f64::NAN;
    }
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 4.0);
        // pos = 0.5 * 3 = 1.5 -> 2.5
        assert!((percentile(&v, 50.0) - 2.5).abs() < 1e-12);
        // pos = 0.16 * 3 = 0.48 -> 1.48
        assert!((percentile(&v, 16.0) - 1.48).abs() < 1e-12);
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn normal_sample_half_width_matches_sigma() {
        let mut rng = StdRng::seed_from_u64(7);
        let normal = Normal::new(3.0, 2.0).unwrap();
        let samples: Vec<f64> = (0..200_000).map(|_| normal.sample(&mut rng)).collect();

        let (p50, plus, minus) = median_and_errors(&samples);
        assert!((p50 - 3.0).abs() < 0.03, "median {p50}");
        // 16/84 percentiles of a normal sit at ±0.994 sigma.
        let half = 0.5 * (plus + minus);
        assert!((half - 2.0).abs() < 0.03, "half-width {half}");
    }

    #[test]
    fn mean_and_population_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v) - 5.0).abs() < 1e-12);
        assert!((std_dev(&v) - 2.0).abs() < 1e-12);
        assert!(mean(&[]).is_nan());
    }
}
