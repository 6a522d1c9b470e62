//! Robust straight-line regression with the Huber loss.
//!
//! Iteratively reweighted least squares: residuals within `epsilon · σ` get
//! weight 1, larger ones get `epsilon · σ / |r|`. The scale `σ` is
//! re-estimated each iteration from the median absolute deviation of the
//! residuals. Non-finite `(x, y)` pairs are ignored during fitting.
use super::exp2::nan_median;

/// Huber threshold in units of the residual scale.
pub const HUBER_EPSILON: f64 = 1.35;

const MAX_ITER: usize = 100;
const TOL: f64 = 1e-10;
/// MAD → σ for normally distributed residuals.
const MAD_TO_SIGMA: f64 = 0.674_489_750_196_081_7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuberFit {
    pub slope: f64,
    pub intercept: f64,
    pub scale: f64,
}

impl HuberFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn predict_all(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&v| self.predict(v)).collect()
    }
}

/// Weighted least-squares line. A constant `x` yields slope 0 and the
/// weighted mean of `y` as intercept.
fn weighted_line(x: &[f64], y: &[f64], w: &[f64]) -> (f64, f64) {
    let sw: f64 = w.iter().sum();
    if sw <= 0.0 {
        return (0.0, f64::NAN);
    }
    let mx = x.iter().zip(w).map(|(a, b)| a * b).sum::<f64>() / sw;
    let my = y.iter().zip(w).map(|(a, b)| a * b).sum::<f64>() / sw;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..x.len() {
        let dx = x[i] - mx;
        sxx += w[i] * dx * dx;
        sxy += w[i] * dx * (y[i] - my);
    }
    if sxx <= f64::EPSILON * sw * (1.0 + mx * mx) {
        return (0.0, my);
    }
    let slope = sxy / sxx;
    (slope, my - slope * mx)
}

fn mad_scale(r: &[f64]) -> f64 {
    let med = nan_median(r);
    let dev: Vec<f64> = r.iter().map(|v| (v - med).abs()).collect();
    nan_median(&dev) / MAD_TO_SIGMA
}

/// Fit `y ≈ slope · x + intercept` robustly.
pub fn huber_fit(x: &[f64], y: &[f64]) -> HuberFit {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .unzip();
    if xs.is_empty() {
        return HuberFit { slope: f64::NAN, intercept: f64::NAN, scale: f64::NAN };
    }

    let mut w = vec![1.0; xs.len()];
    let (mut slope, mut intercept) = weighted_line(&xs, &ys, &w);
    let mut scale = 0.0;

    for _ in 0..MAX_ITER {
        let r: Vec<f64> = xs
            .iter()
            .zip(&ys)
            .map(|(a, b)| b - (slope * a + intercept))
            .collect();
        scale = mad_scale(&r);
        if !(scale > f64::EPSILON) {
            break;
        }
        let thresh = HUBER_EPSILON * scale;
        for (wi, ri) in w.iter_mut().zip(&r) {
            let a = ri.abs();
            *wi = if a <= thresh { 1.0 } else { thresh / a };
        }
        let (s, i) = weighted_line(&xs, &ys, &w);
        let delta = (s - slope).abs() + (i - intercept).abs();
        slope = s;
        intercept = i;
        if delta <= TOL * (1.0 + slope.abs() + intercept.abs()) {
            break;
        }
    }

    HuberFit { slope, intercept, scale }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line_recovered() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v - 3.0).collect();
        let f = huber_fit(&x, &y);
        approx::assert_abs_diff_eq!(f.slope, 2.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(f.intercept, -3.0, epsilon = 1e-9);
    }

    #[test]
    fn outliers_are_downweighted() {
        let x: Vec<f64> = (0..200).map(|i| i as f64 / 10.0).collect();
        let mut y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 0.5 * v + 1.0 + if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        for i in (0..200).step_by(20) {
            y[i] += 50.0;
        }
        let robust = huber_fit(&x, &y);
        let (ols_slope, ols_int) = weighted_line(&x, &y, &vec![1.0; x.len()]);
        assert!((robust.slope - 0.5).abs() < 0.02, "slope {}", robust.slope);
        assert!((robust.intercept - 1.0).abs() < 0.2, "intercept {}", robust.intercept);
        assert!((robust.intercept - 1.0).abs() < (ols_int - 1.0).abs());
        let _ = ols_slope;
    }

    #[test]
    fn constant_regressor() {
        let x = vec![1.0; 10];
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let f = huber_fit(&x, &y);
        assert_eq!(f.slope, 0.0);
        assert!(f.intercept.is_finite());
    }

    #[test]
    fn non_finite_pairs_ignored() {
        let x = vec![0.0, 1.0, f64::NAN, 3.0];
        let y = vec![1.0, 3.0, 100.0, 7.0];
        let f = huber_fit(&x, &y);
        approx::assert_abs_diff_eq!(f.slope, 2.0, epsilon = 1e-9);
    }
}
