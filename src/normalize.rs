//! Z-score normalisation.
//!
//! `zscore_inplace`:          whole-trace z-score, sample std (ddof = 1):
//!   data = (data - μ) / σ
//!
//! `baseline_zscore_inplace`: z-score against a baseline subset only
//!   (the pre-event part of a peri-event window); σ == 0 → zeros.
//!
//! `NaN` samples are skipped when computing μ and σ and stay `NaN`.

/// Mean of the non-`NaN` samples; `NaN` if there are none.
pub fn nan_mean(data: &[f64]) -> f64 {
    let (sum, n) = data
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Sample standard deviation (ddof = 1) of the non-`NaN` samples;
/// `NaN` with fewer than two samples.
pub fn nan_std(data: &[f64]) -> f64 {
    let mean = nan_mean(data);
    let (ss, n) = data
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), &v| (s + (v - mean) * (v - mean), n + 1));
    if n < 2 { f64::NAN } else { (ss / (n - 1) as f64).sqrt() }
}

/// Z-score a trace in place. Returns the `(mean, std)` used.
///
/// A zero or undefined σ leaves the data unchanged.
pub fn zscore_inplace(data: &mut [f64]) -> (f64, f64) {
    let mean = nan_mean(data);
    let std = nan_std(data);
    if std > 0.0 {
        data.iter_mut().for_each(|v| *v = (*v - mean) / std);
    }
    (mean, std)
}

/// Z-scored copy of `data`.
pub fn zscore(data: &[f64]) -> Vec<f64> {
    let mut out = data.to_vec();
    zscore_inplace(&mut out);
    out
}

/// Z-score `data` using μ and σ of the samples where `baseline[i]` is true.
///
/// If σ is zero or undefined (fewer than two baseline samples) the whole
/// trace is zero-filled. Returns whether the z-score was applied.
pub fn baseline_zscore_inplace(data: &mut [f64], baseline: &[bool]) -> bool {
    let base: Vec<f64> = data
        .iter()
        .zip(baseline)
        .filter(|(_, &b)| b)
        .map(|(&v, _)| v)
        .collect();
    let mean = nan_mean(&base);
    let std = nan_std(&base);
    if std > 0.0 {
        data.iter_mut().for_each(|v| *v = (*v - mean) / std);
        true
    } else {
        data.fill(0.0);
        false
    }
}
