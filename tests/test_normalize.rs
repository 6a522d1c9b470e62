mod common;
use approx::assert_abs_diff_eq;
use common::mean_std;
use fphot::normalize::{baseline_zscore_inplace, nan_std, zscore, zscore_inplace};

#[test]
fn zscore_mean_zero_std_one() {
    let x: Vec<f64> = (0..500).map(|i| (i as f64 * 0.07).sin() * 3.0 + 10.0).collect();
    let z = zscore(&x);
    let (m, s) = mean_std(&z);
    assert_abs_diff_eq!(m, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(s, 1.0, epsilon = 1e-12);
}

#[test]
fn zscore_uses_sample_std() {
    let mut x = vec![1.0, 2.0, 3.0, 4.0];
    let (m, s) = zscore_inplace(&mut x);
    assert_abs_diff_eq!(m, 2.5);
    assert_abs_diff_eq!(s, (5.0_f64 / 3.0).sqrt(), epsilon = 1e-15);
}

#[test]
fn nan_samples_skipped_and_kept() {
    let z = zscore(&[1.0, f64::NAN, 3.0]);
    assert!(z[1].is_nan());
    assert_abs_diff_eq!(z[0], -z[2], epsilon = 1e-15);
    assert!(nan_std(&[f64::NAN, 1.0]).is_nan());
}

#[test]
fn constant_trace_left_alone() {
    let mut x = vec![4.0; 10];
    zscore_inplace(&mut x);
    assert!(x.iter().all(|&v| v == 4.0));
}

#[test]
fn baseline_zscore_uses_baseline_only() {
    let mut x = vec![1.0, 3.0, 10.0, 20.0];
    let applied = baseline_zscore_inplace(&mut x, &[true, true, false, false]);
    assert!(applied);
    let sd = 2.0_f64.sqrt();
    assert_abs_diff_eq!(x[0], -1.0 / sd, epsilon = 1e-12);
    assert_abs_diff_eq!(x[3], 18.0 / sd, epsilon = 1e-12);
}

#[test]
fn flat_baseline_zero_fills() {
    let mut x = vec![2.0, 2.0, 5.0];
    assert!(!baseline_zscore_inplace(&mut x, &[true, true, false]));
    assert_eq!(x, vec![0.0, 0.0, 0.0]);
}
