use fphot::{find_peaks, find_pks, label_bouts, SignalTable};
use ndarray::Array2;

fn bumps(n: usize, centers: &[(usize, f64)]) -> Vec<f64> {
    (0..n)
        .map(|i| {
            centers
                .iter()
                .map(|&(c, h)| h * (-((i as f64 - c as f64) / 2.0).powi(2)).exp())
                .sum()
        })
        .collect()
}

fn table(traces: &[(&str, Vec<f64>)]) -> SignalTable {
    let n: usize = traces.iter().map(|(_, t)| t.len()).sum();
    let mut values = Array2::zeros((n, 1));
    let mut signal = vec![];
    let mut r = 0;
    for (label, t) in traces {
        for &v in t {
            values[[r, 0]] = v;
            signal.push(label.to_string());
            r += 1;
        }
    }
    SignalTable {
        regions: vec!["A".into()],
        has_computer_ts: false,
        frame: (0..n as i64).collect(),
        system_ts: (0..n).map(|i| i as f64).collect(),
        computer_ts: vec![f64::NAN; n],
        led_state: vec![2; n],
        signal,
        values,
    }
}

#[test]
fn known_peaks_found_exactly() {
    let x = bumps(100, &[(20, 1.0), (45, 0.2), (70, 2.0)]);
    assert_eq!(find_peaks(&x, 0.5), vec![20, 70]);
    assert_eq!(find_peaks(&x, 0.1), vec![20, 45, 70]);
}

#[test]
fn channel_filter_limits_search() {
    let a = bumps(50, &[(10, 1.0)]);
    let b = bumps(50, &[(30, 1.0)]);
    let t = table(&[("415nm", a), ("470nm-norm-zs", b)]);
    let only = ["470nm-norm-zs".to_string()];
    let p = find_pks(&t, &["A".to_string()], 0.5, Some(5), Some(&only[..])).unwrap();
    let reg = p.region("A").unwrap();
    assert!(reg.is_peak[..50].iter().all(Option::is_none));
    assert_eq!(p.peak_rows("A"), vec![80]);

    let freq = reg.frequency.as_ref().unwrap();
    assert!(freq[50..54].iter().all(|v| v.is_nan()));
    assert_eq!(freq[80], 1.0);
    assert_eq!(freq[85], 0.0);
}

#[test]
fn no_filter_searches_every_channel() {
    let a = bumps(50, &[(10, 1.0)]);
    let b = bumps(50, &[(30, 1.0)]);
    let t = table(&[("415nm", a), ("470nm", b)]);
    let p = find_pks(&t, &["A".to_string()], 0.5, None, None).unwrap();
    assert_eq!(p.peak_rows("A"), vec![10, 80]);
    assert!(p.region("A").unwrap().frequency.is_none());
}

#[test]
fn missing_region_is_an_error() {
    let t = table(&[("470nm", vec![0.0; 5])]);
    assert!(find_pks(&t, &["B".to_string()], 0.5, None, None).is_err());
}

#[test]
fn bouts_count_contiguous_runs() {
    let (labels, n) = label_bouts(&[true, true, false, false, true, false, true]);
    assert_eq!(labels, vec![1, 1, 0, 0, 2, 0, 3]);
    assert_eq!(n, 3);
}
