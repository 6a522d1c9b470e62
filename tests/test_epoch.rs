mod common;
use approx::assert_abs_diff_eq;
use common::{master, mean_std};
use fphot::{pool, pool_events, FphotError, PipelineConfig};

fn a() -> Vec<String> {
    vec!["A".to_string()]
}

#[test]
fn window_clipped_at_recording_end() {
    let m = master(103, &[(100, "tone")]);
    let w = pool_events(&m, (-5, 5), &a(), false).unwrap();
    let frames: Vec<i64> = w.rows.iter().map(|r| r.frame).collect();
    let offs: Vec<i64> = w.rows.iter().map(|r| r.fm_evt).collect();
    assert_eq!(frames, (95..=102).collect::<Vec<_>>());
    assert_eq!(offs, (-5..=2).collect::<Vec<_>>());
}

#[test]
fn window_clipped_at_recording_start() {
    let m = master(50, &[(2, "tone")]);
    let w = pool_events(&m, (-5, 5), &a(), false).unwrap();
    assert_eq!(w.rows.first().unwrap().frame, 0);
    assert_eq!(w.rows.first().unwrap().fm_evt, -2);
    assert_eq!(w.rows.last().unwrap().fm_evt, 5);
}

#[test]
fn overlapping_windows_are_independent() {
    let m = master(100, &[(40, "x"), (43, "y")]);
    let w = pool_events(&m, (-5, 5), &a(), false).unwrap();
    assert_eq!(w.event_ids(), vec!["x-40".to_string(), "y-43".to_string()]);
    assert_eq!(w.window("x-40").len(), 11);
    assert_eq!(w.window("y-43").len(), 11);
    let shared = w.rows.iter().filter(|r| r.frame == 42).count();
    assert_eq!(shared, 2);
}

#[test]
fn pre_event_samples_standardized() {
    let m = master(200, &[(100, "tone")]);
    let w = pool_events(&m, (-20, 20), &a(), true).unwrap();
    let pre: Vec<f64> = w
        .rows
        .iter()
        .filter(|r| r.fm_evt < 0)
        .map(|r| r.values[0])
        .collect();
    let (mu, sd) = mean_std(&pre);
    assert_abs_diff_eq!(mu, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(sd, 1.0, epsilon = 1e-12);
}

#[test]
fn pool_reads_range_from_config() {
    let m = master(200, &[(100, "tone")]);
    let cfg = PipelineConfig {
        region_map: Some([("A".to_string(), "A".to_string())].into()),
        event_range: (-3, 3),
        normalize_events: false,
        ..PipelineConfig::default()
    };
    let w = pool(&m, &cfg).unwrap();
    assert_eq!(w.rows.len(), 7);
    assert_eq!(w.rows[3].values[0], 100.0);
}

#[test]
fn table_without_events_rejected() {
    let m = master(20, &[]);
    assert!(matches!(
        pool_events(&m, (-5, 5), &a(), true),
        Err(FphotError::NoEvents)
    ));
}

#[test]
fn unknown_region_rejected() {
    let m = master(20, &[(5, "x")]);
    assert!(matches!(
        pool_events(&m, (-5, 5), &["B".to_string()], true),
        Err(FphotError::MissingColumn(_))
    ));
}
