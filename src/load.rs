//! Raw recording → long-form signal table.
//!
//! 1. Drop rows with `FrameCounter <= discard_frames`.
//! 2. Label each row with the channel its `LedState` maps to; rows with an
//!    unmapped code are dropped.
//! 3. Trim every channel to the size of the smallest one, keeping the
//!    earliest rows by `SystemTimestamp`.
//! 4. Rename region columns.
//!
//! Output rows are grouped by channel label (lexicographic), each group
//! ordered by acquisition time.
use std::collections::BTreeMap;

use ndarray::Array2;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::table::{RawRecording, SignalTable};

/// Run the loader with parameters taken from `cfg`.
///
/// Fails with a configuration error if frames-to-discard, the LED map or the
/// region map was never set.
pub fn load_recording(raw: &RawRecording, cfg: &PipelineConfig) -> Result<SignalTable> {
    let discard = cfg.discard_frames()?;
    let led_map = cfg.led_map()?;
    let region_map = cfg.region_map()?;
    Ok(load_data(raw, discard, led_map, &region_map))
}

/// Loader core with explicit parameters.
pub fn load_data(
    raw: &RawRecording,
    discard_frames: i64,
    led_map: &BTreeMap<i64, String>,
    region_map: &BTreeMap<String, String>,
) -> SignalTable {
    let regions: Vec<String> = raw
        .regions
        .iter()
        .map(|r| region_map.get(r).cloned().unwrap_or_else(|| r.clone()))
        .collect();

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, row) in raw.rows.iter().enumerate() {
        if row.frame <= discard_frames {
            continue;
        }
        if let Some(label) = led_map.get(&row.led_state) {
            groups.entry(label.as_str()).or_default().push(i);
        }
    }

    let Some(n_keep) = groups.values().map(Vec::len).min() else {
        return SignalTable::empty(regions, raw.has_computer_ts);
    };
    log::debug!(
        "loader: {} channel(s), trimming each to {n_keep} rows",
        groups.len()
    );

    let mut order: Vec<(usize, &str)> = Vec::with_capacity(n_keep * groups.len());
    for (label, mut idx) in groups {
        idx.sort_by(|&a, &b| raw.rows[a].system_ts.total_cmp(&raw.rows[b].system_ts));
        order.extend(idx.into_iter().take(n_keep).map(|i| (i, label)));
    }

    let n_reg = regions.len();
    let mut values = Array2::<f64>::zeros((order.len(), n_reg));
    for (r, &(i, _)) in order.iter().enumerate() {
        for (c, &v) in raw.rows[i].values.iter().take(n_reg).enumerate() {
            values[[r, c]] = v;
        }
    }

    SignalTable {
        regions,
        has_computer_ts: raw.has_computer_ts,
        frame: order.iter().map(|&(i, _)| raw.rows[i].frame).collect(),
        system_ts: order.iter().map(|&(i, _)| raw.rows[i].system_ts).collect(),
        computer_ts: order.iter().map(|&(i, _)| raw.rows[i].computer_ts).collect(),
        led_state: order.iter().map(|&(i, _)| raw.rows[i].led_state).collect(),
        signal: order.iter().map(|&(_, l)| l.to_string()).collect(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_led_map;
    use crate::table::SampleRow;

    fn row(frame: i64, ts: f64, led: i64, v: f64) -> SampleRow {
        SampleRow {
            frame,
            system_ts: ts,
            computer_ts: ts + 1000.0,
            led_state: led,
            values: vec![v],
        }
    }

    #[test]
    fn unmapped_codes_dropped_and_trimmed() {
        let raw = RawRecording {
            regions: vec!["G0".into()],
            has_computer_ts: true,
            rows: vec![
                row(1, 0.0, 1, 1.0),
                row(2, 0.1, 2, 2.0),
                row(3, 0.2, 1, 3.0),
                row(4, 0.3, 9, 4.0),
                row(5, 0.4, 1, 5.0),
            ],
        };
        let map = BTreeMap::from([("G0".to_string(), "Green0".to_string())]);
        let t = load_data(&raw, 0, &default_led_map(), &map);
        assert_eq!(t.regions, vec!["Green0".to_string()]);
        assert_eq!(t.rows_of("415nm").len(), 1);
        assert_eq!(t.rows_of("470nm").len(), 1);
        assert_eq!(t.trace("415nm", "Green0"), Some(vec![1.0]));
    }

    #[test]
    fn trims_by_acquisition_time_not_row_order() {
        let raw = RawRecording {
            regions: vec!["G0".into()],
            has_computer_ts: false,
            rows: vec![
                row(1, 0.5, 1, 50.0),
                row(2, 0.1, 1, 10.0),
                row(3, 0.2, 2, 20.0),
            ],
        };
        let t = load_data(&raw, 0, &default_led_map(), &BTreeMap::new());
        assert_eq!(t.trace("415nm", "G0"), Some(vec![10.0]));
    }

    #[test]
    fn empty_after_discard() {
        let raw = RawRecording {
            regions: vec!["G0".into()],
            has_computer_ts: true,
            rows: vec![row(1, 0.0, 1, 1.0)],
        };
        let t = load_data(&raw, 5, &default_led_map(), &BTreeMap::new());
        assert_eq!(t.n_rows(), 0);
        assert_eq!(t.values.dim(), (0, 1));
    }

    #[test]
    fn config_errors_before_loading() {
        let raw = RawRecording::default();
        let cfg = PipelineConfig::default();
        assert!(load_recording(&raw, &cfg).is_err());
    }
}
