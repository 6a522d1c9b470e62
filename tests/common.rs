/// Shared synthetic-data generators for the integration tests.
use std::collections::BTreeMap;

use fphot::{
    BaselineEntry, ChannelRef, MasterColumns, MasterRow, MasterTable, PipelineConfig, RawRecording,
    SampleRow,
};

#[allow(unused)]
/// Noise-free photobleaching decay on `x ∈ [0, 1]`.
pub fn bleach(x: f64) -> f64 {
    2.0 * (-8.0 * x).exp() + 1.0 * (-1.5 * x).exp() + 0.5
}

#[allow(unused)]
pub const TRUE_PARAMS: [f64; 5] = [2.0, -8.0, 1.0, -1.5, 0.5];

#[allow(unused)]
/// Interleaved 415/470 recording: frame `2k+1` is 415 nm, `2k+2` is 470 nm.
///
/// The 470 nm trace is the bleach curve scaled by 3 plus a small oscillation.
pub fn raw_recording(n_per_channel: usize, regions: &[&str]) -> RawRecording {
    let mut rows = Vec::with_capacity(2 * n_per_channel);
    for k in 0..n_per_channel {
        let x = k as f64 / (n_per_channel - 1).max(1) as f64;
        let b = bleach(x);
        for (led, f) in [(1_i64, 1_i64), (2, 2)] {
            let frame = 2 * k as i64 + f;
            let values = regions
                .iter()
                .enumerate()
                .map(|(j, _)| {
                    let scale = 1.0 + 0.5 * j as f64;
                    if led == 1 {
                        scale * b
                    } else {
                        3.0 * scale * b + 0.2 * (k as f64 * 0.3 + j as f64).sin()
                    }
                })
                .collect();
            rows.push(SampleRow {
                frame,
                system_ts: frame as f64 * 0.025,
                computer_ts: 1000.0 + frame as f64 * 0.025,
                led_state: led,
                values,
            });
        }
    }
    RawRecording {
        regions: regions.iter().map(|r| r.to_string()).collect(),
        has_computer_ts: true,
        rows,
    }
}

#[allow(unused)]
/// Identity region map; every region's 470 nm trace corrected against its 415 nm trace.
pub fn config(regions: &[&str]) -> PipelineConfig {
    PipelineConfig {
        discard_frames: Some(0),
        region_map: Some(
            regions
                .iter()
                .map(|r| (r.to_string(), r.to_string()))
                .collect::<BTreeMap<_, _>>(),
        ),
        baselines: Some(
            regions
                .iter()
                .map(|r| BaselineEntry {
                    target: ChannelRef::new(*r, "470nm"),
                    baseline: Some(ChannelRef::new(*r, "415nm")),
                })
                .collect(),
        ),
        ..PipelineConfig::default()
    }
}

#[allow(unused)]
/// Master table with frames `0..n`, region `A` = frame number, computer
/// timestamps `frame * 0.1`, system timestamps `frame * 0.1 - 50`.
pub fn master(n: i64, events: &[(i64, &str)]) -> MasterTable {
    MasterTable {
        regions: vec!["A".into()],
        columns: MasterColumns {
            system_ts: true,
            computer_ts: true,
            events: !events.is_empty(),
            ..MasterColumns::default()
        },
        rows: (0..n)
            .map(|f| {
                let e = events.iter().find(|(ef, _)| *ef == f);
                MasterRow {
                    system_ts: Some(f as f64 * 0.1 - 50.0),
                    computer_ts: Some(f as f64 * 0.1),
                    values: vec![f as f64],
                    event: e.map(|(_, l)| l.to_string()),
                    event_type: e.map(|_| "user".to_string()),
                    ..MasterRow::bare(f, 1)
                }
            })
            .collect(),
    }
}

#[allow(unused)]
pub fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

#[allow(unused)]
pub fn mean_std(v: &[f64]) -> (f64, f64) {
    let n = v.len() as f64;
    let m = v.iter().sum::<f64>() / n;
    let var = v.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (n - 1.0);
    (m, var.sqrt())
}
