//! Peri-event epoching.
//!
//! Cuts a window `[frame + pre, frame + post]` (clipped to
//! `[0, max_frame]`) around every event row of the aligned master table.
//! Each window carries `fm_evt`, the offset from its own event frame.
//! Optionally every region is z-scored against the window's own pre-event
//! samples (`fm_evt < 0`); a flat or empty baseline zero-fills the region.
//!
//! Overlapping windows are independent copies.
use crate::config::PipelineConfig;
use crate::error::{FphotError, Result};
use crate::normalize::baseline_zscore_inplace;
use crate::table::{EventWindowTable, MasterTable, WindowRow};

/// Run the pooler with range and normalization flag from `cfg`.
pub fn pool(data: &MasterTable, cfg: &PipelineConfig) -> Result<EventWindowTable> {
    let regions = cfg.regions()?;
    pool_events(data, cfg.event_range, &regions, cfg.normalize_events)
}

/// Extract one window per event.
///
/// `evt_range` is `(pre, post)` in frames, `pre <= post`.
pub fn pool_events(
    data: &MasterTable,
    evt_range: (i64, i64),
    regions: &[String],
    norm: bool,
) -> Result<EventWindowTable> {
    let (pre, post) = evt_range;
    if pre > post {
        return Err(FphotError::configuration(format!(
            "event range start {pre} is after end {post}"
        )));
    }
    if !data.columns.events || data.n_events() == 0 {
        return Err(FphotError::NoEvents);
    }
    let cols: Vec<usize> = regions
        .iter()
        .map(|r| {
            data.region_index(r)
                .ok_or_else(|| FphotError::MissingColumn(r.clone()))
        })
        .collect::<Result<_>>()?;
    let max_fm = data.max_frame().unwrap_or(0).max(0);

    let mut out = EventWindowTable {
        regions: regions.to_vec(),
        rows: vec![],
    };
    for evt_row in data.rows.iter().filter(|r| r.event.is_some()) {
        let fm = evt_row.frame;
        let event = evt_row.event.clone().unwrap_or_default();
        let evt_id = format!("{event}-{fm}");
        let lo = fm.saturating_add(pre).clamp(0, max_fm);
        let hi = fm.saturating_add(post).clamp(0, max_fm);

        let sub: Vec<_> = data
            .rows
            .iter()
            .filter(|r| r.frame >= lo && r.frame <= hi)
            .collect();
        let fm_evt: Vec<i64> = sub.iter().map(|r| r.frame - fm).collect();
        let mut values: Vec<Vec<f64>> = cols
            .iter()
            .map(|&c| sub.iter().map(|r| r.values[c]).collect())
            .collect();

        if norm {
            let before: Vec<bool> = fm_evt.iter().map(|&d| d < 0).collect();
            for v in values.iter_mut() {
                baseline_zscore_inplace(v, &before);
            }
        }

        for (k, r) in sub.iter().enumerate() {
            out.rows.push(WindowRow {
                frame: r.frame,
                fm_evt: fm_evt[k],
                evt_id: evt_id.clone(),
                event: event.clone(),
                values: values.iter().map(|v| v[k]).collect(),
            });
        }
    }
    Ok(out)
}
