//! In-memory tables passed between pipeline stages.
//!
//! - [`RawRecording`]: per-frame rows as read from the acquisition device.
//! - [`SignalTable`]: long-form table, one row per (frame, channel label),
//!   region values stored as a `[rows, regions]` array (`NaN` = no value).
//! - [`MasterTable`]: one channel in the internal alignment schema, keyed by
//!   frame counter, carrying merged behavior/event columns.
//! - [`EventWindowTable`]: peri-event windows produced by the pooler.
//!
//! Every stage takes its input by reference and returns a fresh table.
use ndarray::{Array2, Axis};

use crate::error::{FphotError, Result};

/// One acquisition frame before channel labelling.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub frame: i64,
    pub system_ts: f64,
    /// `NaN` when the recording has no `ComputerTimestamp` column.
    pub computer_ts: f64,
    pub led_state: i64,
    /// One value per entry of [`RawRecording::regions`].
    pub values: Vec<f64>,
}

/// Raw device output: region column names plus per-frame rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecording {
    pub regions: Vec<String>,
    pub has_computer_ts: bool,
    pub rows: Vec<SampleRow>,
}

/// Long-form signal table keyed by (frame counter, channel label).
#[derive(Debug, Clone, PartialEq)]
pub struct SignalTable {
    pub regions: Vec<String>,
    pub has_computer_ts: bool,
    pub frame: Vec<i64>,
    pub system_ts: Vec<f64>,
    pub computer_ts: Vec<f64>,
    pub led_state: Vec<i64>,
    pub signal: Vec<String>,
    /// `[rows, regions]`.
    pub values: Array2<f64>,
}

impl SignalTable {
    pub fn empty(regions: Vec<String>, has_computer_ts: bool) -> Self {
        let n_reg = regions.len();
        Self {
            regions,
            has_computer_ts,
            frame: vec![],
            system_ts: vec![],
            computer_ts: vec![],
            led_state: vec![],
            signal: vec![],
            values: Array2::zeros((0, n_reg)),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.frame.len()
    }

    pub fn region_index(&self, region: &str) -> Option<usize> {
        self.regions.iter().position(|r| r == region)
    }

    /// Channel labels in order of first appearance.
    pub fn signals(&self) -> Vec<String> {
        let mut out: Vec<String> = vec![];
        for s in &self.signal {
            if !out.contains(s) {
                out.push(s.clone());
            }
        }
        out
    }

    /// Row indices carrying channel label `signal`, in table order.
    pub fn rows_of(&self, signal: &str) -> Vec<usize> {
        self.signal
            .iter()
            .enumerate()
            .filter(|(_, s)| s.as_str() == signal)
            .map(|(i, _)| i)
            .collect()
    }

    /// Values of `region` for rows labelled `signal`.
    ///
    /// `None` when the region column does not exist or no row has the label.
    pub fn trace(&self, signal: &str, region: &str) -> Option<Vec<f64>> {
        let col = self.region_index(region)?;
        let rows = self.rows_of(signal);
        if rows.is_empty() {
            return None;
        }
        Some(rows.iter().map(|&r| self.values[[r, col]]).collect())
    }

    /// New table made of the given rows, in the given order.
    pub fn take(&self, rows: &[usize]) -> SignalTable {
        SignalTable {
            regions: self.regions.clone(),
            has_computer_ts: self.has_computer_ts,
            frame: rows.iter().map(|&r| self.frame[r]).collect(),
            system_ts: rows.iter().map(|&r| self.system_ts[r]).collect(),
            computer_ts: rows.iter().map(|&r| self.computer_ts[r]).collect(),
            led_state: rows.iter().map(|&r| self.led_state[r]).collect(),
            signal: rows.iter().map(|&r| self.signal[r].clone()).collect(),
            values: self.values.select(Axis(0), rows),
        }
    }

    /// Copy of the rows labelled `signal`, relabelled `label`, with every
    /// region value cleared to `NaN`.
    pub fn blank_group(&self, signal: &str, label: &str) -> SignalTable {
        let mut out = self.take(&self.rows_of(signal));
        out.signal.iter_mut().for_each(|s| *s = label.to_string());
        out.values.fill(f64::NAN);
        out
    }

    /// Overwrite one region column. `data` must have one value per row.
    pub fn set_column(&mut self, region: &str, data: &[f64]) -> Result<()> {
        let col = self
            .region_index(region)
            .ok_or_else(|| FphotError::MissingColumn(region.to_string()))?;
        if data.len() != self.n_rows() {
            return Err(FphotError::ShapeMismatch {
                expected: self.n_rows(),
                actual: data.len(),
            });
        }
        for (r, &v) in data.iter().enumerate() {
            self.values[[r, col]] = v;
        }
        Ok(())
    }

    /// Stack tables with identical region columns.
    pub fn concat(parts: &[SignalTable]) -> Result<SignalTable> {
        let Some(first) = parts.first() else {
            return Err(FphotError::ShapeMismatch { expected: 1, actual: 0 });
        };
        let mut out = SignalTable::empty(first.regions.clone(), first.has_computer_ts);
        let mut views = vec![];
        for p in parts {
            if p.regions != first.regions {
                return Err(FphotError::ShapeMismatch {
                    expected: first.regions.len(),
                    actual: p.regions.len(),
                });
            }
            out.frame.extend_from_slice(&p.frame);
            out.system_ts.extend_from_slice(&p.system_ts);
            out.computer_ts.extend_from_slice(&p.computer_ts);
            out.led_state.extend_from_slice(&p.led_state);
            out.signal.extend(p.signal.iter().cloned());
            views.push(p.values.view());
        }
        out.values = ndarray::concatenate(Axis(0), &views)
            .map_err(|_| FphotError::ShapeMismatch {
                expected: first.regions.len(),
                actual: 0,
            })?;
        Ok(out)
    }
}

/// Which optional columns a [`MasterTable`] carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MasterColumns {
    pub system_ts: bool,
    pub computer_ts: bool,
    pub behavior: bool,
    pub events: bool,
}

/// One row of the aligned master table.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub frame: i64,
    pub system_ts: Option<f64>,
    pub computer_ts: Option<f64>,
    /// One value per region; `NaN` for rows added by an outer merge.
    pub values: Vec<f64>,
    pub behav_frame: Option<i64>,
    pub behav_ts: Option<f64>,
    pub event: Option<String>,
    pub event_type: Option<String>,
}

impl MasterRow {
    pub fn bare(frame: i64, n_regions: usize) -> Self {
        Self {
            frame,
            system_ts: None,
            computer_ts: None,
            values: vec![f64::NAN; n_regions],
            behav_frame: None,
            behav_ts: None,
            event: None,
            event_type: None,
        }
    }
}

/// Frame-keyed table in the internal alignment schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MasterTable {
    pub regions: Vec<String>,
    pub columns: MasterColumns,
    pub rows: Vec<MasterRow>,
}

impl MasterTable {
    /// Rows of one channel label of a long-form table, renamed to the
    /// alignment schema and sorted by frame counter.
    pub fn from_channel(table: &SignalTable, channel: &str) -> MasterTable {
        let rows = table
            .rows_of(channel)
            .into_iter()
            .map(|r| MasterRow {
                frame: table.frame[r],
                system_ts: Some(table.system_ts[r]).filter(|v| !v.is_nan()),
                computer_ts: Some(table.computer_ts[r]).filter(|v| !v.is_nan()),
                values: table.values.row(r).to_vec(),
                behav_frame: None,
                behav_ts: None,
                event: None,
                event_type: None,
            })
            .collect();
        let mut out = MasterTable {
            regions: table.regions.clone(),
            columns: MasterColumns {
                system_ts: true,
                computer_ts: table.has_computer_ts,
                ..MasterColumns::default()
            },
            rows,
        };
        out.sort_by_frame();
        out
    }

    pub fn max_frame(&self) -> Option<i64> {
        self.rows.iter().map(|r| r.frame).max()
    }

    pub fn region_index(&self, region: &str) -> Option<usize> {
        self.regions.iter().position(|r| r == region)
    }

    /// Stable sort on frame counter.
    pub fn sort_by_frame(&mut self) {
        self.rows.sort_by_key(|r| r.frame);
    }

    pub fn n_events(&self) -> usize {
        self.rows.iter().filter(|r| r.event.is_some()).count()
    }
}

/// One row of a peri-event window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRow {
    /// Recording frame counter.
    pub frame: i64,
    /// Offset from the event frame (negative before, zero at, positive after).
    pub fm_evt: i64,
    pub evt_id: String,
    pub event: String,
    pub values: Vec<f64>,
}

/// All event windows, concatenated in event order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventWindowTable {
    pub regions: Vec<String>,
    pub rows: Vec<WindowRow>,
}

impl EventWindowTable {
    /// Rows of one event id, in table order.
    pub fn window(&self, evt_id: &str) -> Vec<&WindowRow> {
        self.rows.iter().filter(|r| r.evt_id == evt_id).collect()
    }

    /// Distinct event ids in order of first appearance.
    pub fn event_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = vec![];
        for r in &self.rows {
            if !out.contains(&r.evt_id) {
                out.push(r.evt_id.clone());
            }
        }
        out
    }
}
