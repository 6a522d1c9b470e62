//! Merge external timestamp sources onto the recording's frame index.
//!
//! Order of operations:
//!
//! 1. Frame timestamps: exact one-to-one match on frame counter.
//! 2. Behavior timestamps: nearest computer timestamp → recording frame;
//!    outer-merged so every behavior frame keeps a row.
//! 3. Event sources resolve to recording frames: behavior-frame events through
//!    the mapping from step 2, digital I/O events by nearest system timestamp,
//!    keydown events by nearest computer timestamp, direct events as given.
//! 4. All events are sorted by frame and outer-merged onto the master table.
//!
//! A missing master column skips the dependent source with a warning; the
//! skipped sources come back in [`Alignment::residual`].
use std::collections::{BTreeMap, HashMap};

use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{FphotError, Result};
use crate::table::{MasterRow, MasterTable};

use super::asof::{check_strictly_increasing, merge_nearest};
use super::classify::{classify, RawGrid, SourceKind, TimestampRecord};

/// A named, not yet classified source.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampSource {
    pub name: String,
    pub grid: RawGrid,
}

impl TimestampSource {
    pub fn new(name: impl Into<String>, grid: RawGrid) -> Self {
        Self {
            name: name.into(),
            grid,
        }
    }
}

/// An event already placed on a recording frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub frame: i64,
    pub event: String,
    pub event_type: String,
}

/// Output of [`align_ts`].
#[derive(Debug, Clone)]
pub struct Alignment {
    pub master: MasterTable,
    /// How each source was interpreted, in input order.
    pub kinds: Vec<(String, SourceKind)>,
    /// Sources that could not be merged.
    pub residual: Vec<(String, TimestampRecord)>,
    pub diagnostics: Diagnostics,
}

/// Unique `(key, frame)` pairs from the master in frame order, skipping
/// rows without a key.
fn reference(
    master: &MasterTable,
    key: fn(&MasterRow) -> Option<f64>,
    key_name: &'static str,
) -> Result<(Vec<f64>, Vec<i64>)> {
    let mut keys = vec![];
    let mut frames = vec![];
    for row in &master.rows {
        if frames.last() == Some(&row.frame) {
            continue;
        }
        if let Some(k) = key(row).filter(|k| !k.is_nan()) {
            keys.push(k);
            frames.push(row.frame);
        }
    }
    check_strictly_increasing(&keys, "master table", key_name)?;
    Ok((keys, frames))
}

/// Map each source timestamp to the nearest master frame.
fn nearest_frames(
    master: &MasterTable,
    source: &str,
    ts: &[f64],
    key: fn(&MasterRow) -> Option<f64>,
    key_name: &'static str,
) -> Result<Vec<Option<i64>>> {
    let (keys, frames) = reference(master, key, key_name)?;
    let idx = merge_nearest(ts, source, &keys, "master table", key_name)?;
    Ok(idx.into_iter().map(|i| i.map(|i| frames[i])).collect())
}

fn duplicated_frames(frames: impl Iterator<Item = i64>) -> Vec<i64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for f in frames {
        *counts.entry(f).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|&(_, c)| c > 1)
        .map(|(f, _)| f)
        .collect()
}

fn merge_frame_timestamps(
    master: &mut MasterTable,
    name: &str,
    frame: &[i64],
    system_ts: &[f64],
    computer_ts: &[f64],
    diag: &mut Diagnostics,
) -> Result<()> {
    let mut lookup: HashMap<i64, usize> = HashMap::with_capacity(frame.len());
    for (i, &f) in frame.iter().enumerate() {
        if lookup.insert(f, i).is_some() {
            return Err(FphotError::DuplicateFrameKey {
                source_name: name.to_string(),
                frame: f,
            });
        }
    }
    if let (Some(source_max), Some(data_max)) = (frame.iter().copied().max(), master.max_frame()) {
        if source_max != data_max {
            diag.warn(Warning::FrameCountMismatch { source_max, data_max });
        }
    }
    for row in &mut master.rows {
        if let Some(&i) = lookup.get(&row.frame) {
            row.system_ts = Some(system_ts[i]).filter(|v| !v.is_nan());
            row.computer_ts = Some(computer_ts[i]).filter(|v| !v.is_nan());
        }
    }
    master.columns.system_ts = true;
    master.columns.computer_ts = true;
    Ok(())
}

fn merge_behavior(
    master: &mut MasterTable,
    name: &str,
    behav_frame: &[i64],
    computer_ts: &[f64],
    diag: &mut Diagnostics,
) -> Result<()> {
    let frames = nearest_frames(master, name, computer_ts, |r| r.computer_ts, "ts")?;
    let mut by_frame: BTreeMap<i64, Vec<(i64, f64)>> = BTreeMap::new();
    for ((&bf, &ts), fm) in behav_frame.iter().zip(computer_ts).zip(frames) {
        if let Some(fm) = fm {
            by_frame.entry(fm).or_default().push((bf, ts));
        }
    }
    let dups: Vec<i64> = by_frame
        .iter()
        .filter(|(_, v)| v.len() > 1)
        .map(|(&f, _)| f)
        .collect();
    if !dups.is_empty() {
        diag.warn(Warning::DuplicateBehaviorMapping { frames: dups });
    }

    let mut rows = Vec::with_capacity(master.rows.len());
    for row in master.rows.drain(..) {
        match by_frame.get(&row.frame) {
            Some(matches) => {
                for &(bf, ts) in matches {
                    rows.push(MasterRow {
                        behav_frame: Some(bf),
                        behav_ts: Some(ts),
                        ..row.clone()
                    });
                }
            }
            None => rows.push(row),
        }
    }
    master.rows = rows;
    master.sort_by_frame();
    master.columns.behavior = true;
    Ok(())
}

/// Resolve one event source to `(frame, label)` pairs.
///
/// `Ok(None)` when a required master column is missing.
fn resolve_events(
    master: &MasterTable,
    name: &str,
    record: &TimestampRecord,
    diag: &mut Diagnostics,
) -> Result<Option<Vec<(Option<i64>, String)>>> {
    let resolved: Vec<(Option<i64>, String)> = match record {
        TimestampRecord::BehaviorEvents { behav_frame, events } => {
            if !master.columns.behavior {
                diag.warn(Warning::CannotAlign {
                    source_name: name.to_string(),
                    missing: "behavior frames".into(),
                });
                return Ok(None);
            }
            let mut lookup: HashMap<i64, i64> = HashMap::new();
            for row in &master.rows {
                if let Some(bf) = row.behav_frame {
                    lookup.entry(bf).or_insert(row.frame);
                }
            }
            behav_frame
                .iter()
                .zip(events)
                .map(|(bf, e)| (lookup.get(bf).copied(), e.clone()))
                .collect()
        }
        TimestampRecord::DigitalIo { events, system_ts, .. } => {
            if !master.columns.system_ts {
                diag.warn(Warning::CannotAlign {
                    source_name: name.to_string(),
                    missing: "system timestamps".into(),
                });
                return Ok(None);
            }
            let frames = nearest_frames(master, name, system_ts, |r| r.system_ts, "ts_fp")?;
            frames.into_iter().zip(events.iter().cloned()).collect()
        }
        TimestampRecord::Keydown { events, computer_ts } => {
            if !master.columns.computer_ts {
                diag.warn(Warning::CannotAlign {
                    source_name: name.to_string(),
                    missing: "computer timestamps".into(),
                });
                return Ok(None);
            }
            let frames = nearest_frames(master, name, computer_ts, |r| r.computer_ts, "ts")?;
            frames.into_iter().zip(events.iter().cloned()).collect()
        }
        // Clock sources never reach this point.
        TimestampRecord::FrameTimestamps { .. } | TimestampRecord::BehaviorTimestamps { .. } => {
            return Ok(None)
        }
    };
    Ok(Some(resolved))
}

fn merge_events(master: &mut MasterTable, mut events: Vec<EventRecord>, diag: &mut Diagnostics) {
    events.sort_by_key(|e| e.frame);
    let dups = duplicated_frames(events.iter().map(|e| e.frame));
    if !dups.is_empty() {
        diag.warn(Warning::DuplicateEventMapping { frames: dups });
    }

    let mut by_frame: BTreeMap<i64, Vec<EventRecord>> = BTreeMap::new();
    for e in events {
        by_frame.entry(e.frame).or_default().push(e);
    }

    let n_reg = master.regions.len();
    let mut rows = Vec::with_capacity(master.rows.len());
    for row in master.rows.drain(..) {
        match by_frame.get(&row.frame) {
            Some(evts) => {
                for e in evts {
                    rows.push(MasterRow {
                        event: Some(e.event.clone()),
                        event_type: Some(e.event_type.clone()),
                        ..row.clone()
                    });
                }
            }
            None => rows.push(row),
        }
    }
    let present: std::collections::HashSet<i64> = rows.iter().map(|r| r.frame).collect();
    for (frame, evts) in by_frame {
        if present.contains(&frame) {
            continue;
        }
        for e in evts {
            rows.push(MasterRow {
                event: Some(e.event),
                event_type: Some(e.event_type),
                ..MasterRow::bare(frame, n_reg)
            });
        }
    }
    master.rows = rows;
    master.sort_by_frame();
    master.columns.events = true;
}

/// Classify every source and merge it onto `master`.
///
/// Fails on an unrecognized shape, on a second frame- or behavior-timestamp
/// source, on a repeated frame in the frame-timestamp source and on
/// non-monotonic nearest-time keys. Everything else degrades to a warning.
pub fn align_ts(
    master: &MasterTable,
    sources: &[TimestampSource],
    direct_events: &[EventRecord],
) -> Result<Alignment> {
    let mut diag = Diagnostics::new();
    let mut kinds = vec![];
    let mut frame_src: Option<(String, TimestampRecord)> = None;
    let mut behav_src: Option<(String, TimestampRecord)> = None;
    let mut event_srcs: Vec<(String, TimestampRecord)> = vec![];

    for src in sources {
        let record = classify(&src.name, &src.grid)?.record;
        let kind = record.kind();
        log::info!("interpreting {} as {kind}", src.name);
        kinds.push((src.name.clone(), kind));
        let slot = match kind {
            SourceKind::FrameTimestamps => &mut frame_src,
            SourceKind::BehaviorTimestamps => &mut behav_src,
            _ => {
                event_srcs.push((src.name.clone(), record));
                continue;
            }
        };
        if let Some((first, _)) = slot {
            return Err(FphotError::AmbiguousClock {
                kind: kind.as_str(),
                first: first.clone(),
                second: src.name.clone(),
            });
        }
        *slot = Some((src.name.clone(), record));
    }

    let mut out = master.clone();
    let mut residual = vec![];

    if let Some((name, TimestampRecord::FrameTimestamps { frame, system_ts, computer_ts })) = &frame_src {
        merge_frame_timestamps(&mut out, name, frame, system_ts, computer_ts, &mut diag)?;
    }

    if let Some((name, record)) = behav_src {
        let merged = match &record {
            TimestampRecord::BehaviorTimestamps { behav_frame, computer_ts }
                if out.columns.computer_ts =>
            {
                merge_behavior(&mut out, &name, behav_frame, computer_ts, &mut diag)?;
                true
            }
            _ => false,
        };
        if !merged {
            diag.warn(Warning::CannotAlign {
                source_name: name.clone(),
                missing: "computer timestamps".into(),
            });
            residual.push((name, record));
        }
    }

    let mut events: Vec<EventRecord> = direct_events.to_vec();
    for (name, record) in event_srcs {
        let Some(resolved) = resolve_events(&out, &name, &record, &mut diag)? else {
            residual.push((name, record));
            continue;
        };
        let event_type = record.event_type().unwrap_or("user");
        let mut dropped = 0;
        for (frame, event) in resolved {
            match frame {
                Some(frame) => events.push(EventRecord {
                    frame,
                    event,
                    event_type: event_type.to_string(),
                }),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            diag.warn(Warning::UnresolvedEvents {
                source_name: name.clone(),
                count: dropped,
            });
        }
        log::info!("aligned {name}");
    }

    if !events.is_empty() {
        merge_events(&mut out, events, &mut diag);
    }

    Ok(Alignment {
        master: out,
        kinds,
        residual,
        diagnostics: diag,
    })
}
