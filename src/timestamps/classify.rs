//! Timestamp source classification.
//!
//! A source arrives as a headerless grid of text cells. Each column is
//! coerced to the narrowest type every cell fits (integer → real → boolean →
//! text) and the resulting column kinds pick one of five shapes:
//!
//! | columns | kinds                      | shape                    |
//! |---------|----------------------------|--------------------------|
//! | 2       | text, real                 | keydown event log        |
//! | 2       | integer, real              | behavior-frame timestamps|
//! | 2       | integer, text/boolean      | behavior-frame events    |
//! | 3       | integer, numeric, numeric  | frame timestamps         |
//! | 5       | (optional header) …        | digital I/O events       |
//!
//! Anything else is an [`FphotError::UnrecognizedFormat`].
use std::fmt;

use crate::error::{FphotError, Result};

/// Headerless cell grid, row-major.
pub type RawGrid = Vec<Vec<String>>;

/// Header cell that marks a digital-I/O export.
pub const DIGITAL_IO_HEADER: &str = "DigitalIOName";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Boolean,
    Text,
}

/// A coerced column. Empty cells are allowed only in `Real` (as `NaN`) and
/// `Text` columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Integer(Vec<i64>),
    Real(Vec<f64>),
    Boolean(Vec<bool>),
    Text(Vec<String>),
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Integer(_) => ColumnKind::Integer,
            Column::Real(_) => ColumnKind::Real,
            Column::Boolean(_) => ColumnKind::Boolean,
            Column::Text(_) => ColumnKind::Text,
        }
    }

    /// Numeric view; `None` for boolean and text columns.
    pub fn as_f64(&self) -> Option<Vec<f64>> {
        match self {
            Column::Integer(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Column::Real(v) => Some(v.clone()),
            _ => None,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Try integer, then real, then boolean; fall back to text.
pub fn coerce_column(cells: &[&str]) -> Column {
    let cells: Vec<&str> = cells.iter().map(|c| c.trim()).collect();

    if let Some(v) = cells.iter().map(|c| c.parse::<i64>().ok()).collect::<Option<Vec<_>>>() {
        return Column::Integer(v);
    }
    let real = cells
        .iter()
        .map(|c| if c.is_empty() { Some(f64::NAN) } else { c.parse::<f64>().ok() })
        .collect::<Option<Vec<_>>>();
    if let Some(v) = real {
        if v.iter().any(|x| !x.is_nan()) {
            return Column::Real(v);
        }
    }
    if let Some(v) = cells.iter().map(|c| parse_bool(c)).collect::<Option<Vec<_>>>() {
        return Column::Boolean(v);
    }
    Column::Text(cells.iter().map(|c| c.to_string()).collect())
}

/// Split a grid into coerced columns; short rows are padded with empty cells.
pub fn coerce_grid(grid: &[Vec<String>]) -> Vec<Column> {
    let n_cols = grid.iter().map(Vec::len).max().unwrap_or(0);
    (0..n_cols)
        .map(|c| {
            let cells: Vec<&str> = grid
                .iter()
                .map(|row| row.get(c).map(String::as_str).unwrap_or(""))
                .collect();
            coerce_column(&cells)
        })
        .collect()
}

/// Shape of a classified source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Keydown,
    BehaviorTimestamps,
    BehaviorEvents,
    FrameTimestamps,
    DigitalIo,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Keydown => "ts_keydown",
            SourceKind::BehaviorTimestamps => "ts_behav",
            SourceKind::BehaviorEvents => "ts_events",
            SourceKind::FrameTimestamps => "ts_fp",
            SourceKind::DigitalIo => "ts_arduino",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified timestamp source.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampRecord {
    /// Event label + computer timestamp.
    Keydown { events: Vec<String>, computer_ts: Vec<f64> },
    /// Behavior camera frame + computer timestamp.
    BehaviorTimestamps { behav_frame: Vec<i64>, computer_ts: Vec<f64> },
    /// Behavior camera frame + event label.
    BehaviorEvents { behav_frame: Vec<i64>, events: Vec<String> },
    /// Recording frame + system timestamp + computer timestamp.
    FrameTimestamps { frame: Vec<i64>, system_ts: Vec<f64>, computer_ts: Vec<f64> },
    /// `name-flag-state` label + system timestamp + computer timestamp.
    DigitalIo { events: Vec<String>, system_ts: Vec<f64>, computer_ts: Vec<f64> },
}

impl TimestampRecord {
    pub fn kind(&self) -> SourceKind {
        match self {
            TimestampRecord::Keydown { .. } => SourceKind::Keydown,
            TimestampRecord::BehaviorTimestamps { .. } => SourceKind::BehaviorTimestamps,
            TimestampRecord::BehaviorEvents { .. } => SourceKind::BehaviorEvents,
            TimestampRecord::FrameTimestamps { .. } => SourceKind::FrameTimestamps,
            TimestampRecord::DigitalIo { .. } => SourceKind::DigitalIo,
        }
    }

    /// Event type tag written to the master table, for event-bearing shapes.
    pub fn event_type(&self) -> Option<&'static str> {
        match self {
            TimestampRecord::Keydown { .. } => Some("keydown"),
            TimestampRecord::BehaviorEvents { .. } => Some("user"),
            TimestampRecord::DigitalIo { .. } => Some("arduino"),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TimestampRecord::Keydown { events, .. } => events.len(),
            TimestampRecord::BehaviorTimestamps { behav_frame, .. } => behav_frame.len(),
            TimestampRecord::BehaviorEvents { behav_frame, .. } => behav_frame.len(),
            TimestampRecord::FrameTimestamps { frame, .. } => frame.len(),
            TimestampRecord::DigitalIo { events, .. } => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classification result with the per-column coercion outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub record: TimestampRecord,
    pub column_kinds: Vec<ColumnKind>,
}

fn text_of(col: &Column) -> Vec<String> {
    match col {
        Column::Integer(v) => v.iter().map(|x| x.to_string()).collect(),
        Column::Real(v) => v.iter().map(|x| x.to_string()).collect(),
        Column::Boolean(v) => v.iter().map(|x| if *x { "True" } else { "False" }.to_string()).collect(),
        Column::Text(v) => v.clone(),
    }
}

fn kinds_of(cols: &[Column]) -> Vec<ColumnKind> {
    cols.iter().map(Column::kind).collect()
}

/// Classify one source.
pub fn classify(name: &str, grid: &[Vec<String>]) -> Result<Classified> {
    let non_empty: Vec<Vec<String>> = grid
        .iter()
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .cloned()
        .collect();
    if non_empty.is_empty() {
        return Err(FphotError::unrecognized(name, "no rows"));
    }
    let cols = coerce_grid(&non_empty);

    let record = match cols.as_slice() {
        [Column::Text(events), Column::Real(ts)] => TimestampRecord::Keydown {
            events: events.clone(),
            computer_ts: ts.clone(),
        },
        [Column::Integer(fm), Column::Real(ts)] => TimestampRecord::BehaviorTimestamps {
            behav_frame: fm.clone(),
            computer_ts: ts.clone(),
        },
        [Column::Integer(fm), evt @ (Column::Text(_) | Column::Boolean(_))] => {
            TimestampRecord::BehaviorEvents {
                behav_frame: fm.clone(),
                events: text_of(evt),
            }
        }
        [Column::Integer(fm), sys, comp] => match (sys.as_f64(), comp.as_f64()) {
            (Some(system_ts), Some(computer_ts)) => TimestampRecord::FrameTimestamps {
                frame: fm.clone(),
                system_ts,
                computer_ts,
            },
            _ => {
                return Err(FphotError::unrecognized(
                    name,
                    format!("3 columns of kinds {:?}", kinds_of(&cols)),
                ))
            }
        },
        [_, _, _, _, _] => return classify_digital_io(name, &non_empty),
        _ => {
            return Err(FphotError::unrecognized(
                name,
                format!("{} columns of kinds {:?}", cols.len(), kinds_of(&cols)),
            ))
        }
    };

    Ok(Classified {
        record,
        column_kinds: kinds_of(&cols),
    })
}

fn classify_digital_io(name: &str, grid: &[Vec<String>]) -> Result<Classified> {
    let body = match grid.first() {
        Some(row) if row.first().map(|c| c.trim()) == Some(DIGITAL_IO_HEADER) => &grid[1..],
        _ => grid,
    };
    if body.is_empty() {
        return Err(FphotError::unrecognized(name, "digital I/O header without rows"));
    }
    let cols = coerce_grid(body);
    if cols.len() != 5 {
        return Err(FphotError::unrecognized(
            name,
            format!("digital I/O rows have {} columns, expected 5", cols.len()),
        ));
    }
    let (Some(system_ts), Some(computer_ts)) = (cols[3].as_f64(), cols[4].as_f64()) else {
        return Err(FphotError::unrecognized(
            name,
            format!("digital I/O timestamps are not numeric: {:?}", kinds_of(&cols)),
        ));
    };
    // Labels keep the cells' original spelling.
    let events = body
        .iter()
        .map(|row| {
            let cell = |c: usize| row.get(c).map(|s| s.trim()).unwrap_or("");
            format!("{}-{}-{}", cell(0), cell(1), cell(2))
        })
        .collect();
    Ok(Classified {
        record: TimestampRecord::DigitalIo {
            events,
            system_ts,
            computer_ts,
        },
        column_kinds: kinds_of(&cols),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> RawGrid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn coercion_prefers_narrowest() {
        assert_eq!(coerce_column(&["1", "2"]).kind(), ColumnKind::Integer);
        assert_eq!(coerce_column(&["1", "2.5"]).kind(), ColumnKind::Real);
        assert_eq!(coerce_column(&["1.0", ""]).kind(), ColumnKind::Real);
        assert_eq!(coerce_column(&["True", "false"]).kind(), ColumnKind::Boolean);
        assert_eq!(coerce_column(&["start", "1"]).kind(), ColumnKind::Text);
        assert_eq!(coerce_column(&["", ""]).kind(), ColumnKind::Text);
    }

    #[test]
    fn keydown_and_behavior() {
        let k = classify("k", &grid(&[&["start", "1.0"], &["stop", "2.5"]])).unwrap();
        assert_eq!(k.record.kind(), SourceKind::Keydown);
        assert_eq!(k.column_kinds, vec![ColumnKind::Text, ColumnKind::Real]);

        let b = classify("b", &grid(&[&["0", "1.0"], &["1", "1.2"]])).unwrap();
        assert_eq!(b.record.kind(), SourceKind::BehaviorTimestamps);
    }

    #[test]
    fn behavior_events_text_or_bool() {
        let e = classify("e", &grid(&[&["3", "lick"], &["9", "lick"]])).unwrap();
        assert_eq!(e.record.kind(), SourceKind::BehaviorEvents);
        let e = classify("e", &grid(&[&["3", "True"], &["9", "False"]])).unwrap();
        match e.record {
            TimestampRecord::BehaviorEvents { events, .. } => {
                assert_eq!(events, vec!["True".to_string(), "False".to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn digital_io_header_stripped() {
        let g = grid(&[
            &["DigitalIOName", "DigitalIOFlag", "State", "SystemTimestamp", "ComputerTimestamp"],
            &["Input0", "Input", "True", "10.5", "1000.5"],
            &["Input0", "Input", "False", "11.5", "1001.5"],
        ]);
        let c = classify("io", &g).unwrap();
        match c.record {
            TimestampRecord::DigitalIo { events, system_ts, .. } => {
                assert_eq!(events[0], "Input0-Input-True");
                assert_eq!(system_ts, vec![10.5, 11.5]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn digital_io_short_body_rejected() {
        let g = grid(&[
            &["DigitalIOName", "DigitalIOFlag", "State", "SystemTimestamp", "ComputerTimestamp"],
            &["Input0", "Input", "True"],
        ]);
        assert!(matches!(
            classify("io", &g),
            Err(FphotError::UnrecognizedFormat { .. })
        ));
    }

    #[test]
    fn frame_timestamps() {
        let c = classify("fp", &grid(&[&["1", "0.5", "100.0"], &["2", "0.6", "100.1"]])).unwrap();
        assert_eq!(c.record.kind(), SourceKind::FrameTimestamps);
    }

    #[test]
    fn unknown_shapes_rejected() {
        assert!(matches!(
            classify("x", &grid(&[&["a", "b"], &["c", "d"]])),
            Err(FphotError::UnrecognizedFormat { .. })
        ));
        assert!(classify("x", &grid(&[&["1", "2", "3", "4"]])).is_err());
        assert!(classify("x", &grid(&[])).is_err());
    }
}
