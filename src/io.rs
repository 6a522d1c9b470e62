//! Delimited-text and spreadsheet I/O for the pipeline.
//!
//! Readers: raw device CSVs, headerless timestamp sources (CSV or the first
//! sheet of a workbook), and the tables the pipeline itself exports. Writers: per-channel signal tables, the aligned
//! master table, and peri-event windows.
//!
//! Missing cells are written empty and read back as `NaN` / `None`.
use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::error::{FphotError, Result};
use crate::peaks::{PeakTable, RegionPeaks};
use crate::table::{
    EventWindowTable, MasterColumns, MasterRow, MasterTable, RawRecording, SampleRow, SignalTable,
};
use crate::timestamps::RawGrid;

// ── Low-level line splitting and cell parsing ─────────────────────────────────

/// Split one line on commas, honoring double-quoted cells (`""` escapes a quote).
fn split_line(line: &str) -> Vec<String> {
    let mut cells = vec![];
    let mut cur = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    cells.push(cur);
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .filter(|l| !l.trim().is_empty())
        .collect())
}

fn parse_f64(cell: &str, column: &str, line: usize) -> Result<f64> {
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| FphotError::Parse {
        column: column.to_string(),
        value: cell.to_string(),
        line,
    })
}

fn parse_opt_f64(cell: &str, column: &str, line: usize) -> Result<Option<f64>> {
    let v = parse_f64(cell, column, line)?;
    Ok(Some(v).filter(|v| !v.is_nan()))
}

/// Integers may be written as `12` or `12.0`.
fn parse_opt_i64(cell: &str, column: &str, line: usize) -> Result<Option<i64>> {
    if cell.is_empty() {
        return Ok(None);
    }
    if let Ok(v) = cell.parse::<i64>() {
        return Ok(Some(v));
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
        _ => Err(FphotError::Parse {
            column: column.to_string(),
            value: cell.to_string(),
            line,
        }),
    }
}

fn parse_i64(cell: &str, column: &str, line: usize) -> Result<i64> {
    parse_opt_i64(cell, column, line)?.ok_or_else(|| FphotError::Parse {
        column: column.to_string(),
        value: String::new(),
        line,
    })
}

fn opt_str(cell: &str) -> Option<String> {
    Some(cell.to_string()).filter(|s| !s.is_empty())
}

// ── Headed table ──────────────────────────────────────────────────────────────

/// A CSV file with a header line. Data rows are padded to the header width.
struct Headed {
    header: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Headed {
    fn load(path: &Path) -> Result<Self> {
        let lines = read_lines(path)?;
        let Some((first, rest)) = lines.split_first() else {
            return Err(FphotError::unrecognized(
                path.display().to_string(),
                "file is empty",
            ));
        };
        let header = split_line(first);
        let index = header
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), i))
            .collect();
        let rows = rest
            .iter()
            .map(|l| {
                let mut cells = split_line(l);
                cells.resize(header.len().max(cells.len()), String::new());
                cells
            })
            .collect();
        Ok(Self { header, index, rows })
    }

    fn col(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| FphotError::MissingColumn(name.to_string()))
    }

    fn opt_col(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Named columns not in `known`, in file order.
    fn others(&self, known: &[&str]) -> Vec<(usize, String)> {
        self.header
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty() && !known.contains(&h.as_str()))
            .map(|(i, h)| (i, h.clone()))
            .collect()
    }

    /// 1-based file line number of data row `r`.
    fn line(r: usize) -> usize {
        r + 2
    }
}

// ── Simple CSV writer ─────────────────────────────────────────────────────────

/// Row-at-a-time CSV builder.
///
/// ```rust,no_run
/// use fphot::io::CsvWriter;
/// use std::path::Path;
/// let mut w = CsvWriter::new(&["a", "b"]);
/// w.push(vec!["1".into(), "".into()]);
/// w.write(Path::new("/tmp/out.csv")).unwrap();
/// ```
pub struct CsvWriter {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvWriter {
    pub fn new<S: AsRef<str>>(header: &[S]) -> Self {
        Self {
            header: header.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: vec![],
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut f = std::io::BufWriter::new(std::fs::File::create(path)?);
        writeln!(f, "{}", join(&self.header))?;
        for row in &self.rows {
            writeln!(f, "{}", join(row))?;
        }
        f.flush()?;
        log::debug!("wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

fn quote(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn join(cells: &[String]) -> String {
    cells.iter().map(|c| quote(c)).collect::<Vec<_>>().join(",")
}

fn fmt_f64(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

fn fmt_opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

// ── Raw device output ─────────────────────────────────────────────────────────

const SAMPLE_KNOWN: [&str; 4] = [
    "FrameCounter",
    "SystemTimestamp",
    "LedState",
    "ComputerTimestamp",
];

/// Read a raw recording.
///
/// Requires `FrameCounter`, `SystemTimestamp` and `LedState`;
/// `ComputerTimestamp` is optional. Every other named column is a region.
pub fn read_samples_csv(path: &Path) -> Result<RawRecording> {
    let t = Headed::load(path)?;
    let c_fm = t.col("FrameCounter")?;
    let c_sys = t.col("SystemTimestamp")?;
    let c_led = t.col("LedState")?;
    let c_comp = t.opt_col("ComputerTimestamp");
    let regions = t.others(&SAMPLE_KNOWN);

    let mut rows = Vec::with_capacity(t.rows.len());
    for (r, cells) in t.rows.iter().enumerate() {
        let line = Headed::line(r);
        let values = regions
            .iter()
            .map(|(i, name)| parse_f64(&cells[*i], name, line))
            .collect::<Result<Vec<_>>>()?;
        rows.push(SampleRow {
            frame: parse_i64(&cells[c_fm], "FrameCounter", line)?,
            system_ts: parse_f64(&cells[c_sys], "SystemTimestamp", line)?,
            computer_ts: match c_comp {
                Some(c) => parse_f64(&cells[c], "ComputerTimestamp", line)?,
                None => f64::NAN,
            },
            led_state: parse_i64(&cells[c_led], "LedState", line)?,
            values,
        });
    }
    log::info!("read {} samples from {}", rows.len(), path.display());
    Ok(RawRecording {
        regions: regions.into_iter().map(|(_, n)| n).collect(),
        has_computer_ts: c_comp.is_some(),
        rows,
    })
}

/// Read a headerless timestamp source as a rectangular grid of trimmed cells.
///
/// Short rows are padded with empty cells.
pub fn read_timestamp_csv(path: &Path) -> Result<RawGrid> {
    let mut grid: RawGrid = read_lines(path)?.iter().map(|l| split_line(l)).collect();
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    for row in grid.iter_mut() {
        row.resize(width, String::new());
    }
    Ok(grid)
}

// ── Spreadsheet timestamp sources ────────────────────────────────────────────

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Excel stores every number as a float; whole values print without a
/// fraction so they still coerce to integers.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => v.to_string(),
        other => other.to_string(),
    }
}

/// Stringify a sheet range into a headerless grid.
pub fn grid_from_range(range: &Range<Data>) -> RawGrid {
    range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect()
}

/// Read the first sheet of a workbook as a headerless grid.
pub fn read_timestamp_xlsx(path: &Path) -> Result<RawGrid> {
    let spreadsheet = |e: calamine::Error| FphotError::Spreadsheet(format!("{}: {e}", path.display()));
    let mut wb = open_workbook_auto(path).map_err(spreadsheet)?;
    let range = wb
        .worksheet_range_at(0)
        .ok_or_else(|| FphotError::unrecognized(path.display().to_string(), "workbook has no sheets"))?
        .map_err(spreadsheet)?;
    Ok(grid_from_range(&range))
}

/// Read a timestamp source, choosing the reader by file extension.
pub fn read_timestamp_file(path: &Path) -> Result<RawGrid> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        read_timestamp_xlsx(path)
    } else {
        read_timestamp_csv(path)
    }
}

// ── Per-channel signal export ─────────────────────────────────────────────────

/// Write the rows of one channel label.
///
/// `ComputerTimestamp` is written only when the table carries it. With
/// `peaks`, every region searched in this channel gains a `<region>-pks`
/// column (`True`/`False`) and, when a window was set, `<region>-freq`.
pub fn write_channel_csv(
    table: &SignalTable,
    channel: &str,
    peaks: Option<&PeakTable>,
    path: &Path,
) -> Result<()> {
    let rows = table.rows_of(channel);
    let searched: Vec<&RegionPeaks> = match peaks {
        Some(p) => {
            if p.table.n_rows() != table.n_rows() {
                return Err(FphotError::ShapeMismatch {
                    expected: table.n_rows(),
                    actual: p.table.n_rows(),
                });
            }
            p.regions
                .iter()
                .filter(|rp| rows.iter().any(|&r| rp.is_peak[r].is_some()))
                .collect()
        }
        None => vec![],
    };

    let mut header: Vec<String> = vec!["FrameCounter".into(), "SystemTimestamp".into(), "LedState".into()];
    if table.has_computer_ts {
        header.push("ComputerTimestamp".into());
    }
    header.extend(table.regions.iter().cloned());
    for rp in &searched {
        header.push(pks_label(&rp.region));
        if rp.frequency.is_some() {
            header.push(freq_label(&rp.region));
        }
    }

    let mut w = CsvWriter::new(&header);
    for r in rows {
        let mut row = vec![
            table.frame[r].to_string(),
            fmt_f64(table.system_ts[r]),
            table.led_state[r].to_string(),
        ];
        if table.has_computer_ts {
            row.push(fmt_f64(table.computer_ts[r]));
        }
        row.extend(table.values.row(r).iter().map(|&v| fmt_f64(v)));
        for rp in &searched {
            row.push(match rp.is_peak[r] {
                Some(true) => "True".into(),
                Some(false) => "False".into(),
                None => String::new(),
            });
            if let Some(freq) = &rp.frequency {
                row.push(fmt_f64(freq[r]));
            }
        }
        w.push(row);
    }
    w.write(path)
}

fn pks_label(region: &str) -> String {
    format!("{region}-pks")
}

fn freq_label(region: &str) -> String {
    format!("{region}-freq")
}

/// Read a per-channel export into the alignment schema, sorted by frame.
pub fn read_channel_csv(path: &Path) -> Result<MasterTable> {
    let t = Headed::load(path)?;
    let c_fm = t.col("FrameCounter")?;
    let c_sys = t.col("SystemTimestamp")?;
    let c_comp = t.opt_col("ComputerTimestamp");
    // Peak columns written next to a region are not regions themselves.
    let regions: Vec<(usize, String)> = t
        .others(&SAMPLE_KNOWN)
        .into_iter()
        .filter(|(_, name)| {
            !t.header
                .iter()
                .any(|h| *name == pks_label(h) || *name == freq_label(h))
        })
        .collect();

    let mut rows = Vec::with_capacity(t.rows.len());
    for (r, cells) in t.rows.iter().enumerate() {
        let line = Headed::line(r);
        let mut row = MasterRow::bare(parse_i64(&cells[c_fm], "FrameCounter", line)?, regions.len());
        row.system_ts = parse_opt_f64(&cells[c_sys], "SystemTimestamp", line)?;
        if let Some(c) = c_comp {
            row.computer_ts = parse_opt_f64(&cells[c], "ComputerTimestamp", line)?;
        }
        for (k, (i, name)) in regions.iter().enumerate() {
            row.values[k] = parse_f64(&cells[*i], name, line)?;
        }
        rows.push(row);
    }
    let mut out = MasterTable {
        regions: regions.into_iter().map(|(_, n)| n).collect(),
        columns: MasterColumns {
            system_ts: true,
            computer_ts: c_comp.is_some(),
            ..MasterColumns::default()
        },
        rows,
    };
    out.sort_by_frame();
    Ok(out)
}

// ── Aligned master table ──────────────────────────────────────────────────────

const MASTER_KNOWN: [&str; 7] = [
    "fm_fp", "ts_fp", "ts", "fm_behav", "ts_behav", "event", "event_type",
];

/// Write the aligned master table; absent optional columns are omitted.
pub fn write_master_csv(table: &MasterTable, path: &Path) -> Result<()> {
    let cols = table.columns;
    let mut header: Vec<String> = vec!["fm_fp".into()];
    if cols.system_ts {
        header.push("ts_fp".into());
    }
    if cols.computer_ts {
        header.push("ts".into());
    }
    header.extend(table.regions.iter().cloned());
    if cols.behavior {
        header.extend(["fm_behav".to_string(), "ts_behav".to_string()]);
    }
    if cols.events {
        header.extend(["event".to_string(), "event_type".to_string()]);
    }

    let mut w = CsvWriter::new(&header);
    for r in &table.rows {
        let mut row = vec![r.frame.to_string()];
        if cols.system_ts {
            row.push(fmt_opt(&r.system_ts));
        }
        if cols.computer_ts {
            row.push(fmt_opt(&r.computer_ts));
        }
        row.extend(r.values.iter().map(|&v| fmt_f64(v)));
        if cols.behavior {
            row.push(fmt_opt(&r.behav_frame));
            row.push(fmt_opt(&r.behav_ts));
        }
        if cols.events {
            row.push(fmt_opt(&r.event));
            row.push(fmt_opt(&r.event_type));
        }
        w.push(row);
    }
    w.write(path)
}

/// Read a master table written by [`write_master_csv`]. Row order is kept.
pub fn read_master_csv(path: &Path) -> Result<MasterTable> {
    let t = Headed::load(path)?;
    let c_fm = t.col("fm_fp")?;
    let c_sys = t.opt_col("ts_fp");
    let c_comp = t.opt_col("ts");
    let c_bfm = t.opt_col("fm_behav");
    let c_bts = t.opt_col("ts_behav");
    let c_evt = t.opt_col("event");
    let c_evt_type = t.opt_col("event_type");
    let regions = t.others(&MASTER_KNOWN);

    let mut rows = Vec::with_capacity(t.rows.len());
    for (r, cells) in t.rows.iter().enumerate() {
        let line = Headed::line(r);
        let mut row = MasterRow::bare(parse_i64(&cells[c_fm], "fm_fp", line)?, regions.len());
        if let Some(c) = c_sys {
            row.system_ts = parse_opt_f64(&cells[c], "ts_fp", line)?;
        }
        if let Some(c) = c_comp {
            row.computer_ts = parse_opt_f64(&cells[c], "ts", line)?;
        }
        for (k, (i, name)) in regions.iter().enumerate() {
            row.values[k] = parse_f64(&cells[*i], name, line)?;
        }
        if let Some(c) = c_bfm {
            row.behav_frame = parse_opt_i64(&cells[c], "fm_behav", line)?;
        }
        if let Some(c) = c_bts {
            row.behav_ts = parse_opt_f64(&cells[c], "ts_behav", line)?;
        }
        if let Some(c) = c_evt {
            row.event = opt_str(&cells[c]);
        }
        if let Some(c) = c_evt_type {
            row.event_type = opt_str(&cells[c]);
        }
        rows.push(row);
    }
    Ok(MasterTable {
        regions: regions.into_iter().map(|(_, n)| n).collect(),
        columns: MasterColumns {
            system_ts: c_sys.is_some(),
            computer_ts: c_comp.is_some(),
            behavior: c_bfm.is_some(),
            events: c_evt.is_some(),
        },
        rows,
    })
}

// ── Event windows ─────────────────────────────────────────────────────────────

/// Write pooled event windows.
pub fn write_windows_csv(windows: &EventWindowTable, path: &Path) -> Result<()> {
    let mut header: Vec<String> = vec!["fm_fp".into(), "fm_evt".into(), "evt_id".into(), "event".into()];
    header.extend(windows.regions.iter().cloned());
    let mut w = CsvWriter::new(&header);
    for r in &windows.rows {
        let mut row = vec![
            r.frame.to_string(),
            r.fm_evt.to_string(),
            r.evt_id.clone(),
            r.event.clone(),
        ];
        row.extend(r.values.iter().map(|&v| fmt_f64(v)));
        w.push(row);
    }
    w.write(path)
}
