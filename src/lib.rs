//! # fphot: fiber-photometry preprocessing in Rust
//!
//! `fphot` turns raw multi-channel fluorescence recordings into
//! photobleach-corrected, z-scored traces, aligns external behavioral
//! timestamps onto the recording's frame index, and cuts peri-event windows
//! for pooled analysis.
//!
//! ## Pipeline overview
//!
//! ```text
//! recording.csv
//!   │
//!   ├─ io::read_samples_csv()          FrameCounter / timestamps / LedState / regions
//!   ├─ load::load_recording()          discard warm-up, LED → channel, equal group sizes
//!   ├─ photobleach::correct()          biexp baseline fit + Huber regression + z-score
//!   ├─ peaks::detect()                 optional prominence peaks + rolling frequency
//!   │
//!   ├─ MasterTable::from_channel()     one channel in the alignment schema
//!   ├─ timestamps::align_ts()          frame / behavior / event sources → frames
//!   └─ epoch::pool()                   peri-event windows, pre-event z-score
//!        │
//!        └─→ EventWindowTable          (fm_fp, fm_evt, evt_id, event, regions…)
//! ```
//!
//! Data-quality problems never abort a stage: they come back as
//! [`Warning`]s in each stage's [`Diagnostics`] (and are logged through the
//! `log` facade). Only unrecoverable conditions are [`FphotError`]s.
//!
//! ## Quick start
//!
//! ```no_run
//! use fphot::{process, PipelineConfig, MasterTable};
//! use fphot::io::read_samples_csv;
//! use std::path::Path;
//!
//! let raw = read_samples_csv(Path::new("data/recording.csv")).unwrap();
//! let cfg = PipelineConfig::from_json_file(Path::new("data/config.json")).unwrap();
//!
//! let out = process(&raw, &cfg).unwrap();
//! for w in out.diagnostics.iter() {
//!     println!("warning: {w}");
//! }
//! let master = MasterTable::from_channel(&out.table, "470nm-norm-zs");
//! println!("{} frames", master.rows.len());
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use fphot::fit::{fit_exp2, linspace01};
//! use fphot::peaks::find_peaks;
//!
//! let y: Vec<f64> = (0..1000).map(|i| (-(i as f64) / 300.0).exp()).collect();
//! let fit = fit_exp2(&y, &linspace01(y.len()));
//! println!("params {:?}, converged {}", fit.params, fit.converged());
//!
//! let peaks = find_peaks(&y, 0.5);
//! assert!(peaks.is_empty());
//! ```

pub mod config;
pub mod diagnostics;
pub mod epoch;
pub mod error;
pub mod fit;
pub mod io;
pub mod load;
pub mod normalize;
pub mod peaks;
pub mod photobleach;
pub mod table;
pub mod timestamps;

use std::collections::BTreeMap;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{BaselineEntry, BaselineMap, ChannelRef, PipelineConfig};

// diagnostics / errors
pub use diagnostics::{Diagnostics, Warning};
pub use error::{FphotError, Result};

// stages
pub use epoch::{pool, pool_events};
pub use load::{load_data, load_recording};
pub use peaks::{detect, find_peaks, find_pks, label_bouts, PeakTable, RegionPeaks};
pub use photobleach::{compute_dff, correct, photobleach_correction, Corrected, DffResult};
pub use timestamps::{align_ts, Alignment, EventRecord, SourceKind, TimestampRecord, TimestampSource};

// fitting
pub use fit::{fit_exp2, huber_fit, Exp2Fit, FitStatus, HuberFit};

// tables
pub use table::{
    EventWindowTable, MasterColumns, MasterRow, MasterTable, RawRecording, SampleRow, SignalTable,
    WindowRow,
};

/// Output of [`process`].
#[derive(Debug, Clone)]
pub struct Processed {
    /// Raw, `-fit`, `-norm` and `-norm-zs` channel groups.
    pub table: SignalTable,
    pub fits: BTreeMap<ChannelRef, Exp2Fit>,
    /// Present when a peak prominence is configured.
    pub peaks: Option<PeakTable>,
    pub diagnostics: Diagnostics,
}

/// Run **load → photobleach correction → peak detection** on one recording.
///
/// Peak detection runs only when [`PipelineConfig::peak_prominence`] is set.
///
/// # Errors
///
/// Configuration errors for unset loader or corrector parameters, and
/// [`FphotError::MissingColumn`] when a configured region is absent.
pub fn process(raw: &RawRecording, cfg: &PipelineConfig) -> Result<Processed> {
    let loaded = load_recording(raw, cfg)?;
    let corrected = correct(&loaded, cfg)?;
    let peaks = match cfg.peak_prominence {
        Some(_) => Some(detect(&corrected.table, cfg)?),
        None => None,
    };
    Ok(Processed {
        table: corrected.table,
        fits: corrected.fits,
        peaks,
        diagnostics: corrected.diagnostics,
    })
}
