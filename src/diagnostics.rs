//! Recoverable data-quality warnings.
//!
//! Each stage returns a [`Diagnostics`] list next to its output so callers can
//! inspect what was skipped or patched over. Every warning is also forwarded
//! to the `log` facade at `warn` level when it is recorded.
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Biexponential fit did not converge; the initial-guess curve was used.
    FitFailed {
        region: String,
        channel: String,
        reason: String,
    },
    /// Baseline `(region, channel)` absent from the signal table.
    MissingBaseline {
        region: String,
        channel: String,
        base_region: String,
        base_channel: String,
    },
    /// Target `(region, channel)` absent from the signal table.
    MissingTarget { region: String, channel: String },
    /// Target and baseline traces differ in length; correction skipped.
    TraceLengthMismatch {
        region: String,
        channel: String,
        target_len: usize,
        baseline_len: usize,
    },
    /// Frame-timestamp source and recording disagree on the last frame.
    FrameCountMismatch { source_max: i64, data_max: i64 },
    /// Several behavior frames landed on the same recording frame.
    DuplicateBehaviorMapping { frames: Vec<i64> },
    /// Several events landed on the same recording frame.
    DuplicateEventMapping { frames: Vec<i64> },
    /// A source needs a master column that does not exist.
    CannotAlign { source_name: String, missing: String },
    /// Event rows whose recording frame could not be resolved were dropped.
    UnresolvedEvents { source_name: String, count: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::FitFailed { region, channel, reason } => write!(
                f,
                "biexponential fit failed for {region}/{channel} ({reason}); using initial guess"
            ),
            Warning::MissingBaseline { region, channel, base_region, base_channel } => write!(
                f,
                "cannot find signal '{base_channel}' in roi '{base_region}', \
                 skipping correction for signal '{channel}' roi '{region}'"
            ),
            Warning::MissingTarget { region, channel } => {
                write!(f, "cannot find signal '{channel}' in roi '{region}', skipping")
            }
            Warning::TraceLengthMismatch { region, channel, target_len, baseline_len } => write!(
                f,
                "signal '{channel}' roi '{region}' has {target_len} samples but its baseline \
                 has {baseline_len}, skipping"
            ),
            Warning::FrameCountMismatch { source_max, data_max } => {
                let diff = source_max - data_max;
                let txt = if diff > 0 { "more" } else { "less" };
                write!(
                    f,
                    "frame timestamp file has {} frames {txt} than data file",
                    diff.abs()
                )
            }
            Warning::DuplicateBehaviorMapping { frames } => write!(
                f,
                "multiple behavior frames mapped to the same recording frame: {frames:?}"
            ),
            Warning::DuplicateEventMapping { frames } => write!(
                f,
                "multiple events mapped to the same recording frame: {frames:?}"
            ),
            Warning::CannotAlign { source_name, missing } => {
                write!(f, "no {missing} supplied, cannot align {source_name}")
            }
            Warning::UnresolvedEvents { source_name, count } => write!(
                f,
                "{count} event(s) from {source_name} have no matching recording frame; dropped"
            ),
        }
    }
}

/// Ordered list of warnings raised by one stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, w: Warning) {
        log::warn!("{w}");
        self.warnings.push(w);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }
}
