//! Error types.
//!
//! Only unrecoverable conditions live here. Data-quality problems that the
//! pipeline can work around are reported through [`crate::diagnostics`].
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FphotError>;

#[derive(Error, Debug)]
pub enum FphotError {
    /// A required parameter was never supplied or is out of range.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A timestamp source matched none of the known shapes.
    #[error("unrecognized timestamp format in '{source_name}': {detail}")]
    UnrecognizedFormat { source_name: String, detail: String },

    /// More than one source resolved to the same canonical clock.
    #[error("multiple {kind} sources supplied ('{first}' and '{second}') but only one expected")]
    AmbiguousClock {
        kind: &'static str,
        first: String,
        second: String,
    },

    /// An exact one-to-one frame merge found a repeated frame counter.
    #[error("frame counter {frame} appears more than once in '{source_name}'")]
    DuplicateFrameKey { source_name: String, frame: i64 },

    /// A nearest-time join key is not finite and strictly increasing.
    #[error("join key '{key}' in {table} is not strictly increasing at row {row}")]
    UnsortedKey {
        table: String,
        key: &'static str,
        row: usize,
    },

    /// A required column is absent from an input table.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// A cell could not be parsed.
    #[error("cannot parse '{value}' in column '{column}' (line {line})")]
    Parse {
        column: String,
        value: String,
        line: usize,
    },

    /// Event pooling requires at least one aligned event.
    #[error("no events in table; align event timestamps first")]
    NoEvents,

    /// Two arrays that must agree in length do not.
    #[error("length mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A spreadsheet could not be opened or read.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FphotError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unrecognized(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnrecognizedFormat {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }
}
