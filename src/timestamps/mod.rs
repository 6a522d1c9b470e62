//! Timestamp harmonization.
//!
//! - [`classify`]: column coercion and shape classification of raw sources.
//! - [`asof`]: nearest-time joins on strictly increasing keys.
//! - [`align`]: merge rules that put every source on the recording frame index.

pub mod align;
pub mod asof;
pub mod classify;

pub use align::{align_ts, Alignment, EventRecord, TimestampSource};
pub use asof::{merge_nearest, nearest_index};
pub use classify::{
    classify, coerce_column, Classified, Column, ColumnKind, RawGrid, SourceKind, TimestampRecord,
};
