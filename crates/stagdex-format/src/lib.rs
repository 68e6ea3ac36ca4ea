//! On-disk record formats for stagdex
//!
//! Defines the fixed binary layouts written by the simulation (time series,
//! radial profiles, field snapshots) and provides pure read/write APIs for
//! them. Nothing in this crate caches or keeps state between calls.

#![warn(missing_docs)]

pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

pub use error::{FormatError, Result};
pub use format::{
    ByteOrder, CoordSystem, Dimensionality, Encoding, Field, Geometry, Precision, RadialProfile,
    RprofHeader, RprofScan, RowLocation, Snapshot, SnapshotHeader, TimeHeader, TimeRow, TimeScan,
};
pub use reader::{
    parse_snapshot, parse_snapshot_header, read_rprof, read_snapshot, read_snapshot_header,
    read_time_row, scan_rprof, scan_time_series,
};
pub use writer::{RprofWriter, TimeSeriesWriter, write_snapshot};
