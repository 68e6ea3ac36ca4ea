//! Where [`Run`](crate::Run) gets its bytes from.
//!
//! The default [`FileSource`] forwards to the pure readers of
//! `stagdex-format`. Tests and embedders can wrap it to observe or redirect
//! parsing.

use std::path::Path;

use stagdex_format::{
    Encoding, RadialProfile, RprofHeader, RprofScan, Snapshot, SnapshotHeader, TimeHeader,
    TimeRow, TimeScan, reader,
};

/// Record parsing backend. Implementations must be stateless with respect to
/// record content; the archive does all caching.
pub trait RecordSource: Send + Sync {
    /// Index the time-series file
    fn scan_time_series(&self, path: &Path) -> stagdex_format::Result<TimeScan>;
    /// Parse one time-series row
    fn read_time_row(
        &self,
        path: &Path,
        header: &TimeHeader,
        offset: u64,
    ) -> stagdex_format::Result<TimeRow>;
    /// Index the radial-profile file
    fn scan_rprof(&self, path: &Path) -> stagdex_format::Result<RprofScan>;
    /// Parse one radial-profile block
    fn read_rprof(
        &self,
        path: &Path,
        header: &RprofHeader,
        offset: u64,
    ) -> stagdex_format::Result<RadialProfile>;
    /// Read a snapshot header only
    fn read_snapshot_header(&self, path: &Path) -> stagdex_format::Result<SnapshotHeader>;
    /// Parse a whole snapshot
    fn read_snapshot(&self, path: &Path) -> stagdex_format::Result<Snapshot>;
}

/// Reads records straight from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource {
    defaults: Encoding,
}

impl FileSource {
    /// Source using `defaults` for files that leave their encoding unspecified
    pub fn new(defaults: Encoding) -> Self {
        Self { defaults }
    }
}

impl RecordSource for FileSource {
    fn scan_time_series(&self, path: &Path) -> stagdex_format::Result<TimeScan> {
        reader::scan_time_series(path, self.defaults)
    }

    fn read_time_row(
        &self,
        path: &Path,
        header: &TimeHeader,
        offset: u64,
    ) -> stagdex_format::Result<TimeRow> {
        reader::read_time_row(path, header, offset)
    }

    fn scan_rprof(&self, path: &Path) -> stagdex_format::Result<RprofScan> {
        reader::scan_rprof(path, self.defaults)
    }

    fn read_rprof(
        &self,
        path: &Path,
        header: &RprofHeader,
        offset: u64,
    ) -> stagdex_format::Result<RadialProfile> {
        reader::read_rprof(path, header, offset)
    }

    fn read_snapshot_header(&self, path: &Path) -> stagdex_format::Result<SnapshotHeader> {
        reader::read_snapshot_header(path, self.defaults)
    }

    fn read_snapshot(&self, path: &Path) -> stagdex_format::Result<Snapshot> {
        reader::read_snapshot(path, self.defaults)
    }
}
