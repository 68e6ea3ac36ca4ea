//! Sparse step and snapshot indexes.
//!
//! Ids are discovered, never assumed contiguous. Each index keeps its ids in
//! a sorted vector and answers membership with a binary search.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use rustc_hash::FxHashMap;
use stagdex_format::{RprofHeader, RprofScan, SnapshotHeader, TimeHeader, TimeScan};
use thiserror::Error;
use tracing::warn;

use crate::error::{ArchiveError, RecordKind, Result};

/// How a caller names a step or snapshot.
///
/// Relative selectors count from the end of the known sequence:
/// `FromEnd(1)` is the last entry, `FromEnd(2)` the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Exact id
    Absolute(u32),
    /// Distance from the end, 1-based
    FromEnd(usize),
}

impl Selector {
    /// The last known entry
    pub const LAST: Selector = Selector::FromEnd(1);

    /// `n`-th entry from the end (1 is last)
    pub fn from_end(n: usize) -> Self {
        Selector::FromEnd(n)
    }
}

impl From<u32> for Selector {
    fn from(id: u32) -> Self {
        Selector::Absolute(id)
    }
}

/// Python-style signed index: `-1` is last. Ids beyond `u32` are rejected.
impl TryFrom<i64> for Selector {
    type Error = ParseSelectorError;

    fn try_from(v: i64) -> std::result::Result<Self, Self::Error> {
        if v < 0 {
            usize::try_from(v.unsigned_abs())
                .map(Selector::FromEnd)
                .map_err(|_| ParseSelectorError(v.to_string()))
        } else {
            u32::try_from(v)
                .map(Selector::Absolute)
                .map_err(|_| ParseSelectorError(v.to_string()))
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Absolute(id) => write!(f, "{id}"),
            Selector::FromEnd(1) => write!(f, "last"),
            Selector::FromEnd(n) => write!(f, "-{n}"),
        }
    }
}

/// Selector text that is neither `last`, `n` nor `-n`
#[derive(Debug, Error)]
#[error("invalid selector {0:?}: expected `last`, an id, or -N")]
pub struct ParseSelectorError(String);

impl FromStr for Selector {
    type Err = ParseSelectorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("last") {
            return Ok(Selector::LAST);
        }
        let v = s
            .parse::<i64>()
            .map_err(|_| ParseSelectorError(s.to_string()))?;
        Selector::try_from(v)
    }
}

/// Sorted id → value map.
#[derive(Debug, Clone)]
pub(crate) struct SparseIndex<V> {
    ids: Vec<u32>,
    values: Vec<V>,
}

impl<V> Default for SparseIndex<V> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<V> SparseIndex<V> {
    /// Append an id greater than every id already present.
    fn push(&mut self, id: u32, v: V) {
        debug_assert!(self.ids.last().is_none_or(|&last| last < id));
        self.ids.push(id);
        self.values.push(v);
    }

    /// Drop every entry with id >= `id`; returns how many were dropped.
    fn truncate_from(&mut self, id: u32) -> usize {
        let keep = self.ids.partition_point(|&x| x < id);
        let dropped = self.ids.len() - keep;
        self.ids.truncate(keep);
        self.values.truncate(keep);
        dropped
    }

    #[inline]
    fn get(&self, id: u32) -> Option<&V> {
        let i = self.ids.binary_search(&id).ok()?;
        self.values.get(i)
    }

    #[inline]
    fn contains(&self, id: u32) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    #[inline]
    fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    fn ids(&self) -> &[u32] {
        &self.ids
    }

    fn resolve(&self, sel: Selector, kind: RecordKind, path: &Path) -> Result<u32> {
        match sel {
            Selector::Absolute(id) if self.contains(id) => Ok(id),
            Selector::Absolute(id) => Err(ArchiveError::IndexNotFound {
                kind,
                id,
                path: path.to_path_buf(),
            }),
            Selector::FromEnd(k) if k >= 1 && k <= self.ids.len() => {
                Ok(self.ids[self.ids.len() - k])
            }
            Selector::FromEnd(k) => Err(ArchiveError::SelectorOutOfRange {
                kind,
                offset: k,
                len: self.ids.len(),
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Build a sparse index from rows in file order.
///
/// A row whose istep does not exceed the previous one means the simulation
/// restarted from an earlier checkpoint and appended; the newer rows win.
fn index_rows(
    rows: impl IntoIterator<Item = stagdex_format::RowLocation>,
    kind: RecordKind,
    path: &Path,
) -> SparseIndex<u64> {
    let mut index = SparseIndex::default();
    for row in rows {
        if index.ids().last().is_some_and(|&last| last >= row.istep) {
            let dropped = index.truncate_from(row.istep);
            warn!(
                path = %path.display(),
                istep = row.istep,
                dropped,
                "{kind} sequence restarts, keeping newer records"
            );
        }
        index.push(row.istep, row.offset);
    }
    index
}

fn warn_trailing(path: &Path, trailing_bytes: u64, kind: RecordKind) {
    if trailing_bytes > 0 {
        warn!(
            path = %path.display(),
            trailing_bytes,
            "ignoring incomplete trailing {kind} record"
        );
    }
}

/// istep → time-series row
#[derive(Debug, Clone)]
pub struct StepIndex {
    path: PathBuf,
    header: Option<TimeHeader>,
    rows: SparseIndex<u64>,
}

impl StepIndex {
    /// Index with no steps, for a run without a time-series file yet
    pub fn empty(path: PathBuf) -> Self {
        Self {
            path,
            header: None,
            rows: SparseIndex::default(),
        }
    }

    /// Build from a scan of the time-series file
    pub fn from_scan(path: PathBuf, scan: TimeScan) -> Self {
        warn_trailing(&path, scan.trailing_bytes, RecordKind::Step);
        let rows = index_rows(scan.rows, RecordKind::Step, &path);
        Self {
            path,
            header: Some(scan.header),
            rows,
        }
    }

    /// Resolve a selector to a known istep
    pub fn resolve(&self, sel: Selector) -> Result<u32> {
        self.rows.resolve(sel, RecordKind::Step, &self.path)
    }

    /// Known steps, ascending
    pub fn ordered_steps(&self) -> &[u32] {
        self.rows.ids()
    }

    /// Whether `istep` has a row
    pub fn contains(&self, istep: u32) -> bool {
        self.rows.contains(istep)
    }

    /// Byte offset of the row for `istep`
    pub fn offset(&self, istep: u32) -> Option<u64> {
        self.rows.get(istep).copied()
    }

    /// Number of known steps
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no step is known
    pub fn is_empty(&self) -> bool {
        self.rows.len() == 0
    }

    /// Time-series header, if the file exists
    pub fn header(&self) -> Option<&TimeHeader> {
        self.header.as_ref()
    }

    /// Time-series file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// istep → radial-profile block
#[derive(Debug, Clone)]
pub(crate) struct RprofIndex {
    path: PathBuf,
    header: RprofHeader,
    blocks: SparseIndex<u64>,
}

impl RprofIndex {
    pub(crate) fn from_scan(path: PathBuf, scan: RprofScan) -> Self {
        warn_trailing(&path, scan.trailing_bytes, RecordKind::Rprof);
        let blocks = index_rows(scan.blocks, RecordKind::Rprof, &path);
        Self {
            path,
            header: scan.header,
            blocks,
        }
    }

    pub(crate) fn resolve(&self, sel: Selector) -> Result<u32> {
        self.blocks.resolve(sel, RecordKind::Rprof, &self.path)
    }

    pub(crate) fn offset(&self, istep: u32) -> Option<u64> {
        self.blocks.get(istep).copied()
    }

    pub(crate) fn header(&self) -> &RprofHeader {
        &self.header
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone)]
struct SnapEntry {
    istep: u32,
    path: PathBuf,
}

/// isnap → (istep, file)
#[derive(Debug, Clone)]
pub struct SnapshotIndex {
    dir: PathBuf,
    snaps: SparseIndex<SnapEntry>,
    by_step: FxHashMap<u32, u32>,
}

impl SnapshotIndex {
    /// Build from snapshot headers, given in file-number order.
    ///
    /// The isnap and istep of each entry come from its header. A repeated
    /// isnap keeps the first file; a step claimed twice keeps the first
    /// snapshot for the reverse lookup.
    pub fn from_headers(dir: PathBuf, headers: Vec<(PathBuf, SnapshotHeader)>) -> Self {
        let mut entries: Vec<(u32, SnapEntry)> = headers
            .into_iter()
            .map(|(path, h)| {
                (
                    h.isnap,
                    SnapEntry {
                        istep: h.istep,
                        path,
                    },
                )
            })
            .collect();
        // stable: among equal isnaps the first file stays first
        entries.sort_by_key(|(isnap, _)| *isnap);

        let mut snaps = SparseIndex::default();
        let mut by_step = FxHashMap::default();
        for (isnap, entry) in entries {
            if snaps.ids().last() == Some(&isnap) {
                warn!(
                    path = %entry.path.display(),
                    isnap,
                    "duplicate snapshot number, ignoring file"
                );
                continue;
            }
            if let Some(prev) = by_step.get(&entry.istep) {
                warn!(
                    istep = entry.istep,
                    isnap,
                    kept = *prev,
                    "several snapshots claim the same step"
                );
            } else {
                by_step.insert(entry.istep, isnap);
            }
            snaps.push(isnap, entry);
        }
        Self {
            dir,
            snaps,
            by_step,
        }
    }

    /// Resolve a selector to a known isnap
    pub fn resolve(&self, sel: Selector) -> Result<u32> {
        self.snaps.resolve(sel, RecordKind::Snapshot, &self.dir)
    }

    /// Step a snapshot was taken at
    pub fn step_of(&self, isnap: u32) -> Result<u32> {
        self.snaps
            .get(isnap)
            .map(|e| e.istep)
            .ok_or_else(|| ArchiveError::IndexNotFound {
                kind: RecordKind::Snapshot,
                id: isnap,
                path: self.dir.clone(),
            })
    }

    /// Snapshot taken at `istep`, if any
    pub fn snapshot_of(&self, istep: u32) -> Option<u32> {
        self.by_step.get(&istep).copied()
    }

    /// File holding `isnap`
    pub fn path_of(&self, isnap: u32) -> Option<&Path> {
        self.snaps.get(isnap).map(|e| e.path.as_path())
    }

    /// Known snapshots, ascending
    pub fn ordered_snapshots(&self) -> &[u32] {
        self.snaps.ids()
    }

    /// Number of known snapshots
    pub fn len(&self) -> usize {
        self.snaps.len()
    }

    /// True when no snapshot is known
    pub fn is_empty(&self) -> bool {
        self.snaps.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagdex_format::{CoordSystem, Encoding, Geometry, RowLocation};
    use std::sync::Arc;

    fn scan_of(steps: &[u32]) -> TimeScan {
        TimeScan {
            header: TimeHeader {
                encoding: Encoding::default(),
                columns: Arc::from(vec!["t".to_string()]),
                data_offset: 0,
            },
            rows: steps
                .iter()
                .enumerate()
                .map(|(i, &istep)| RowLocation {
                    istep,
                    offset: i as u64 * 12,
                })
                .collect(),
            trailing_bytes: 0,
        }
    }

    fn header(isnap: u32, istep: u32) -> SnapshotHeader {
        SnapshotHeader {
            encoding: Encoding::default(),
            isnap,
            istep,
            time: 0.0,
            geometry: Geometry::new(4, 1, 4, CoordSystem::Cartesian),
            nfields: 0,
        }
    }

    #[test]
    fn relative_selectors_count_from_the_end() {
        let idx = StepIndex::from_scan("time.dat".into(), scan_of(&[0, 1, 2, 5, 9]));
        assert_eq!(idx.resolve(Selector::LAST).unwrap(), 9);
        assert_eq!(idx.resolve(Selector::from_end(2)).unwrap(), 5);
        assert_eq!(idx.resolve(Selector::from_end(5)).unwrap(), 0);
        assert!(matches!(
            idx.resolve(Selector::from_end(6)),
            Err(ArchiveError::SelectorOutOfRange {
                offset: 6,
                len: 5,
                ..
            })
        ));
        assert!(matches!(
            idx.resolve(Selector::FromEnd(0)),
            Err(ArchiveError::SelectorOutOfRange { .. })
        ));
    }

    #[test]
    fn absolute_selectors_must_exist() {
        let idx = StepIndex::from_scan("time.dat".into(), scan_of(&[0, 1, 2, 5, 9]));
        assert_eq!(idx.resolve(Selector::Absolute(5)).unwrap(), 5);
        assert!(matches!(
            idx.resolve(Selector::Absolute(3)),
            Err(ArchiveError::IndexNotFound { id: 3, .. })
        ));
        assert!(idx.contains(9));
        assert!(!idx.contains(4));
        assert_eq!(idx.offset(5), Some(36));
    }

    #[test]
    fn restart_keeps_newer_rows() {
        // run restarted from step 4 after reaching 7
        let idx = StepIndex::from_scan("time.dat".into(), scan_of(&[0, 2, 4, 6, 7, 4, 5, 8]));
        assert_eq!(idx.ordered_steps(), &[0, 2, 4, 5, 8]);
        assert_eq!(idx.offset(4), Some(5 * 12));
    }

    #[test]
    fn snapshot_index_maps_both_ways() {
        let idx = SnapshotIndex::from_headers(
            "run".into(),
            vec![
                ("b".into(), header(1, 9)),
                ("a".into(), header(0, 2)),
                ("dup".into(), header(1, 10)),
            ],
        );
        assert_eq!(idx.ordered_snapshots(), &[0, 1]);
        assert_eq!(idx.step_of(1).unwrap(), 9);
        assert_eq!(idx.snapshot_of(2), Some(0));
        assert_eq!(idx.snapshot_of(0), None);
        assert_eq!(idx.snapshot_of(10), None);
        assert_eq!(idx.path_of(1), Some(Path::new("b")));
        assert!(matches!(
            idx.step_of(4),
            Err(ArchiveError::IndexNotFound { id: 4, .. })
        ));
    }

    #[test]
    fn selectors_parse_from_text() {
        assert_eq!("last".parse::<Selector>().unwrap(), Selector::LAST);
        assert_eq!("-3".parse::<Selector>().unwrap(), Selector::FromEnd(3));
        assert_eq!("12".parse::<Selector>().unwrap(), Selector::Absolute(12));
        assert!("twelve".parse::<Selector>().is_err());
        assert_eq!(Selector::try_from(-1i64).unwrap().to_string(), "last");
        assert!(Selector::try_from(i64::from(u32::MAX) + 1).is_err());
        assert!("4294967296".parse::<Selector>().is_err());
        assert_eq!(
            "4294967295".parse::<Selector>().unwrap(),
            Selector::Absolute(u32::MAX)
        );
    }
}
