//! The run handle: indexes built at open, records parsed on first access.

use std::{
    ops::RangeBounds,
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use stagdex_format::{Encoding, Field, Geometry, RadialProfile, SnapshotHeader, TimeRow};
use tracing::{debug, info, warn};

use crate::{
    cache::LazyCache,
    discover::{self, RunFiles},
    error::{ArchiveError, RecordKind, Result},
    index::{RprofIndex, Selector, SnapshotIndex, StepIndex},
    params::RunParams,
    scale::{ScaleOptions, Scales},
    source::{FileSource, RecordSource},
    walk::{SnapshotWalk, Walk},
};

/// One recorded instant: its time-series row and, if any, its snapshot id.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Step number
    pub istep: u32,
    /// Snapshot taken at this step
    pub isnap: Option<u32>,
    /// Time-series row
    pub timeinfo: TimeRow,
}

impl StepRecord {
    /// Time-series value of column `name`
    pub fn value(&self, name: &str) -> Option<f64> {
        self.timeinfo.get(name)
    }

    /// Dimensionless time, from column `t`
    pub fn time(&self) -> Option<f64> {
        self.value("t")
    }
}

/// Spatial fields of one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    /// Snapshot number
    pub isnap: u32,
    /// Step the snapshot was taken at
    pub istep: u32,
    /// Dimensionless time
    pub time: f64,
    /// Grid shape
    pub geometry: Geometry,
    /// Fields in file order
    pub fields: Vec<Field>,
}

impl SnapshotRecord {
    /// Field called `name`
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in file order
    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Number of parsed records held by a [`Run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Time-series rows
    pub steps: usize,
    /// Snapshots
    pub snapshots: usize,
    /// Radial-profile blocks
    pub rprofs: usize,
}

/// How to open a run directory.
///
/// ```no_run
/// use stagdex_archive::OpenOptions;
///
/// let run = OpenOptions::new().stem("test").strict_geometry(true).open("output")?;
/// # Ok::<(), stagdex_archive::ArchiveError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    strict_geometry: bool,
    encoding: Encoding,
    stem: Option<String>,
    params: Option<RunParams>,
    scale: ScaleOptions,
}

impl OpenOptions {
    /// Default options: lenient geometry, little-endian f64, stem from `par.toml`
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail snapshot access when a grid differs from the first snapshot's
    pub fn strict_geometry(&mut self, strict: bool) -> &mut Self {
        self.strict_geometry = strict;
        self
    }

    /// Encoding assumed by files whose flags leave it unspecified
    pub fn encoding(&mut self, encoding: Encoding) -> &mut Self {
        self.encoding = encoding;
        self
    }

    /// Output file prefix, overriding `par.toml`
    pub fn stem(&mut self, stem: impl Into<String>) -> &mut Self {
        self.stem = Some(stem.into());
        self
    }

    /// Use these parameters instead of reading `par.toml`
    pub fn params(&mut self, params: RunParams) -> &mut Self {
        self.params = Some(params);
        self
    }

    /// Presentation of scaled values
    pub fn scale_options(&mut self, opts: ScaleOptions) -> &mut Self {
        self.scale = opts;
        self
    }

    /// Open `dir`, reading records from disk.
    pub fn open(&self, dir: impl AsRef<Path>) -> Result<Run> {
        self.open_with_source(dir, FileSource::new(self.encoding))
    }

    /// Open `dir`, reading records through `source`.
    ///
    /// Indexes the time series, radial profiles and snapshot headers. No
    /// record body is parsed.
    pub fn open_with_source<S: RecordSource>(
        &self,
        dir: impl AsRef<Path>,
        source: S,
    ) -> Result<Run<S>> {
        let root = dir.as_ref().to_path_buf();
        let params = match &self.params {
            Some(p) => p.clone(),
            None => RunParams::load(&root)?,
        };
        let stem = self
            .stem
            .clone()
            .unwrap_or_else(|| params.output.stem.clone());

        let RunFiles {
            time,
            rprof,
            snapshots,
        } = discover::discover(&root, &stem)?;

        // A header cut short means the run has not written anything yet.
        let steps = match time {
            Some(path) => match source.scan_time_series(&path) {
                Ok(scan) => StepIndex::from_scan(path, scan),
                Err(e) if e.is_truncated() => {
                    warn!(path = %path.display(), error = %e, "time series header incomplete");
                    StepIndex::empty(path)
                }
                Err(e) => return Err(ArchiveError::from_format(RecordKind::Step, 0, e)),
            },
            None => StepIndex::empty(discover::time_path(&root, &stem)),
        };

        let rprofs = match rprof {
            Some(path) => match source.scan_rprof(&path) {
                Ok(scan) => Some(RprofIndex::from_scan(path, scan)),
                Err(e) if e.is_truncated() => {
                    warn!(path = %path.display(), error = %e, "skipping incomplete radial profiles");
                    None
                }
                Err(e) => return Err(ArchiveError::from_format(RecordKind::Rprof, 0, e)),
            },
            None => None,
        };

        let headers: Vec<(PathBuf, SnapshotHeader)> = snapshots
            .par_iter()
            .filter_map(|(n, path)| match source.read_snapshot_header(path) {
                Ok(h) => Some((path.clone(), h)),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        file_number = n,
                        error = %e,
                        "skipping unreadable snapshot"
                    );
                    None
                }
            })
            .collect();
        let geometries: FxHashMap<u32, Geometry> = headers
            .iter()
            .map(|(_, h)| (h.isnap, h.geometry))
            .rev()
            .collect();
        let snaps = SnapshotIndex::from_headers(root.clone(), headers);
        let reference = snaps
            .ordered_snapshots()
            .first()
            .and_then(|isnap| geometries.get(isnap).copied());

        info!(
            path = %root.display(),
            stem = %stem,
            steps = steps.len(),
            snapshots = snaps.len(),
            rprof = rprofs.is_some(),
            "opened run"
        );

        Ok(Run {
            root,
            stem,
            scales: Scales::new(&params, self.scale),
            params,
            strict_geometry: self.strict_geometry,
            steps,
            snaps,
            rprofs,
            geometries,
            reference,
            source,
            step_cache: LazyCache::default(),
            snap_cache: LazyCache::default(),
            rprof_cache: LazyCache::default(),
        })
    }
}

/// Handle on one run directory.
///
/// Cheap to share between threads: indexes are immutable and each record
/// is parsed at most once, whichever thread asks first.
pub struct Run<S = FileSource> {
    root: PathBuf,
    stem: String,
    params: RunParams,
    scales: Scales,
    strict_geometry: bool,
    steps: StepIndex,
    snaps: SnapshotIndex,
    rprofs: Option<RprofIndex>,
    geometries: FxHashMap<u32, Geometry>,
    reference: Option<Geometry>,
    source: S,
    step_cache: LazyCache<StepRecord>,
    snap_cache: LazyCache<SnapshotRecord>,
    rprof_cache: LazyCache<RadialProfile>,
}

impl Run<FileSource> {
    /// Open `dir` with default options.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new().open(dir)
    }
}

impl<S: RecordSource> Run<S> {
    fn ensure_nonempty(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(ArchiveError::EmptyArchive {
                path: self.root.clone(),
            });
        }
        Ok(())
    }

    /// Step named by `sel`, parsed on first access.
    pub fn step(&self, sel: Selector) -> Result<Arc<StepRecord>> {
        self.ensure_nonempty()?;
        let istep = self.steps.resolve(sel)?;
        self.load_step(istep)
    }

    /// Snapshot named by `sel`, parsed on first access.
    pub fn snapshot(&self, sel: Selector) -> Result<Arc<SnapshotRecord>> {
        self.ensure_nonempty()?;
        let isnap = self.snaps.resolve(sel)?;
        self.load_snapshot(isnap)
    }

    /// Radial profiles of the step named by `sel`, parsed on first access.
    pub fn rprof(&self, sel: Selector) -> Result<Arc<RadialProfile>> {
        self.ensure_nonempty()?;
        let index = match &self.rprofs {
            Some(index) => index,
            None => {
                let path = discover::rprof_path(&self.root, &self.stem);
                return Err(match sel {
                    Selector::Absolute(id) => ArchiveError::IndexNotFound {
                        kind: RecordKind::Rprof,
                        id,
                        path,
                    },
                    Selector::FromEnd(offset) => ArchiveError::SelectorOutOfRange {
                        kind: RecordKind::Rprof,
                        offset,
                        len: 0,
                        path,
                    },
                });
            }
        };
        let istep = index.resolve(sel)?;
        self.rprof_cache.get_or_try_fill(istep, || {
            let offset = index.offset(istep).ok_or_else(|| ArchiveError::IndexNotFound {
                kind: RecordKind::Rprof,
                id: istep,
                path: index.path().to_path_buf(),
            })?;
            let profile = self
                .source
                .read_rprof(index.path(), index.header(), offset)
                .map_err(|e| ArchiveError::from_format(RecordKind::Rprof, istep, e))?;
            if profile.istep != istep {
                return Err(ArchiveError::CorruptRecord {
                    kind: RecordKind::Rprof,
                    id: istep,
                    path: index.path().to_path_buf(),
                    detail: format!("block at offset {offset} holds step {}", profile.istep),
                });
            }
            debug!(istep, offset, "parsed radial profiles");
            Ok(profile)
        })
    }

    /// Last known step
    pub fn last_step(&self) -> Result<Arc<StepRecord>> {
        self.step(Selector::LAST)
    }

    /// Last known snapshot
    pub fn last_snapshot(&self) -> Result<Arc<SnapshotRecord>> {
        self.snapshot(Selector::LAST)
    }

    /// Every known step in ascending order.
    ///
    /// The step list is fixed when the walk is created. Rows are parsed as
    /// the walk reaches them and shared with [`Run::step`].
    pub fn walk(&self) -> Result<Walk<'_, S>> {
        self.ensure_nonempty()?;
        Ok(Walk::new(self, self.steps.ordered_steps().to_vec()))
    }

    /// Known steps within `range`, ascending
    pub fn walk_range(&self, range: impl RangeBounds<u32>) -> Result<Walk<'_, S>> {
        self.ensure_nonempty()?;
        let ids = self
            .steps
            .ordered_steps()
            .iter()
            .copied()
            .filter(|istep| range.contains(istep))
            .collect();
        Ok(Walk::new(self, ids))
    }

    /// Every known snapshot in ascending order
    pub fn walk_snapshots(&self) -> Result<SnapshotWalk<'_, S>> {
        self.ensure_nonempty()?;
        Ok(SnapshotWalk::new(
            self,
            self.snaps.ordered_snapshots().to_vec(),
        ))
    }

    /// Snapshot taken at `istep`, if any
    pub fn snapshot_of_step(&self, istep: u32) -> Option<u32> {
        self.snaps.snapshot_of(istep)
    }

    /// Grid of the last snapshot, from its header
    pub fn geometry(&self) -> Result<Geometry> {
        self.ensure_nonempty()?;
        let isnap = self.snaps.resolve(Selector::LAST)?;
        self.geometries
            .get(&isnap)
            .copied()
            .ok_or_else(|| ArchiveError::IndexNotFound {
                kind: RecordKind::Snapshot,
                id: isnap,
                path: self.root.clone(),
            })
    }

    /// Scale a dimensionless value; see [`Scales::scale`]
    pub fn scale(&self, value: f64, dim: &str) -> Result<(f64, String)> {
        self.scales.scale(value, dim)
    }

    /// Scaling factors of this run
    pub fn scales(&self) -> &Scales {
        &self.scales
    }

    /// Physical parameters of this run
    pub fn params(&self) -> &RunParams {
        &self.params
    }

    /// Step index
    pub fn steps(&self) -> &StepIndex {
        &self.steps
    }

    /// Snapshot index
    pub fn snapshots(&self) -> &SnapshotIndex {
        &self.snaps
    }

    /// Whether a radial-profile file was found
    pub fn has_rprof(&self) -> bool {
        self.rprofs.is_some()
    }

    /// Run directory
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Output file prefix
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Record source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// How many records have been parsed so far
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            steps: self.step_cache.len(),
            snapshots: self.snap_cache.len(),
            rprofs: self.rprof_cache.len(),
        }
    }

    pub(crate) fn load_step(&self, istep: u32) -> Result<Arc<StepRecord>> {
        self.step_cache.get_or_try_fill(istep, || {
            let path = self.steps.path();
            let not_found = || ArchiveError::IndexNotFound {
                kind: RecordKind::Step,
                id: istep,
                path: path.to_path_buf(),
            };
            let header = self.steps.header().ok_or_else(not_found)?;
            let offset = self.steps.offset(istep).ok_or_else(not_found)?;
            let row = self
                .source
                .read_time_row(path, header, offset)
                .map_err(|e| ArchiveError::from_format(RecordKind::Step, istep, e))?;
            if row.istep != istep {
                return Err(ArchiveError::CorruptRecord {
                    kind: RecordKind::Step,
                    id: istep,
                    path: path.to_path_buf(),
                    detail: format!("row at offset {offset} holds step {}", row.istep),
                });
            }
            debug!(istep, offset, "parsed time-series row");
            Ok(StepRecord {
                istep,
                isnap: self.snaps.snapshot_of(istep),
                timeinfo: row,
            })
        })
    }

    pub(crate) fn load_snapshot(&self, isnap: u32) -> Result<Arc<SnapshotRecord>> {
        self.snap_cache.get_or_try_fill(isnap, || {
            let path = self
                .snaps
                .path_of(isnap)
                .ok_or_else(|| ArchiveError::IndexNotFound {
                    kind: RecordKind::Snapshot,
                    id: isnap,
                    path: self.root.clone(),
                })?;
            let snap = self
                .source
                .read_snapshot(path)
                .map_err(|e| ArchiveError::from_format(RecordKind::Snapshot, isnap, e))?;
            let header = snap.header;
            if header.isnap != isnap {
                return Err(ArchiveError::CorruptRecord {
                    kind: RecordKind::Snapshot,
                    id: isnap,
                    path: path.to_path_buf(),
                    detail: format!("file now holds snapshot {}", header.isnap),
                });
            }
            self.check_geometry(isnap, path, header.geometry)?;
            debug!(
                isnap,
                istep = header.istep,
                fields = snap.fields.len(),
                "parsed snapshot"
            );
            Ok(SnapshotRecord {
                isnap,
                istep: header.istep,
                time: header.time,
                geometry: header.geometry,
                fields: snap.fields,
            })
        })
    }

    fn check_geometry(&self, isnap: u32, path: &Path, found: Geometry) -> Result<()> {
        let expected = match self.reference {
            Some(g) if g != found => g,
            _ => return Ok(()),
        };
        if self.strict_geometry {
            return Err(ArchiveError::GeometryMismatch {
                isnap,
                path: path.to_path_buf(),
                expected,
                found,
            });
        }
        warn!(
            isnap,
            path = %path.display(),
            expected = ?expected,
            found = ?found,
            "snapshot grid differs from the first snapshot"
        );
        Ok(())
    }
}
