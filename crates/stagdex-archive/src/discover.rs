//! Directory scan for the files of one run.
//!
//! Naming: `<stem>_time.dat`, `<stem>_rprof.dat` and
//! `<stem>_snapNNNNN.dat[.zst]`. The number in a snapshot file name only
//! orders the scan; the snapshot's identity comes from its header.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::{ArchiveError, Result};

/// Files found for one run
#[derive(Debug, Clone, Default)]
pub struct RunFiles {
    /// Time-series file, if written yet
    pub time: Option<PathBuf>,
    /// Radial-profile file, if written yet
    pub rprof: Option<PathBuf>,
    /// Snapshot files with their file number, sorted by that number
    pub snapshots: Vec<(u32, PathBuf)>,
}

/// Path of the time-series file for `stem`
pub fn time_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}_time.dat"))
}

/// Path of the radial-profile file for `stem`
pub fn rprof_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}_rprof.dat"))
}

/// Path of snapshot file number `n` for `stem`
pub fn snapshot_path(dir: &Path, stem: &str, n: u32) -> PathBuf {
    dir.join(format!("{stem}_snap{n:05}.dat"))
}

pub(crate) fn is_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Scan `dir` for the files of run `stem`.
pub fn discover(dir: &Path, stem: &str) -> Result<RunFiles> {
    let entries = fs::read_dir(dir).map_err(|source| ArchiveError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = RunFiles::default();
    for entry in entries {
        let entry = entry.map_err(|source| ArchiveError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if !is_file(&path) {
            continue;
        }

        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };

        if let Some(n) = parse_snapshot_filename(filename, stem) {
            files.snapshots.push((n, path));
        } else if filename == format!("{stem}_time.dat") {
            files.time = Some(path);
        } else if filename == format!("{stem}_rprof.dat") {
            files.rprof = Some(path);
        }
    }

    files.snapshots.sort_by_key(|(n, _)| *n);
    debug!(
        dir = %dir.display(),
        stem,
        time = files.time.is_some(),
        rprof = files.rprof.is_some(),
        snapshots = files.snapshots.len(),
        "discovered run files"
    );
    Ok(files)
}

fn parse_snapshot_filename(filename: &str, stem: &str) -> Option<u32> {
    let rest = filename.strip_prefix(stem)?.strip_prefix("_snap")?;
    let number_part = rest
        .strip_suffix(".dat.zst")
        .or_else(|| rest.strip_suffix(".dat"))?;
    if number_part.is_empty() || !number_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    number_part.parse::<u32>().ok()
}
