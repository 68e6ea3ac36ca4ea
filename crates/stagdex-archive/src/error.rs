//! Errors returned by run queries.

use std::{fmt, io, path::PathBuf};
use thiserror::Error;

use stagdex_format::{FormatError, Geometry};

/// Kind of record an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Time-series row, keyed by istep
    Step,
    /// Field snapshot, keyed by isnap
    Snapshot,
    /// Radial profiles, keyed by istep
    Rprof,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Step => write!(f, "step"),
            RecordKind::Snapshot => write!(f, "snapshot"),
            RecordKind::Rprof => write!(f, "radial profile"),
        }
    }
}

/// Archive error types
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// No step could be discovered in the run directory
    #[error("no steps found in {}", path.display())]
    EmptyArchive {
        /// Run directory
        path: PathBuf,
    },

    /// Absolute id has no entry in its index
    #[error("{kind} {id} not found in {}", path.display())]
    IndexNotFound {
        /// Index searched
        kind: RecordKind,
        /// Requested id
        id: u32,
        /// File or directory backing the index
        path: PathBuf,
    },

    /// Relative selector points before the first known entry
    #[error("{kind} selector -{offset} out of range: {len} known in {}", path.display())]
    SelectorOutOfRange {
        /// Index searched
        kind: RecordKind,
        /// Distance from the end (1 is last)
        offset: usize,
        /// Number of entries in the index
        len: usize,
        /// File or directory backing the index
        path: PathBuf,
    },

    /// Record failed structural validation
    #[error("corrupt {kind} {id} in {}: {detail}", path.display())]
    CorruptRecord {
        /// Record kind
        kind: RecordKind,
        /// Record id
        id: u32,
        /// File holding the record
        path: PathBuf,
        /// What was wrong
        detail: String,
    },

    /// Snapshot grid differs from the first one seen (strict mode)
    #[error(
        "snapshot {isnap} in {} has grid {}x{}x{} {:?}, expected {}x{}x{} {:?}",
        path.display(),
        found.nxtot, found.nytot, found.nztot, found.coords,
        expected.nxtot, expected.nytot, expected.nztot, expected.coords
    )]
    GeometryMismatch {
        /// Offending snapshot
        isnap: u32,
        /// Its file
        path: PathBuf,
        /// Reference geometry
        expected: Geometry,
        /// Geometry read from the file
        found: Geometry,
    },

    /// Unit symbol has no registered conversion
    #[error("unknown dimension {symbol:?}")]
    UnknownDimension {
        /// Symbol as given by the catalogue
        symbol: String,
    },

    /// Run parameter file is malformed
    #[error("invalid run parameters in {}: {detail}", path.display())]
    Params {
        /// Parameter file
        path: PathBuf,
        /// Parser message
        detail: String,
    },

    /// IO error
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// File or directory
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    /// Attach the record identity to a format-level failure.
    pub fn from_format(kind: RecordKind, id: u32, e: FormatError) -> Self {
        match e {
            FormatError::Io { path, source } => ArchiveError::Io { path, source },
            FormatError::Corrupt { path, detail } | FormatError::Truncated { path, detail } => {
                ArchiveError::CorruptRecord {
                    kind,
                    id,
                    path,
                    detail,
                }
            }
        }
    }
}

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;
