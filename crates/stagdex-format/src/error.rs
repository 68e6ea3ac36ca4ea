//! Error types for record parsing and writing.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Record format error types
#[derive(Error, Debug)]
pub enum FormatError {
    /// IO error while opening or reading a record file
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Record failed structural validation
    #[error("corrupt record in {}: {detail}", path.display())]
    Corrupt {
        /// File being read
        path: PathBuf,
        /// What was wrong
        detail: String,
    },

    /// File ends inside a record; the writer may still be appending to it
    #[error("truncated record in {}: {detail}", path.display())]
    Truncated {
        /// File being read
        path: PathBuf,
        /// What was cut short
        detail: String,
    },
}

impl FormatError {
    /// True when the error is a validation failure rather than an IO problem.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            FormatError::Corrupt { .. } | FormatError::Truncated { .. }
        )
    }

    /// True when the file ends early rather than holding bad bytes.
    pub fn is_truncated(&self) -> bool {
        matches!(self, FormatError::Truncated { .. })
    }
}

/// Result type alias for record operations
pub type Result<T> = std::result::Result<T, FormatError>;

/// Path-less failure raised while decoding from a byte stream.
///
/// Parsers work on any `Read`, so they do not know the file name; the public
/// entry points attach it with [`Fault::at`].
#[derive(Debug)]
pub(crate) enum Fault {
    Io(io::Error),
    Corrupt(String),
    Truncated(String),
}

impl Fault {
    pub(crate) fn corrupt(detail: impl Into<String>) -> Self {
        Fault::Corrupt(detail.into())
    }

    pub(crate) fn at(self, path: impl Into<PathBuf>) -> FormatError {
        match self {
            Fault::Io(source) => FormatError::Io {
                path: path.into(),
                source,
            },
            Fault::Corrupt(detail) => FormatError::Corrupt {
                path: path.into(),
                detail,
            },
            Fault::Truncated(detail) => FormatError::Truncated {
                path: path.into(),
                detail,
            },
        }
    }
}

impl From<io::Error> for Fault {
    fn from(e: io::Error) -> Self {
        // A short read means the writer stopped mid-record.
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Fault::Truncated(e.to_string())
        } else {
            Fault::Io(e)
        }
    }
}

pub(crate) type FaultResult<T> = std::result::Result<T, Fault>;
