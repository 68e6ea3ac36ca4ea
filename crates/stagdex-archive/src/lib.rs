//! Lazy, indexed access to a simulation run directory
//!
//! [`Run`] discovers the time series, radial profiles and snapshots written
//! by a run, indexes them without reading record bodies, and parses each
//! step or snapshot at most once on first access.
//!
//! ```no_run
//! use stagdex_archive::{Run, Selector};
//!
//! let run = Run::open("output")?;
//! let last = run.last_snapshot()?;
//! println!("snapshot {} at step {}", last.isnap, last.istep);
//! for step in run.walk()? {
//!     let step = step?;
//!     println!("{} {:?}", step.istep, step.time());
//! }
//! let _ = run.step(Selector::from_end(2))?;
//! # Ok::<(), stagdex_archive::ArchiveError>(())
//! ```

#![warn(missing_docs)]

pub mod archive;
mod cache;
pub mod catalogue;
pub mod discover;
pub mod error;
pub mod index;
pub mod params;
pub mod scale;
pub mod source;
pub mod walk;

pub use archive::{CacheStats, OpenOptions, Run, SnapshotRecord, StepRecord};
pub use catalogue::{BuiltinCatalogue, Catalogue, Section, VarMeta};
pub use error::{ArchiveError, RecordKind, Result};
pub use index::{ParseSelectorError, Selector, SnapshotIndex, StepIndex};
pub use params::RunParams;
pub use scale::{ScaleOptions, Scales};
pub use source::{FileSource, RecordSource};
pub use walk::{SnapshotWalk, Walk};

pub use stagdex_format::{
    ByteOrder, CoordSystem, Dimensionality, Encoding, Field, Geometry, Precision, RadialProfile,
    TimeRow,
};
