//! Ordered traversal over steps and snapshots.

use std::{iter::FusedIterator, sync::Arc};

use crate::{
    archive::{Run, SnapshotRecord, StepRecord},
    error::Result,
    source::{FileSource, RecordSource},
};

/// Lazy iterator over steps in ascending istep order.
///
/// Each item is parsed when reached, through the run's cache. A failed step
/// yields its error and the walk moves on.
pub struct Walk<'r, S = FileSource> {
    run: &'r Run<S>,
    ids: Vec<u32>,
    pos: usize,
}

impl<'r, S: RecordSource> Walk<'r, S> {
    pub(crate) fn new(run: &'r Run<S>, ids: Vec<u32>) -> Self {
        Self { run, ids, pos: 0 }
    }

    /// Steps this walk covers
    pub fn steps(&self) -> &[u32] {
        &self.ids
    }

    /// Start over from the first step
    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl<S: RecordSource> Iterator for Walk<'_, S> {
    type Item = Result<Arc<StepRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        let istep = *self.ids.get(self.pos)?;
        self.pos += 1;
        Some(self.run.load_step(istep))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.ids.len() - self.pos;
        (n, Some(n))
    }
}

impl<S: RecordSource> ExactSizeIterator for Walk<'_, S> {}
impl<S: RecordSource> FusedIterator for Walk<'_, S> {}

/// Lazy iterator over snapshots in ascending isnap order
pub struct SnapshotWalk<'r, S = FileSource> {
    run: &'r Run<S>,
    ids: Vec<u32>,
    pos: usize,
}

impl<'r, S: RecordSource> SnapshotWalk<'r, S> {
    pub(crate) fn new(run: &'r Run<S>, ids: Vec<u32>) -> Self {
        Self { run, ids, pos: 0 }
    }

    /// Snapshots this walk covers
    pub fn snapshots(&self) -> &[u32] {
        &self.ids
    }

    /// Start over from the first snapshot
    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl<S: RecordSource> Iterator for SnapshotWalk<'_, S> {
    type Item = Result<Arc<SnapshotRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        let isnap = *self.ids.get(self.pos)?;
        self.pos += 1;
        Some(self.run.load_snapshot(isnap))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.ids.len() - self.pos;
        (n, Some(n))
    }
}

impl<S: RecordSource> ExactSizeIterator for SnapshotWalk<'_, S> {}
impl<S: RecordSource> FusedIterator for SnapshotWalk<'_, S> {}
