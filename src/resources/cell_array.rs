use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::version_tracker::{ChangeTracker, ModificationTime};

static NEXT_CELLS_ID: AtomicU64 = AtomicU64::new(1);

/// Cell connectivity in the legacy `[n, id0 .. id(n-1), n, ...]` layout.
#[derive(Debug)]
pub struct CellArray {
    id: u64,
    connectivity: RwLock<Vec<u32>>,
    tracker: ChangeTracker,
}

/// Shared handle to a [`CellArray`]. Equality uses identity.
#[derive(Debug, Clone)]
pub struct CellArrayRef(Arc<CellArray>);

impl PartialEq for CellArrayRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for CellArrayRef {}

impl Default for CellArrayRef {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl CellArrayRef {
    #[must_use]
    pub fn new(connectivity: Vec<u32>) -> Self {
        Self(Arc::new(CellArray {
            id: NEXT_CELLS_ID.fetch_add(1, Ordering::Relaxed),
            connectivity: RwLock::new(connectivity),
            tracker: ChangeTracker::new(),
        }))
    }

    /// Builds the legacy layout from per-cell point id lists.
    #[must_use]
    pub fn from_cells(cells: &[&[u32]]) -> Self {
        Self::new(encode(cells))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        self.0.tracker.last_modified()
    }

    /// Length of the legacy array (counts included).
    #[must_use]
    pub fn number_of_values(&self) -> usize {
        self.0.connectivity.read().len()
    }

    #[must_use]
    pub fn number_of_cells(&self) -> usize {
        CellIter::new(&self.read()).count()
    }

    pub fn set_cells(&self, cells: &[&[u32]]) {
        self.set_connectivity(encode(cells));
    }

    pub fn set_connectivity(&self, connectivity: Vec<u32>) {
        *self.0.connectivity.write() = connectivity;
        self.0.tracker.modified();
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<u32>> {
        self.0.connectivity.read()
    }
}

fn encode(cells: &[&[u32]]) -> Vec<u32> {
    let mut out = Vec::with_capacity(cells.iter().map(|c| c.len() + 1).sum());
    for cell in cells {
        out.push(cell.len() as u32);
        out.extend_from_slice(cell);
    }
    out
}

/// Iterates the point id lists of a legacy connectivity array.
///
/// Stops at the first truncated cell.
pub struct CellIter<'a> {
    data: &'a [u32],
    pos: usize,
}

impl<'a> CellIter<'a> {
    #[must_use]
    pub fn new(data: &'a [u32]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for CellIter<'a> {
    type Item = &'a [u32];

    fn next(&mut self) -> Option<Self::Item> {
        let count = *self.data.get(self.pos)? as usize;
        let start = self.pos + 1;
        let end = start + count;
        if end > self.data.len() {
            self.pos = self.data.len();
            return None;
        }
        self.pos = end;
        Some(&self.data[start..end])
    }
}
