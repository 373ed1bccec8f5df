//! Modification clock and change tracking.
//!
//! Every stateful entity stamps itself with a value drawn from a single
//! process-wide counter whenever its public state changes. Comparing stamps
//! is therefore meaningful across entities: a uniform block sent at time `T`
//! is stale as soon as any dependency reports a stamp greater than `T`.

use std::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// A point on the process-wide modification clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModificationTime(u64);

impl ModificationTime {
    /// Earlier than every stamp handed out by [`tick`](Self::tick).
    pub const NEVER: Self = Self(0);

    /// Advances the clock and returns the new value.
    #[must_use]
    pub fn tick() -> Self {
        Self(CLOCK.fetch_add(1, Ordering::Relaxed) + 1)
    }

    #[inline]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Stamp holder embedded in every mutable entity.
///
/// Uses interior mutability so entities shared through `Arc` can stamp
/// themselves from `&self`.
#[derive(Debug)]
pub struct ChangeTracker {
    mtime: AtomicU64,
}

impl ChangeTracker {
    /// Creates a tracker stamped with a fresh clock value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mtime: AtomicU64::new(ModificationTime::tick().get()),
        }
    }

    /// Marks as modified and returns the new stamp.
    pub fn modified(&self) -> ModificationTime {
        let now = ModificationTime::tick();
        self.mtime.fetch_max(now.get(), Ordering::Relaxed);
        now
    }

    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        ModificationTime(self.mtime.load(Ordering::Relaxed))
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ChangeTracker {
    fn clone(&self) -> Self {
        Self {
            mtime: AtomicU64::new(self.mtime.load(Ordering::Relaxed)),
        }
    }
}

/// Mutable guard - stamps the tracker when the scope ends
pub struct MutGuard<'a, T> {
    data: &'a mut T,
    tracker: &'a ChangeTracker,
}

impl<'a, T> MutGuard<'a, T> {
    pub fn new(data: &'a mut T, tracker: &'a ChangeTracker) -> Self {
        Self { data, tracker }
    }
}

impl<T> std::ops::Deref for MutGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl<T> std::ops::DerefMut for MutGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data
    }
}

impl<T> Drop for MutGuard<'_, T> {
    fn drop(&mut self) {
        self.tracker.modified();
    }
}
