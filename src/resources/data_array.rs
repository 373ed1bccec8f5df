use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::version_tracker::{ChangeTracker, ModificationTime};

static NEXT_ARRAY_ID: AtomicU64 = AtomicU64::new(1);

/// Typed storage behind a [`DataArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum DataValues {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Uint8(Vec<u8>),
}

impl DataValues {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Uint8(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at flat index `i`, widened to `f64`.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> f64 {
        match self {
            Self::Float32(v) => f64::from(v[i]),
            Self::Float64(v) => v[i],
            Self::Uint8(v) => f64::from(v[i]),
        }
    }

    #[must_use]
    pub fn is_uint8(&self) -> bool {
        matches!(self, Self::Uint8(_))
    }
}

impl From<Vec<f32>> for DataValues {
    fn from(v: Vec<f32>) -> Self {
        Self::Float32(v)
    }
}

impl From<Vec<f64>> for DataValues {
    fn from(v: Vec<f64>) -> Self {
        Self::Float64(v)
    }
}

impl From<Vec<u8>> for DataValues {
    fn from(v: Vec<u8>) -> Self {
        Self::Uint8(v)
    }
}

/// Numeric tuple data (positions, normals, scalars, texture coordinates).
#[derive(Debug)]
pub struct DataArray {
    id: u64,
    name: String,
    components: usize,
    values: RwLock<DataValues>,
    tracker: ChangeTracker,
}

/// Shared handle to a [`DataArray`]. Equality and hashing use identity.
#[derive(Debug, Clone)]
pub struct ArrayRef(Arc<DataArray>);

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ArrayRef {}

impl std::hash::Hash for ArrayRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl ArrayRef {
    pub fn new(name: &str, components: usize, values: impl Into<DataValues>) -> Self {
        Self(Arc::new(DataArray {
            id: NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            components: components.max(1),
            values: RwLock::new(values.into()),
            tracker: ChangeTracker::new(),
        }))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    #[must_use]
    pub fn components(&self) -> usize {
        self.0.components
    }

    #[must_use]
    pub fn number_of_values(&self) -> usize {
        self.0.values.read().len()
    }

    #[must_use]
    pub fn number_of_tuples(&self) -> usize {
        self.number_of_values() / self.0.components
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.number_of_tuples() == 0
    }

    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        self.0.tracker.last_modified()
    }

    /// Replaces the contents and stamps the array.
    pub fn set_values(&self, values: impl Into<DataValues>) {
        *self.0.values.write() = values.into();
        self.0.tracker.modified();
    }

    pub fn read(&self) -> RwLockReadGuard<'_, DataValues> {
        self.0.values.read()
    }

    /// Min/max of one component, `None` when the array is empty.
    #[must_use]
    pub fn range(&self, component: usize) -> Option<(f64, f64)> {
        let values = self.read();
        let comps = self.0.components;
        if component >= comps {
            return None;
        }
        let mut range: Option<(f64, f64)> = None;
        for i in (component..values.len()).step_by(comps) {
            let v = values.get(i);
            range = Some(match range {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            });
        }
        range
    }
}
