use super::version_tracker::{ChangeTracker, ModificationTime, MutGuard};

/// How surfaces are rasterized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Representation {
    Points,
    Wireframe,
    #[default]
    Surface,
}

/// Surface appearance values of a [`Property`].
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValues {
    pub ambient_color: [f32; 3],
    pub diffuse_color: [f32; 3],
    pub specular_color: [f32; 3],
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub specular_power: f32,
    pub opacity: f32,
    pub representation: Representation,
}

impl Default for PropertyValues {
    fn default() -> Self {
        Self {
            ambient_color: [1.0; 3],
            diffuse_color: [1.0; 3],
            specular_color: [1.0; 3],
            ambient: 0.0,
            diffuse: 1.0,
            specular: 0.0,
            specular_power: 1.0,
            opacity: 1.0,
            representation: Representation::Surface,
        }
    }
}

/// Lighting and representation settings of an actor.
///
/// ```rust,ignore
/// actor.property_mut().edit().representation = Representation::Wireframe;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Property {
    values: PropertyValues,
    tracker: ChangeTracker,
}

impl Property {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn values(&self) -> &PropertyValues {
        &self.values
    }

    /// Mutable access; the property is stamped when the guard drops.
    pub fn edit(&mut self) -> MutGuard<'_, PropertyValues> {
        MutGuard::new(&mut self.values, &self.tracker)
    }

    #[must_use]
    pub fn representation(&self) -> Representation {
        self.values.representation
    }

    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        self.tracker.last_modified()
    }
}
