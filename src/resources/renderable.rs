use super::color_mapping::ColorMapping;
use super::polydata::PolyData;
use super::version_tracker::{ChangeTracker, ModificationTime, MutGuard};

/// The mapper's input: geometry plus how scalars are colored.
#[derive(Debug, Clone, Default)]
pub struct Renderable {
    input: PolyData,
    is_static: bool,
    color_mapping: ColorMapping,
    tracker: ChangeTracker,
}

impl Renderable {
    #[must_use]
    pub fn new(input: PolyData) -> Self {
        Self {
            input,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn input(&self) -> &PolyData {
        &self.input
    }

    /// Mutable geometry access; the renderable is stamped when the guard drops.
    pub fn input_mut(&mut self) -> MutGuard<'_, PolyData> {
        MutGuard::new(&mut self.input, &self.tracker)
    }

    /// A static renderable promises its input only changes through this API,
    /// which lets the mapper skip rebuilding vertex input when nothing is newer.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn set_static(&mut self, is_static: bool) {
        self.is_static = is_static;
        self.tracker.modified();
    }

    #[must_use]
    pub fn color_mapping(&self) -> &ColorMapping {
        &self.color_mapping
    }

    pub fn color_mapping_mut(&mut self) -> &mut ColorMapping {
        &mut self.color_mapping
    }

    /// Runs scalar mapping against the current input.
    pub fn map_scalars(&mut self, alpha: f64) {
        self.color_mapping.map_scalars(&self.input, alpha);
    }

    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        self.tracker
            .last_modified()
            .max(self.input.last_modified())
            .max(self.color_mapping.last_modified())
    }
}
