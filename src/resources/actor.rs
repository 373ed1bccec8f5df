use glam::Mat4;

use super::property::Property;
use super::texture::Texture;
use super::version_tracker::{ChangeTracker, ModificationTime};

/// A drawable instance: appearance, attached textures and placement.
#[derive(Debug, Clone, Default)]
pub struct Actor {
    property: Property,
    textures: Vec<Texture>,
    model_matrix: Mat4,
    tracker: ChangeTracker,
}

impl Actor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            model_matrix: Mat4::IDENTITY,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn property(&self) -> &Property {
        &self.property
    }

    pub fn property_mut(&mut self) -> &mut Property {
        &mut self.property
    }

    #[must_use]
    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn add_texture(&mut self, texture: Texture) {
        if !self.textures.contains(&texture) {
            self.textures.push(texture);
            self.tracker.modified();
        }
    }

    pub fn remove_texture(&mut self, texture: &Texture) -> bool {
        let before = self.textures.len();
        self.textures.retain(|t| t != texture);
        let removed = self.textures.len() != before;
        if removed {
            self.tracker.modified();
        }
        removed
    }

    /// Model-to-world transform.
    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        self.model_matrix
    }

    pub fn set_model_matrix(&mut self, matrix: Mat4) {
        self.model_matrix = matrix;
        self.tracker.modified();
    }

    /// Stamp of the actor itself, not including its property.
    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        self.tracker.last_modified()
    }
}
