use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::version_tracker::{ChangeTracker, ModificationTime};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Whether the pixel buffer matches the declared dimensions.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == self.width as usize * self.height as usize * 4
    }
}

/// Image slot of a [`Texture`].
#[derive(Debug, Clone, Default)]
pub enum TextureImage {
    #[default]
    Empty,
    /// Data is still being fetched or decoded.
    Loading,
    Loaded(Arc<ImageData>),
}

#[derive(Debug)]
struct TextureInner {
    id: u64,
    image: RwLock<TextureImage>,
    interpolate: AtomicBool,
    tracker: ChangeTracker,
}

/// CPU-side texture source. Cloning shares the same texture.
#[derive(Debug, Clone)]
pub struct Texture(Arc<TextureInner>);

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Texture {}

impl Default for Texture {
    fn default() -> Self {
        Self::new()
    }
}

impl Texture {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(TextureInner {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            image: RwLock::new(TextureImage::Empty),
            interpolate: AtomicBool::new(true),
            tracker: ChangeTracker::new(),
        }))
    }

    #[must_use]
    pub fn from_image(image: ImageData) -> Self {
        let texture = Self::new();
        texture.set_image(image);
        texture
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

    #[must_use]
    pub fn image(&self) -> TextureImage {
        self.0.image.read().clone()
    }

    /// True once an image is attached, loaded or not.
    #[must_use]
    pub fn has_image(&self) -> bool {
        !matches!(*self.0.image.read(), TextureImage::Empty)
    }

    pub fn set_image(&self, image: ImageData) {
        *self.0.image.write() = TextureImage::Loaded(Arc::new(image));
        self.0.tracker.modified();
    }

    pub fn set_loading(&self) {
        *self.0.image.write() = TextureImage::Loading;
        self.0.tracker.modified();
    }

    #[must_use]
    pub fn interpolate(&self) -> bool {
        self.0.interpolate.load(Ordering::Relaxed)
    }

    pub fn set_interpolate(&self, interpolate: bool) {
        self.0.interpolate.store(interpolate, Ordering::Relaxed);
        self.0.tracker.modified();
    }
}
