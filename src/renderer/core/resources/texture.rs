//! Device texture cache.
//!
//! Maps CPU [`Texture`] sources to device textures by source identity.
//! Readiness is polled synchronously: a source whose image is still loading
//! reports [`ResourceState::Pending`] and is asked again next frame.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::ResourceState;
use crate::renderer::core::device::{GpuDevice, TextureDesc, TextureId};
use crate::resources::texture::{Texture, TextureImage};
use crate::resources::version_tracker::ModificationTime;

/// An uploaded texture.
#[derive(Debug)]
pub struct DeviceTexture {
    pub id: TextureId,
    pub source_id: u64,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    /// Source stamp the upload was made from.
    pub source_time: ModificationTime,
}

/// Result of [`TextureCache::get_texture`].
#[derive(Debug, Clone)]
pub struct TextureLookup {
    pub state: ResourceState,
    pub texture: Option<Arc<DeviceTexture>>,
}

impl TextureLookup {
    fn pending() -> Self {
        Self {
            state: ResourceState::Pending,
            texture: None,
        }
    }

    fn failed() -> Self {
        Self {
            state: ResourceState::Failed,
            texture: None,
        }
    }

    /// The texture, if it can be bound this frame.
    #[must_use]
    pub fn ready(&self) -> Option<&Arc<DeviceTexture>> {
        match self.state {
            ResourceState::Ready => self.texture.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct TextureEntry {
    texture: Option<Arc<DeviceTexture>>,
    source_time: ModificationTime,
    last_used_frame: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureCacheStats {
    pub created: u64,
    pub failed: u64,
    pub released: u64,
}

#[derive(Debug, Default)]
pub struct TextureCache {
    entries: FxHashMap<u64, TextureEntry>,
    retired: Vec<Arc<DeviceTexture>>,
    stats: TextureCacheStats,
}

impl TextureCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_texture<D: GpuDevice>(
        &mut self,
        device: &mut D,
        source: &Texture,
        frame: u64,
    ) -> TextureLookup {
        let image = match source.image() {
            TextureImage::Empty | TextureImage::Loading => return TextureLookup::pending(),
            TextureImage::Loaded(image) => image,
        };
        let source_time = source.last_modified();

        if let Some(entry) = self.entries.get_mut(&source.id())
            && entry.source_time == source_time
        {
            entry.last_used_frame = frame;
            return match &entry.texture {
                Some(texture) => TextureLookup {
                    state: ResourceState::Ready,
                    texture: Some(Arc::clone(texture)),
                },
                None => TextureLookup::failed(),
            };
        }

        let texture = if image.is_consistent() {
            let desc = TextureDesc {
                label: format!("Texture#{}", source.id()),
                width: image.width,
                height: image.height,
                format: wgpu::TextureFormat::Rgba8Unorm,
            };
            match device.create_texture(&desc, &image.pixels) {
                Ok(id) => Some(Arc::new(DeviceTexture {
                    id,
                    source_id: source.id(),
                    width: image.width,
                    height: image.height,
                    format: desc.format,
                    source_time,
                })),
                Err(e) => {
                    log::warn!("Failed to upload texture #{}: {e}", source.id());
                    None
                }
            }
        } else {
            log::warn!(
                "Texture #{} has {} bytes for {}x{} RGBA8, skipping",
                source.id(),
                image.pixels.len(),
                image.width,
                image.height
            );
            None
        };

        if texture.is_some() {
            self.stats.created += 1;
            log::debug!("Uploaded texture #{} ({}x{})", source.id(), image.width, image.height);
        } else {
            self.stats.failed += 1;
        }

        let previous = self.entries.insert(
            source.id(),
            TextureEntry {
                texture: texture.clone(),
                source_time,
                last_used_frame: frame,
            },
        );
        if let Some(old) = previous.and_then(|e| e.texture) {
            self.retired.push(old);
        }

        match texture {
            Some(texture) => TextureLookup {
                state: ResourceState::Ready,
                texture: Some(texture),
            },
            None => TextureLookup::failed(),
        }
    }

    /// Retires textures unused for `idle_frames` frames and destroys retired
    /// textures nothing references anymore.
    pub fn end_frame<D: GpuDevice>(&mut self, device: &mut D, frame: u64, idle_frames: u64) {
        let retired = &mut self.retired;
        self.entries.retain(|_, entry| {
            if frame.saturating_sub(entry.last_used_frame) < idle_frames.max(1) {
                return true;
            }
            if let Some(texture) = entry.texture.take() {
                retired.push(texture);
            }
            false
        });

        let before = self.retired.len();
        self.retired.retain(|texture| {
            if Arc::strong_count(texture) > 1 {
                return true;
            }
            device.destroy_texture(texture.id);
            false
        });
        let released = (before - self.retired.len()) as u64;
        if released > 0 {
            log::debug!("Released {released} idle textures");
        }
        self.stats.released += released;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> TextureCacheStats {
        self.stats
    }
}

// ─── View Handles ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ViewState {
    texture: TextureId,
    interpolate: bool,
}

/// Shared, re-pointable reference to a device texture view.
///
/// Whoever owns the texture (e.g. a render target that is resized) re-points
/// the handle; consumers notice the change by comparing [`texture`](Self::texture).
#[derive(Debug, Clone)]
pub struct ViewHandle {
    label: Arc<str>,
    state: Arc<RwLock<ViewState>>,
}

impl ViewHandle {
    #[must_use]
    pub fn new(label: &str, texture: TextureId) -> Self {
        Self {
            label: Arc::from(label),
            state: Arc::new(RwLock::new(ViewState {
                texture,
                interpolate: true,
            })),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn texture(&self) -> TextureId {
        self.state.read().texture
    }

    pub fn set_texture(&self, texture: TextureId) {
        self.state.write().texture = texture;
    }

    #[must_use]
    pub fn interpolate(&self) -> bool {
        self.state.read().interpolate
    }

    pub fn set_interpolate(&self, interpolate: bool) {
        self.state.write().interpolate = interpolate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::headless::HeadlessDevice;
    use crate::resources::texture::ImageData;

    #[test]
    fn loading_image_is_pending() {
        let mut device = HeadlessDevice::new();
        let mut cache = TextureCache::new();
        let texture = Texture::new();
        texture.set_loading();
        let lookup = cache.get_texture(&mut device, &texture, 0);
        assert_eq!(lookup.state, ResourceState::Pending);
        assert!(cache.is_empty());
    }

    #[test]
    fn inconsistent_image_fails_without_retrying_each_frame() {
        let mut device = HeadlessDevice::new();
        let mut cache = TextureCache::new();
        let texture = Texture::from_image(ImageData::new(2, 2, vec![0; 3]));
        assert_eq!(cache.get_texture(&mut device, &texture, 0).state, ResourceState::Failed);
        assert_eq!(cache.get_texture(&mut device, &texture, 1).state, ResourceState::Failed);
        assert_eq!(cache.stats().failed, 1);
        assert_eq!(device.counters().textures_created, 0);
    }

    #[test]
    fn modified_source_is_reuploaded() {
        let mut device = HeadlessDevice::new();
        let mut cache = TextureCache::new();
        let texture = Texture::from_image(ImageData::new(1, 1, vec![255; 4]));
        let first = cache.get_texture(&mut device, &texture, 0);
        let again = cache.get_texture(&mut device, &texture, 0);
        assert!(Arc::ptr_eq(first.ready().unwrap(), again.ready().unwrap()));

        texture.set_image(ImageData::new(1, 1, vec![0; 4]));
        let second = cache.get_texture(&mut device, &texture, 1);
        assert_ne!(first.ready().unwrap().id, second.ready().unwrap().id);

        drop((first, again));
        cache.end_frame(&mut device, 1, 1);
        assert_eq!(device.counters().textures_destroyed, 1);
    }

    #[test]
    fn idle_textures_are_released() {
        let mut device = HeadlessDevice::new();
        let mut cache = TextureCache::new();
        let texture = Texture::from_image(ImageData::new(1, 1, vec![255; 4]));
        drop(cache.get_texture(&mut device, &texture, 0));
        cache.end_frame(&mut device, 0, 1);
        assert_eq!(cache.len(), 1);
        cache.end_frame(&mut device, 1, 1);
        assert!(cache.is_empty());
        assert_eq!(device.live_textures(), 0);
    }
}
