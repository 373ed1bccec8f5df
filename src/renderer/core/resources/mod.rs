//! Device-side resource caches.
//!
//! - `packing.rs`: cell expansion and vertex format conversion
//! - `buffer.rs`: vertex buffer cache keyed by source identity + stamps
//! - `texture.rs`: device texture cache and view handles
//! - `uniform.rs`: uniform blocks

pub mod buffer;
pub mod packing;
pub mod texture;
pub mod uniform;

pub use buffer::{BufferCache, BufferCacheKey, BufferCacheStats, BufferRequest, BufferSlot, GpuBuffer};
pub use packing::{ArrayUsage, Packing, PackingKey, UsageClass, format_to_wgsl_type};
pub use texture::{DeviceTexture, TextureCache, TextureCacheStats, TextureLookup, ViewHandle};
pub use uniform::{UniformBuffer, UniformType};

/// Readiness of an asynchronously produced resource, polled once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Not available yet; ask again next frame.
    Pending,
    Ready,
    /// Will not become available until its source changes.
    Failed,
}
