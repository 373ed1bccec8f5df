//! Vertex buffer cache.
//!
//! Buffers are keyed by *what produced them*: the source array and cell
//! array identities, their modification stamps, the target format and every
//! packing parameter. A hit is returned without any further validation; the
//! stamps in the key are the validation.
//!
//! Each logical slot (one source array packed one way for one cell bucket)
//! remembers its newest key. When a newer key replaces it, the old buffer is
//! retired and destroyed at [`BufferCache::end_frame`] once no vertex input
//! still holds it.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::packing::{
    ArrayUsage, Packing, PackingKey, SourceView, UsageClass, expand_cells, pack_vertices,
};
use crate::errors::{RenderError, Result};
use crate::renderer::core::device::{BufferId, GpuDevice};
use crate::resources::cell_array::CellArrayRef;
use crate::resources::data_array::ArrayRef;
use crate::resources::version_tracker::ModificationTime;

/// An uploaded vertex buffer and the request that produced it.
#[derive(Debug)]
pub struct GpuBuffer {
    pub id: BufferId,
    /// `None` for device-owned buffers (the full-screen quad).
    pub key: Option<BufferCacheKey>,
    pub size: u64,
    pub stride: u64,
    pub vertex_count: u32,
    pub format: wgpu::VertexFormat,
    pub label: String,
}

/// One attribute buffer request.
#[derive(Debug, Clone, Copy)]
pub struct BufferRequest<'a> {
    pub label: &'a str,
    pub source: &'a ArrayRef,
    pub cells: &'a CellArrayRef,
    pub usage: UsageClass,
    pub array_usage: ArrayUsage,
    pub format: wgpu::VertexFormat,
    pub packing: Packing,
}

/// Everything a buffer is built from except the version stamps. Requests
/// that differ only in format or packing occupy different slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSlot {
    pub source: u64,
    pub cells: u64,
    pub usage: UsageClass,
    pub array_usage: ArrayUsage,
    pub format: wgpu::VertexFormat,
    pub packing: PackingKey,
}

/// Full cache key. Equal keys are cache-equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferCacheKey {
    pub slot: BufferSlot,
    pub source_time: ModificationTime,
    pub cells_time: ModificationTime,
}

impl BufferRequest<'_> {
    #[must_use]
    pub fn key(&self) -> BufferCacheKey {
        BufferCacheKey {
            slot: BufferSlot {
                source: self.source.id(),
                cells: self.cells.id(),
                usage: self.usage,
                array_usage: self.array_usage,
                format: self.format,
                packing: self.packing.into(),
            },
            source_time: self.source.last_modified(),
            cells_time: self.cells.last_modified(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub superseded: u64,
    pub released: u64,
}

#[derive(Debug, Default)]
pub struct BufferCache {
    entries: FxHashMap<BufferCacheKey, Arc<GpuBuffer>>,
    slots: FxHashMap<BufferSlot, BufferCacheKey>,
    retired: Vec<Arc<GpuBuffer>>,
    fullscreen_quad: Option<Arc<GpuBuffer>>,
    stats: BufferCacheStats,
}

impl BufferCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buffer for `request`, packing and uploading on a miss.
    ///
    /// An empty source, or cells that expand to no vertices, yields
    /// [`RenderError::EmptySource`]; callers treat that as "attribute absent".
    pub fn get_buffer<D: GpuDevice>(
        &mut self,
        device: &mut D,
        request: &BufferRequest<'_>,
    ) -> Result<Arc<GpuBuffer>> {
        let key = request.key();
        if let Some(buffer) = self.entries.get(&key) {
            self.stats.hits += 1;
            log::trace!("Buffer cache hit: {}", request.label);
            return Ok(Arc::clone(buffer));
        }
        self.stats.misses += 1;

        if request.source.is_empty() {
            return Err(RenderError::EmptySource(request.label.to_string()));
        }
        let packed = {
            let values = request.source.read();
            let connectivity = request.cells.read();
            let vertices = expand_cells(&connectivity, request.usage);
            let view = SourceView {
                values: &values,
                components: request.source.components(),
            };
            pack_vertices(
                view,
                &vertices,
                &connectivity,
                request.array_usage,
                request.format,
                &request.packing,
            )?
        };
        if packed.vertex_count == 0 {
            return Err(RenderError::EmptySource(request.label.to_string()));
        }

        let id = device.create_buffer(
            request.label,
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            &packed.bytes,
        )?;
        let buffer = Arc::new(GpuBuffer {
            id,
            key: Some(key),
            size: packed.bytes.len() as u64,
            stride: packed.stride,
            vertex_count: packed.vertex_count,
            format: request.format,
            label: request.label.to_string(),
        });
        log::debug!(
            "Built buffer '{}' ({} vertices, {:?}, {})",
            request.label,
            packed.vertex_count,
            request.format,
            request.usage
        );

        if let Some(old_key) = self.slots.insert(key.slot, key)
            && old_key != key
            && let Some(old) = self.entries.remove(&old_key)
        {
            self.stats.superseded += 1;
            self.retired.push(old);
        }
        self.entries.insert(key, Arc::clone(&buffer));
        Ok(buffer)
    }

    /// Whether a buffer for exactly `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &BufferCacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Two triangles covering clip space, `float32x3` positions.
    pub fn fullscreen_quad<D: GpuDevice>(&mut self, device: &mut D) -> Result<Arc<GpuBuffer>> {
        if let Some(quad) = &self.fullscreen_quad {
            return Ok(Arc::clone(quad));
        }
        #[rustfmt::skip]
        let vertices: [f32; 18] = [
            -1.0, -1.0, 0.0,
             1.0, -1.0, 0.0,
             1.0,  1.0, 0.0,
            -1.0, -1.0, 0.0,
             1.0,  1.0, 0.0,
            -1.0,  1.0, 0.0,
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let id = device.create_buffer("FullScreenQuad", wgpu::BufferUsages::VERTEX, bytes)?;
        let quad = Arc::new(GpuBuffer {
            id,
            key: None,
            size: bytes.len() as u64,
            stride: wgpu::VertexFormat::Float32x3.size(),
            vertex_count: 6,
            format: wgpu::VertexFormat::Float32x3,
            label: "FullScreenQuad".to_string(),
        });
        self.fullscreen_quad = Some(Arc::clone(&quad));
        Ok(quad)
    }

    /// Destroys retired buffers nothing else references anymore.
    pub fn end_frame<D: GpuDevice>(&mut self, device: &mut D) {
        let before = self.retired.len();
        self.retired.retain(|buffer| {
            if Arc::strong_count(buffer) > 1 {
                return true;
            }
            device.destroy_buffer(buffer.id);
            false
        });
        let released = (before - self.retired.len()) as u64;
        if released > 0 {
            log::debug!("Released {released} superseded buffers");
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

    /// Buffers waiting for their last user to let go.
    #[must_use]
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    #[must_use]
    pub fn stats(&self) -> BufferCacheStats {
        self.stats
    }
}
