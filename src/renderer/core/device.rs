//! Device abstraction.
//!
//! The renderer core never talks to a graphics API directly. Everything it
//! needs from a GPU goes through [`GpuDevice`], which hands back lightweight
//! `Copy` ids. Two backends exist: [`HeadlessDevice`] records resources in
//! memory, [`WgpuDevice`] forwards to a real `wgpu::Device`.
//!
//! [`HeadlessDevice`]: super::headless::HeadlessDevice
//! [`WgpuDevice`]: super::wgpu_device::WgpuDevice

use crate::errors::{RenderError, Result};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw index into the backend storage array.
            #[inline]
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// Handle to a device buffer.
    BufferId
);
define_id!(
    /// Handle to a device texture (bound through its default view).
    TextureId
);
define_id!(
    /// Handle to a sampler.
    SamplerId
);
define_id!(
    /// Handle to a bind group layout.
    BindGroupLayoutId
);
define_id!(
    /// Handle to a bind group.
    BindGroupId
);
define_id!(
    /// Handle to a compiled shader module.
    ShaderModuleId
);
define_id!(
    /// Handle to a render pipeline.
    RenderPipelineId
);

// ─── Descriptors ──────────────────────────────────────────────────────────────

/// 2D texture creation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// Sampler creation parameters. Hashable so samplers can be shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
}

impl SamplerDesc {
    /// Linear or nearest filtering in both directions.
    #[must_use]
    pub fn interpolated(interpolate: bool) -> Self {
        let filter = if interpolate {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        Self {
            mag_filter: filter,
            min_filter: filter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResourceDesc {
    Buffer(BufferId),
    TextureView(TextureId),
    Sampler(SamplerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntryDesc {
    pub binding: u32,
    pub resource: BindingResourceDesc,
}

/// Owned per-vertex buffer layout (always `VertexStepMode::Vertex`).
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferLayoutDesc {
    pub array_stride: u64,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexBufferLayoutDesc {
    #[must_use]
    pub fn as_wgpu(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }
}

/// Depth test configuration of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub format: wgpu::TextureFormat,
    pub compare: wgpu::CompareFunction,
    pub write_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RenderPipelineDesc<'a> {
    pub label: &'a str,
    pub vertex_module: ShaderModuleId,
    pub fragment_module: ShaderModuleId,
    pub bind_group_layouts: &'a [BindGroupLayoutId],
    pub vertex_buffers: &'a [VertexBufferLayoutDesc],
    pub topology: wgpu::PrimitiveTopology,
    pub color_formats: &'a [wgpu::TextureFormat],
    pub depth: Option<DepthState>,
    pub sample_count: u32,
}

// ─── Device Trait ─────────────────────────────────────────────────────────────

/// The GPU operations the renderer core depends on.
pub trait GpuDevice {
    fn create_buffer(
        &mut self,
        label: &str,
        usage: wgpu::BufferUsages,
        contents: &[u8],
    ) -> Result<BufferId>;

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<()>;

    fn destroy_buffer(&mut self, buffer: BufferId);

    /// Creates a sampled 2D texture and uploads `data` as its only mip level.
    fn create_texture(&mut self, desc: &TextureDesc, data: &[u8]) -> Result<TextureId>;

    fn destroy_texture(&mut self, texture: TextureId);

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId>;

    fn create_bind_group_layout(
        &mut self,
        label: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<BindGroupLayoutId>;

    fn create_bind_group(
        &mut self,
        label: &str,
        layout: BindGroupLayoutId,
        entries: &[BindGroupEntryDesc],
    ) -> Result<BindGroupId>;

    fn destroy_bind_group(&mut self, group: BindGroupId);

    fn create_shader_module(&mut self, label: &str, source: &str) -> Result<ShaderModuleId>;

    fn create_render_pipeline(&mut self, desc: &RenderPipelineDesc<'_>)
    -> Result<RenderPipelineId>;

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineId);
}

// ─── Resource Pool ────────────────────────────────────────────────────────────

/// Index-addressed storage shared by the backends.
///
/// Slots are never reused, so a destroyed id can never alias a new resource.
#[derive(Debug)]
pub struct ResourcePool<T> {
    kind: &'static str,
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> ResourcePool<T> {
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: Vec::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> u32 {
        self.slots.push(Some(value));
        self.live += 1;
        (self.slots.len() - 1) as u32
    }

    pub fn get(&self, index: usize) -> Result<&T> {
        self.slots
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| RenderError::Device(format!("unknown {} #{index}", self.kind)))
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let kind = self.kind;
        self.slots
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or_else(|| RenderError::Device(format!("unknown {kind} #{index}")))
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        let value = self.slots.get_mut(index).and_then(Option::take);
        if value.is_some() {
            self.live -= 1;
        }
        value
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Number of resources currently alive.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live
    }
}
