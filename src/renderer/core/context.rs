//! Device Context
//!
//! [`DeviceContext`] owns a [`GpuDevice`] together with every cache shared by
//! the mappers drawing through it:
//!
//! - vertex buffers ([`BufferCache`])
//! - pipelines ([`PipelineCache`])
//! - device textures ([`TextureCache`]) and samplers
//! - compiled shader modules ([`ShaderManager`])
//! - the three shared bind group layouts (renderer, mapper, texture)
//!
//! Nothing here is a process-wide singleton; two contexts in one process are
//! fully independent. Callers pass the context by `&mut` into every render
//! call and finish each frame with [`DeviceContext::end_frame`].

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::device::{BindGroupLayoutId, GpuDevice, SamplerDesc, SamplerId};
use super::encoder::RenderEncoder;
use super::resources::{BufferCache, BufferRequest, GpuBuffer, TextureCache, TextureLookup};
use crate::errors::Result;
use crate::renderer::pipeline::cache::PipelineCache;
use crate::renderer::pipeline::object::{PipelineBuilder, PipelineObject};
use crate::renderer::pipeline::pipeline_key::PipelineKey;
use crate::renderer::pipeline::shader_manager::ShaderManager;
use crate::renderer::settings::RendererSettings;
use crate::resources::texture::Texture;

fn uniform_layout_entry() -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_layout_entries() -> [wgpu::BindGroupLayoutEntry; 2] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ]
}

pub struct DeviceContext<D: GpuDevice> {
    device: D,
    settings: RendererSettings,
    frame: u64,

    buffers: BufferCache,
    pipelines: PipelineCache,
    textures: TextureCache,
    samplers: FxHashMap<SamplerDesc, SamplerId>,
    shaders: ShaderManager,

    renderer_layout: BindGroupLayoutId,
    mapper_layout: BindGroupLayoutId,
    texture_layout: BindGroupLayoutId,
}

impl<D: GpuDevice> DeviceContext<D> {
    pub fn new(mut device: D, settings: RendererSettings) -> Result<Self> {
        let renderer_layout =
            device.create_bind_group_layout("rendererBindGroupLayout", &[uniform_layout_entry()])?;
        let mapper_layout =
            device.create_bind_group_layout("mapperBindGroupLayout", &[uniform_layout_entry()])?;
        let texture_layout =
            device.create_bind_group_layout("textureBindGroupLayout", &texture_layout_entries())?;

        Ok(Self {
            device,
            pipelines: PipelineCache::new(settings.pipeline_cache_capacity),
            shaders: ShaderManager::new(settings.debug_shaders),
            settings,
            frame: 0,
            buffers: BufferCache::new(),
            textures: TextureCache::new(),
            samplers: FxHashMap::default(),
            renderer_layout,
            mapper_layout,
            texture_layout,
        })
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Index of the frame currently being recorded.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    // ─── Buffers ──────────────────────────────────────────────────────────

    pub fn get_buffer(&mut self, request: &BufferRequest<'_>) -> Result<Arc<GpuBuffer>> {
        self.buffers.get_buffer(&mut self.device, request)
    }

    pub fn fullscreen_quad_buffer(&mut self) -> Result<Arc<GpuBuffer>> {
        self.buffers.fullscreen_quad(&mut self.device)
    }

    #[must_use]
    pub fn buffer_cache(&self) -> &BufferCache {
        &self.buffers
    }

    // ─── Textures & Samplers ──────────────────────────────────────────────

    pub fn get_texture(&mut self, source: &Texture) -> TextureLookup {
        self.textures
            .get_texture(&mut self.device, source, self.frame)
    }

    #[must_use]
    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    /// Samplers are immutable, so one per descriptor is shared by everyone.
    pub fn get_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerId> {
        if let Some(&id) = self.samplers.get(&desc) {
            return Ok(id);
        }
        let id = self.device.create_sampler(&desc)?;
        self.samplers.insert(desc, id);
        Ok(id)
    }

    // ─── Pipelines ────────────────────────────────────────────────────────

    pub fn get_pipeline(&mut self, key: &PipelineKey) -> Option<Arc<PipelineObject>> {
        self.pipelines.get(key, self.frame)
    }

    /// Builds `builder` and registers the result under its key.
    pub fn create_pipeline(
        &mut self,
        builder: PipelineBuilder,
        encoder: &RenderEncoder,
    ) -> Result<Arc<PipelineObject>> {
        let pipeline = builder.build(&mut self.device, &mut self.shaders, encoder)?;
        Ok(self.pipelines.insert(pipeline, self.frame))
    }

    #[must_use]
    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipelines
    }

    #[must_use]
    pub fn shader_manager(&self) -> &ShaderManager {
        &self.shaders
    }

    // ─── Layouts ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn renderer_bind_group_layout(&self) -> BindGroupLayoutId {
        self.renderer_layout
    }

    #[must_use]
    pub fn mapper_bind_group_layout(&self) -> BindGroupLayoutId {
        self.mapper_layout
    }

    #[must_use]
    pub fn texture_bind_group_layout(&self) -> BindGroupLayoutId {
        self.texture_layout
    }

    // ─── Frame ────────────────────────────────────────────────────────────

    /// Performs deferred releases and advances the frame counter.
    pub fn end_frame(&mut self) {
        self.buffers.end_frame(&mut self.device);
        self.textures
            .end_frame(&mut self.device, self.frame, self.settings.texture_idle_frames);
        self.pipelines.end_frame(&mut self.device, self.frame);
        self.frame += 1;
    }
}
