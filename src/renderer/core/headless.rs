//! In-memory device backend.
//!
//! Records every resource the core creates, validates ids and write bounds,
//! and keeps per-kind counters so tests can assert on reuse versus rebuild
//! without a GPU.

use super::device::{
    BindGroupEntryDesc, BindGroupId, BindGroupLayoutId, BindingResourceDesc, BufferId,
    GpuDevice, RenderPipelineDesc, RenderPipelineId, ResourcePool, SamplerDesc, SamplerId,
    ShaderModuleId, TextureDesc, TextureId, VertexBufferLayoutDesc,
};
use crate::errors::{RenderError, Result};

#[derive(Debug, Clone)]
pub struct HeadlessBuffer {
    pub label: String,
    pub usage: wgpu::BufferUsages,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HeadlessTexture {
    pub desc: TextureDesc,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HeadlessBindGroup {
    pub label: String,
    pub layout: BindGroupLayoutId,
    pub entries: Vec<BindGroupEntryDesc>,
}

#[derive(Debug, Clone)]
pub struct HeadlessShaderModule {
    pub label: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct HeadlessPipeline {
    pub label: String,
    pub vertex_module: ShaderModuleId,
    pub fragment_module: ShaderModuleId,
    pub bind_group_layouts: Vec<BindGroupLayoutId>,
    pub vertex_buffers: Vec<VertexBufferLayoutDesc>,
    pub topology: wgpu::PrimitiveTopology,
    pub color_formats: Vec<wgpu::TextureFormat>,
}

/// Running totals of device operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCounters {
    pub buffers_created: u32,
    pub buffer_writes: u32,
    pub buffers_destroyed: u32,
    pub textures_created: u32,
    pub textures_destroyed: u32,
    pub samplers_created: u32,
    pub bind_groups_created: u32,
    pub bind_groups_destroyed: u32,
    pub shader_modules_created: u32,
    pub pipelines_created: u32,
    pub pipelines_destroyed: u32,
}

/// Device backend that keeps everything in CPU memory.
#[derive(Debug)]
pub struct HeadlessDevice {
    buffers: ResourcePool<HeadlessBuffer>,
    textures: ResourcePool<HeadlessTexture>,
    samplers: ResourcePool<SamplerDesc>,
    layouts: ResourcePool<Vec<wgpu::BindGroupLayoutEntry>>,
    bind_groups: ResourcePool<HeadlessBindGroup>,
    modules: ResourcePool<HeadlessShaderModule>,
    pipelines: ResourcePool<HeadlessPipeline>,
    counters: DeviceCounters,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffers: ResourcePool::new("buffer"),
            textures: ResourcePool::new("texture"),
            samplers: ResourcePool::new("sampler"),
            layouts: ResourcePool::new("bind group layout"),
            bind_groups: ResourcePool::new("bind group"),
            modules: ResourcePool::new("shader module"),
            pipelines: ResourcePool::new("render pipeline"),
            counters: DeviceCounters::default(),
        }
    }

    #[must_use]
    pub fn counters(&self) -> DeviceCounters {
        self.counters
    }

    #[must_use]
    pub fn buffer(&self, id: BufferId) -> Option<&HeadlessBuffer> {
        self.buffers.get(id.index()).ok()
    }

    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&HeadlessTexture> {
        self.textures.get(id.index()).ok()
    }

    #[must_use]
    pub fn sampler(&self, id: SamplerId) -> Option<&SamplerDesc> {
        self.samplers.get(id.index()).ok()
    }

    #[must_use]
    pub fn bind_group(&self, id: BindGroupId) -> Option<&HeadlessBindGroup> {
        self.bind_groups.get(id.index()).ok()
    }

    #[must_use]
    pub fn shader_module(&self, id: ShaderModuleId) -> Option<&HeadlessShaderModule> {
        self.modules.get(id.index()).ok()
    }

    #[must_use]
    pub fn pipeline(&self, id: RenderPipelineId) -> Option<&HeadlessPipeline> {
        self.pipelines.get(id.index()).ok()
    }

    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.live()
    }

    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.live()
    }

    #[must_use]
    pub fn live_bind_groups(&self) -> usize {
        self.bind_groups.live()
    }

    #[must_use]
    pub fn live_pipelines(&self) -> usize {
        self.pipelines.live()
    }

    fn check_resource(&self, resource: BindingResourceDesc) -> Result<()> {
        match resource {
            BindingResourceDesc::Buffer(id) => self.buffers.get(id.index()).map(|_| ()),
            BindingResourceDesc::TextureView(id) => self.textures.get(id.index()).map(|_| ()),
            BindingResourceDesc::Sampler(id) => self.samplers.get(id.index()).map(|_| ()),
        }
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_buffer(
        &mut self,
        label: &str,
        usage: wgpu::BufferUsages,
        contents: &[u8],
    ) -> Result<BufferId> {
        self.counters.buffers_created += 1;
        Ok(BufferId(self.buffers.insert(HeadlessBuffer {
            label: label.to_string(),
            usage,
            data: contents.to_vec(),
        })))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        let target = self.buffers.get_mut(buffer.index())?;
        let start = offset as usize;
        let end = start + data.len();
        if end > target.data.len() {
            return Err(RenderError::Device(format!(
                "write of {} bytes at offset {offset} overruns buffer '{}' ({} bytes)",
                data.len(),
                target.label,
                target.data.len()
            )));
        }
        target.data[start..end].copy_from_slice(data);
        self.counters.buffer_writes += 1;
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(buffer.index()).is_some() {
            self.counters.buffers_destroyed += 1;
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: &[u8]) -> Result<TextureId> {
        let texel = desc.format.block_copy_size(None).ok_or_else(|| {
            RenderError::Device(format!("format {:?} cannot be uploaded", desc.format))
        })?;
        let expected = desc.width as usize * desc.height as usize * texel as usize;
        if expected == 0 || data.len() != expected {
            return Err(RenderError::Device(format!(
                "texture '{}' expects {expected} bytes, got {}",
                desc.label,
                data.len()
            )));
        }
        self.counters.textures_created += 1;
        Ok(TextureId(self.textures.insert(HeadlessTexture {
            desc: desc.clone(),
            data: data.to_vec(),
        })))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(texture.index()).is_some() {
            self.counters.textures_destroyed += 1;
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId> {
        self.counters.samplers_created += 1;
        Ok(SamplerId(self.samplers.insert(*desc)))
    }

    fn create_bind_group_layout(
        &mut self,
        _label: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<BindGroupLayoutId> {
        Ok(BindGroupLayoutId(self.layouts.insert(entries.to_vec())))
    }

    fn create_bind_group(
        &mut self,
        label: &str,
        layout: BindGroupLayoutId,
        entries: &[BindGroupEntryDesc],
    ) -> Result<BindGroupId> {
        let layout_entries = self.layouts.get(layout.index())?;
        for entry in entries {
            if !layout_entries.iter().any(|l| l.binding == entry.binding) {
                return Err(RenderError::Device(format!(
                    "bind group '{label}' uses binding {} absent from its layout",
                    entry.binding
                )));
            }
            self.check_resource(entry.resource)?;
        }
        self.counters.bind_groups_created += 1;
        Ok(BindGroupId(self.bind_groups.insert(HeadlessBindGroup {
            label: label.to_string(),
            layout,
            entries: entries.to_vec(),
        })))
    }

    fn destroy_bind_group(&mut self, group: BindGroupId) {
        if self.bind_groups.remove(group.index()).is_some() {
            self.counters.bind_groups_destroyed += 1;
        }
    }

    fn create_shader_module(&mut self, label: &str, source: &str) -> Result<ShaderModuleId> {
        if source.trim().is_empty() {
            return Err(RenderError::Device(format!("shader module '{label}' is empty")));
        }
        self.counters.shader_modules_created += 1;
        Ok(ShaderModuleId(self.modules.insert(HeadlessShaderModule {
            label: label.to_string(),
            source: source.to_string(),
        })))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDesc<'_>,
    ) -> Result<RenderPipelineId> {
        self.modules.get(desc.vertex_module.index())?;
        self.modules.get(desc.fragment_module.index())?;
        for layout in desc.bind_group_layouts {
            self.layouts.get(layout.index())?;
        }
        self.counters.pipelines_created += 1;
        Ok(RenderPipelineId(self.pipelines.insert(HeadlessPipeline {
            label: desc.label.to_string(),
            vertex_module: desc.vertex_module,
            fragment_module: desc.fragment_module,
            bind_group_layouts: desc.bind_group_layouts.to_vec(),
            vertex_buffers: desc.vertex_buffers.to_vec(),
            topology: desc.topology,
            color_formats: desc.color_formats.to_vec(),
        })))
    }

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineId) {
        if self.pipelines.remove(pipeline.index()).is_some() {
            self.counters.pipelines_destroyed += 1;
        }
    }
}
