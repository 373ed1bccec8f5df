//! Pipeline objects.
//!
//! A [`PipelineBuilder`] gathers everything a pipeline is made of: named
//! bind group layouts in slot order, topology, vertex layouts and the two
//! shader stages. [`PipelineBuilder::build`] lets the render encoder write
//! the fragment outputs, compiles both stages and produces an immutable
//! [`PipelineObject`] shared through the device's pipeline cache.

use smallvec::SmallVec;

use super::pipeline_key::PipelineKey;
use super::shader_description::ShaderDescription;
use super::shader_manager::ShaderManager;
use crate::errors::Result;
use crate::renderer::core::device::{
    BindGroupLayoutId, GpuDevice, RenderPipelineDesc, RenderPipelineId, ShaderModuleId,
    VertexBufferLayoutDesc,
};
use crate::renderer::core::encoder::RenderEncoder;

/// A bind group layout and the name it is looked up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedLayout {
    pub name: String,
    pub layout: BindGroupLayoutId,
}

#[derive(Debug)]
pub struct PipelineObject {
    key: PipelineKey,
    id: RenderPipelineId,
    bind_group_layouts: SmallVec<[NamedLayout; 4]>,
    vertex_layouts: Vec<VertexBufferLayoutDesc>,
    topology: wgpu::PrimitiveTopology,
    vertex_source: String,
    fragment_source: String,
    vertex_module: ShaderModuleId,
    fragment_module: ShaderModuleId,
}

impl PipelineObject {
    #[must_use]
    pub fn key(&self) -> &PipelineKey {
        &self.key
    }

    #[must_use]
    pub fn id(&self) -> RenderPipelineId {
        self.id
    }

    #[must_use]
    pub fn bind_group_layouts(&self) -> &[NamedLayout] {
        &self.bind_group_layouts
    }

    /// Group index the layout called `name` is bound at.
    #[must_use]
    pub fn bind_group_layout_index(&self, name: &str) -> Option<u32> {
        layout_index(&self.bind_group_layouts, name)
    }

    #[must_use]
    pub fn vertex_layouts(&self) -> &[VertexBufferLayoutDesc] {
        &self.vertex_layouts
    }

    #[must_use]
    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.topology
    }

    /// Final WGSL of the vertex stage.
    #[must_use]
    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    /// Final WGSL of the fragment stage.
    #[must_use]
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    #[must_use]
    pub fn shader_modules(&self) -> (ShaderModuleId, ShaderModuleId) {
        (self.vertex_module, self.fragment_module)
    }

    pub fn bind(&self, encoder: &mut RenderEncoder) {
        encoder.set_pipeline(self.id);
    }
}

fn layout_index(layouts: &[NamedLayout], name: &str) -> Option<u32> {
    layouts.iter().position(|l| l.name == name).map(|i| i as u32)
}

// ─── Builder ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PipelineBuilder {
    key: PipelineKey,
    bind_group_layouts: SmallVec<[NamedLayout; 4]>,
    vertex_layouts: Vec<VertexBufferLayoutDesc>,
    topology: wgpu::PrimitiveTopology,
    vertex: ShaderDescription,
    fragment: ShaderDescription,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(key: PipelineKey, vertex: ShaderDescription, fragment: ShaderDescription) -> Self {
        Self {
            key,
            bind_group_layouts: SmallVec::new(),
            vertex_layouts: Vec::new(),
            topology: wgpu::PrimitiveTopology::TriangleList,
            vertex,
            fragment,
        }
    }

    #[must_use]
    pub fn key(&self) -> &PipelineKey {
        &self.key
    }

    /// Appends a layout and returns its group index.
    pub fn add_bind_group_layout(&mut self, name: &str, layout: BindGroupLayoutId) -> u32 {
        self.bind_group_layouts.push(NamedLayout {
            name: name.to_string(),
            layout,
        });
        (self.bind_group_layouts.len() - 1) as u32
    }

    #[must_use]
    pub fn bind_group_layout_index(&self, name: &str) -> Option<u32> {
        layout_index(&self.bind_group_layouts, name)
    }

    pub fn set_topology(&mut self, topology: wgpu::PrimitiveTopology) {
        self.topology = topology;
    }

    pub fn set_vertex_layouts(&mut self, layouts: Vec<VertexBufferLayoutDesc>) {
        self.vertex_layouts = layouts;
    }

    pub fn vertex_mut(&mut self) -> &mut ShaderDescription {
        &mut self.vertex
    }

    pub fn fragment_mut(&mut self) -> &mut ShaderDescription {
        &mut self.fragment
    }

    /// Both stages at once, for declaring fragment inputs from vertex outputs.
    pub fn shader_descriptions_mut(&mut self) -> (&mut ShaderDescription, &mut ShaderDescription) {
        (&mut self.vertex, &mut self.fragment)
    }

    /// Compiles both stages and creates the device pipeline.
    pub fn build<D: GpuDevice>(
        mut self,
        device: &mut D,
        shaders: &mut ShaderManager,
        encoder: &RenderEncoder,
    ) -> Result<PipelineObject> {
        encoder.replace_shader_code(&mut self.fragment)?;

        let label = self.key.to_string();
        let vertex_module =
            shaders.get_or_create_module(device, &format!("{label} vs"), self.vertex.code())?;
        let fragment_module =
            shaders.get_or_create_module(device, &format!("{label} fs"), self.fragment.code())?;

        let layouts: SmallVec<[BindGroupLayoutId; 4]> =
            self.bind_group_layouts.iter().map(|l| l.layout).collect();
        let state = encoder.state();
        let id = device.create_render_pipeline(&RenderPipelineDesc {
            label: &label,
            vertex_module,
            fragment_module,
            bind_group_layouts: &layouts,
            vertex_buffers: &self.vertex_layouts,
            topology: self.topology,
            color_formats: &state.color_formats,
            depth: state.depth,
            sample_count: state.sample_count,
        })?;
        log::debug!("Built pipeline {label}");

        Ok(PipelineObject {
            key: self.key,
            id,
            bind_group_layouts: self.bind_group_layouts,
            vertex_layouts: self.vertex_layouts,
            topology: self.topology,
            vertex_source: self.vertex.into_code(),
            fragment_source: self.fragment.into_code(),
            vertex_module,
            fragment_module,
        })
    }
}
