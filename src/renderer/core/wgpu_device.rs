//! wgpu backend.
//!
//! [`WgpuDevice`] implements [`GpuDevice`] on top of an externally created
//! `wgpu::Device` / `wgpu::Queue` pair. Resources live in index pools and are
//! addressed by the same `Copy` ids the headless backend hands out.
//! [`WgpuDevice::execute`] replays a recorded command stream into a
//! `wgpu::RenderPass`.

use std::borrow::Cow;
use wgpu::util::DeviceExt;

use super::device::{
    BindGroupEntryDesc, BindGroupId, BindGroupLayoutId, BindingResourceDesc, BufferId, GpuDevice,
    RenderPipelineDesc, RenderPipelineId, ResourcePool, SamplerDesc, SamplerId, ShaderModuleId,
    TextureDesc, TextureId,
};
use super::encoder::RenderCommand;
use crate::errors::{RenderError, Result};

struct DeviceTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: ResourcePool<wgpu::Buffer>,
    textures: ResourcePool<DeviceTexture>,
    samplers: ResourcePool<wgpu::Sampler>,
    layouts: ResourcePool<wgpu::BindGroupLayout>,
    bind_groups: ResourcePool<wgpu::BindGroup>,
    modules: ResourcePool<wgpu::ShaderModule>,
    pipelines: ResourcePool<wgpu::RenderPipeline>,
}

impl WgpuDevice {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: ResourcePool::new("buffer"),
            textures: ResourcePool::new("texture"),
            samplers: ResourcePool::new("sampler"),
            layouts: ResourcePool::new("bind group layout"),
            bind_groups: ResourcePool::new("bind group"),
            modules: ResourcePool::new("shader module"),
            pipelines: ResourcePool::new("render pipeline"),
        }
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Adopts a texture created elsewhere (e.g. a render target) so its
    /// default view can be bound through an id.
    pub fn import_texture(&mut self, texture: wgpu::Texture) -> TextureId {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        TextureId(self.textures.insert(DeviceTexture { texture, view }))
    }

    /// Replays `commands` into `pass`.
    pub fn execute(&self, pass: &mut wgpu::RenderPass<'_>, commands: &[RenderCommand]) -> Result<()> {
        for command in commands {
            match command {
                RenderCommand::SetPipeline(id) => {
                    pass.set_pipeline(self.pipelines.get(id.index())?);
                }
                RenderCommand::SetBindGroup { index, group } => {
                    pass.set_bind_group(*index, self.bind_groups.get(group.index())?, &[]);
                }
                RenderCommand::SetVertexBuffer { slot, buffer } => {
                    pass.set_vertex_buffer(*slot, self.buffers.get(buffer.index())?.slice(..));
                }
                RenderCommand::Draw {
                    vertices,
                    instances,
                } => pass.draw(vertices.clone(), instances.clone()),
            }
        }
        Ok(())
    }
}

impl GpuDevice for WgpuDevice {
    fn create_buffer(
        &mut self,
        label: &str,
        usage: wgpu::BufferUsages,
        contents: &[u8],
    ) -> Result<BufferId> {
        if contents.is_empty() {
            return Err(RenderError::Device(format!("buffer '{label}' has no contents")));
        }
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });
        Ok(BufferId(self.buffers.insert(buffer)))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        let target = self.buffers.get(buffer.index())?;
        if offset + data.len() as u64 > target.size() {
            return Err(RenderError::Device(format!(
                "write of {} bytes at {offset} overruns buffer #{} ({} bytes)",
                data.len(),
                buffer.index(),
                target.size()
            )));
        }
        self.queue.write_buffer(target, offset, data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.buffers.remove(buffer.index()) {
            buffer.destroy();
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: &[u8]) -> Result<TextureId> {
        let block = desc.format.block_copy_size(None).ok_or_else(|| {
            RenderError::Device(format!("texture format {:?} cannot be uploaded", desc.format))
        })?;
        let expected = u64::from(desc.width) * u64::from(desc.height) * u64::from(block);
        if data.len() as u64 != expected {
            return Err(RenderError::InvalidImage(format!(
                "'{}' expects {expected} bytes, got {}",
                desc.label,
                data.len()
            )));
        }

        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * block),
                rows_per_image: Some(desc.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(TextureId(self.textures.insert(DeviceTexture { texture, view })))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.remove(texture.index()) {
            entry.texture.destroy();
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId> {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: None,
            mag_filter: desc.mag_filter,
            min_filter: desc.min_filter,
            ..Default::default()
        });
        Ok(SamplerId(self.samplers.insert(sampler)))
    }

    fn create_bind_group_layout(
        &mut self,
        label: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<BindGroupLayoutId> {
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            });
        Ok(BindGroupLayoutId(self.layouts.insert(layout)))
    }

    fn create_bind_group(
        &mut self,
        label: &str,
        layout: BindGroupLayoutId,
        entries: &[BindGroupEntryDesc],
    ) -> Result<BindGroupId> {
        let layout = self.layouts.get(layout.index())?;
        let mut wgpu_entries = Vec::with_capacity(entries.len());
        for entry in entries {
            let resource = match entry.resource {
                BindingResourceDesc::Buffer(id) => self.buffers.get(id.index())?.as_entire_binding(),
                BindingResourceDesc::TextureView(id) => {
                    wgpu::BindingResource::TextureView(&self.textures.get(id.index())?.view)
                }
                BindingResourceDesc::Sampler(id) => {
                    wgpu::BindingResource::Sampler(self.samplers.get(id.index())?)
                }
            };
            wgpu_entries.push(wgpu::BindGroupEntry {
                binding: entry.binding,
                resource,
            });
        }
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &wgpu_entries,
        });
        Ok(BindGroupId(self.bind_groups.insert(group)))
    }

    fn destroy_bind_group(&mut self, group: BindGroupId) {
        self.bind_groups.remove(group.index());
    }

    fn create_shader_module(&mut self, label: &str, source: &str) -> Result<ShaderModuleId> {
        if source.trim().is_empty() {
            return Err(RenderError::Device(format!("shader module '{label}' is empty")));
        }
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
            });
        Ok(ShaderModuleId(self.modules.insert(module)))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDesc<'_>,
    ) -> Result<RenderPipelineId> {
        let vertex_module = self.modules.get(desc.vertex_module.index())?;
        let fragment_module = self.modules.get(desc.fragment_module.index())?;
        let bind_group_layouts = desc
            .bind_group_layouts
            .iter()
            .map(|id| self.layouts.get(id.index()).map(Some))
            .collect::<Result<Vec<_>>>()?;

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &bind_group_layouts,
                immediate_size: 0,
            });

        let vertex_buffers: Vec<wgpu::VertexBufferLayout<'_>> =
            desc.vertex_buffers.iter().map(|b| b.as_wgpu()).collect();
        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_formats
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex_module,
                    entry_point: Some("main"),
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fragment_module,
                    entry_point: Some("main"),
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: desc.topology,
                    ..Default::default()
                },
                depth_stencil: desc.depth.map(|depth| wgpu::DepthStencilState {
                    format: depth.format,
                    depth_write_enabled: Some(depth.write_enabled),
                    depth_compare: Some(depth.compare),
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: desc.sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
                cache: None,
            });
        Ok(RenderPipelineId(self.pipelines.insert(pipeline)))
    }

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.pipelines.remove(pipeline.index());
    }
}
