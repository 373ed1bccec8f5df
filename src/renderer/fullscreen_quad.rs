//! Full-screen quad pass.
//!
//! Draws the context's shared quad buffer with a fixed vertex stage and a
//! caller-replaceable fragment stage. Inputs are [`ViewHandle`]s, bound as
//! `Texture{i}` / `Sampler{i}` at groups `0..n` in insertion order.
//!
//! The pipeline is cached under the caller's tag, so two quads with
//! different fragment templates must use different tags.

use std::sync::Arc;

use crate::errors::{RenderError, Result};
use crate::renderer::core::context::DeviceContext;
use crate::renderer::core::device::{
    BindGroupEntryDesc, BindGroupId, BindingResourceDesc, GpuDevice, SamplerDesc, TextureId,
};
use crate::renderer::core::encoder::{ENCODER_DEC_MARKER, ENCODER_IMPL_MARKER, RenderEncoder};
use crate::renderer::core::resources::{UsageClass, ViewHandle};
use crate::renderer::pipeline::object::{PipelineBuilder, PipelineObject};
use crate::renderer::pipeline::pipeline_key::{PipelineFeatures, VertexAttributes};
use crate::renderer::pipeline::shader_description::{ShaderDescription, ShaderStage};
use crate::renderer::pipeline::shader_manager::load_template;
use crate::renderer::pipeline::shader_template::ShaderTemplate;
use crate::renderer::pipeline::vertex::{self, VertexInput};

const VERTEX_TEMPLATE: &str = "fullscreen_quad.vert";
const FRAGMENT_TEMPLATE: &str = "fullscreen_quad.frag";

#[derive(Debug)]
struct BoundView {
    handle: ViewHandle,
    /// Texture the bind group was built for.
    texture: Option<TextureId>,
    bind_group: Option<BindGroupId>,
}

#[derive(Debug)]
pub struct FullScreenQuad {
    tag: String,
    fragment: ShaderTemplate,
    views: Vec<BoundView>,
    input: VertexInput,
    pipeline: Option<Arc<PipelineObject>>,
}

impl FullScreenQuad {
    /// A quad using the built-in fragment stage, which samples `Texture0`.
    pub fn new(tag: &str) -> Result<Self> {
        Ok(Self {
            tag: tag.to_string(),
            fragment: load_template(FRAGMENT_TEMPLATE)?,
            views: Vec::new(),
            input: VertexInput::new(),
            pipeline: None,
        })
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Replaces the fragment stage.
    ///
    /// The source must carry `//RenderEncoder::Dec` and
    /// `//RenderEncoder::Impl` and must not repeat any marker.
    pub fn set_fragment_template(&mut self, source: &str) -> Result<()> {
        let template = ShaderTemplate::parse(FRAGMENT_TEMPLATE, source)?;
        for marker in [ENCODER_DEC_MARKER, ENCODER_IMPL_MARKER] {
            if !template.has_marker(marker) {
                return Err(RenderError::MissingMarker {
                    stage: FRAGMENT_TEMPLATE.to_string(),
                    marker: marker.to_string(),
                });
            }
        }
        self.fragment = template;
        self.pipeline = None;
        Ok(())
    }

    pub fn add_texture_view(&mut self, handle: ViewHandle) {
        self.views.push(BoundView {
            handle,
            texture: None,
            bind_group: None,
        });
        self.pipeline = None;
    }

    #[must_use]
    pub fn texture_views(&self) -> impl Iterator<Item = &ViewHandle> {
        self.views.iter().map(|v| &v.handle)
    }

    /// Pipeline used by the last draw.
    #[must_use]
    pub fn pipeline(&self) -> Option<&Arc<PipelineObject>> {
        self.pipeline.as_ref()
    }

    /// Rebuilds the bind group of every view whose texture changed. Returns
    /// the number rebuilt.
    pub fn update_texture_views<D: GpuDevice>(&mut self, ctx: &mut DeviceContext<D>) -> Result<usize> {
        let mut rebuilt = 0;
        for view in &mut self.views {
            let texture = view.handle.texture();
            if view.texture == Some(texture) && view.bind_group.is_some() {
                continue;
            }
            let sampler = ctx.get_sampler(SamplerDesc::interpolated(view.handle.interpolate()))?;
            let layout = ctx.texture_bind_group_layout();
            let device = ctx.device_mut();
            if let Some(stale) = view.bind_group.take() {
                device.destroy_bind_group(stale);
            }
            view.bind_group = Some(device.create_bind_group(
                view.handle.label(),
                layout,
                &[
                    BindGroupEntryDesc {
                        binding: 0,
                        resource: BindingResourceDesc::TextureView(texture),
                    },
                    BindGroupEntryDesc {
                        binding: 1,
                        resource: BindingResourceDesc::Sampler(sampler),
                    },
                ],
            )?);
            view.texture = Some(texture);
            rebuilt += 1;
        }
        Ok(rebuilt)
    }

    pub fn render<D: GpuDevice>(
        &mut self,
        ctx: &mut DeviceContext<D>,
        encoder: &mut RenderEncoder,
    ) -> Result<()> {
        if !self.input.has_attribute(vertex::POSITION) {
            let quad = ctx.fullscreen_quad_buffer()?;
            self.input.add_buffer(vertex::POSITION, quad);
        }
        self.update_texture_views(ctx)?;

        let key = PipelineFeatures {
            attributes: VertexAttributes::empty(),
            texture_count: self.views.len() as u32,
            usage: UsageClass::Triangles,
        }
        .key(self.tag.clone(), encoder.pipeline_key());

        let pipeline = match ctx.get_pipeline(&key) {
            Some(pipeline) => pipeline,
            None => {
                let vs = ShaderDescription::new(
                    ShaderStage::Vertex,
                    VERTEX_TEMPLATE,
                    load_template(VERTEX_TEMPLATE)?,
                );
                let fs =
                    ShaderDescription::new(ShaderStage::Fragment, FRAGMENT_TEMPLATE, self.fragment.clone());
                let mut builder = PipelineBuilder::new(key, vs, fs);
                for view in &self.views {
                    builder.add_bind_group_layout(view.handle.label(), ctx.texture_bind_group_layout());
                }
                builder.set_topology(UsageClass::Triangles.topology());
                builder.set_vertex_layouts(self.input.vertex_layouts());

                let vertex_input = self.input.shader_code()?;
                let (vs, fs) = builder.shader_descriptions_mut();
                vs.replace("//VertexInput", &[vertex_input]);
                let dec = vs.output_declaration("vec2<f32>", "tcoordVS")?;
                vs.replace("//TCoord::Dec", &[dec]);
                let dec = fs.input_declaration(vs, "tcoordVS")?;
                fs.replace("//TCoord::Dec", &[dec]);

                let mut textures = Vec::with_capacity(self.views.len() * 2);
                for i in 0..self.views.len() {
                    textures.push(format!("@group({i}) @binding(0) var Texture{i}: texture_2d<f32>;"));
                    textures.push(format!("@group({i}) @binding(1) var Sampler{i}: sampler;"));
                }
                fs.replace("//Texture::Dec", &textures);

                log::debug!("Building full-screen pipeline '{}'", self.tag);
                ctx.create_pipeline(builder, encoder)?
            }
        };

        pipeline.bind(encoder);
        for (i, view) in self.views.iter().enumerate() {
            if let Some(group) = view.bind_group {
                encoder.set_bind_group(i as u32, group);
            }
        }
        self.input.bind(encoder);
        encoder.draw(self.input.vertex_count(), 1, 0, 0);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    pub fn release<D: GpuDevice>(&mut self, ctx: &mut DeviceContext<D>) {
        for view in &mut self.views {
            if let Some(group) = view.bind_group.take() {
                ctx.device_mut().destroy_bind_group(group);
            }
            view.texture = None;
        }
        self.input.clear();
        self.pipeline = None;
    }
}
