//! Poly Data Mapper
//!
//! Per-frame entry point that turns one [`Actor`] + [`Renderable`] pair into
//! draw commands:
//!
//! 1. **BuildingInput**: maps scalars, then rebuilds the vertex input of
//!    every non-empty cell bucket (verts, lines, polys, strips) through the
//!    shared buffer cache. Static, unmodified renderables skip this step.
//! 2. Texture bindings are refreshed and the mapper uniform block is resent
//!    if any of its dependencies changed since the last send.
//! 3. **ResolvingPipeline**: the pipeline key is derived from the bucket's
//!    bound attributes, texture count, usage class and encoder state; a miss
//!    composes shader stages for exactly those features and builds.
//! 4. **Drawing**: binds pipeline, uniform groups, textures and vertex
//!    buffers, then issues one non-indexed draw per bucket.

use smallvec::SmallVec;
use std::sync::Arc;

use crate::errors::{RenderError, Result};
use crate::renderer::core::context::DeviceContext;
use crate::renderer::core::device::GpuDevice;
use crate::renderer::core::encoder::RenderEncoder;
use crate::renderer::core::resources::{
    ArrayUsage, BufferRequest, Packing, UniformBuffer, UniformType, UsageClass,
};
use crate::renderer::pipeline::object::{PipelineBuilder, PipelineObject};
use crate::renderer::pipeline::pipeline_key::{PipelineFeatures, PipelineKey, VertexAttributes};
use crate::renderer::pipeline::shader_description::{ShaderDescription, ShaderStage};
use crate::renderer::pipeline::shader_manager::load_template;
use crate::renderer::pipeline::vertex::{self, VertexInput};
use crate::renderer::renderer_uniforms::{RENDERER_UBO, RendererUniforms};
use crate::renderer::texture_registry::TextureRegistry;
use crate::resources::actor::Actor;
use crate::resources::data_array::ArrayRef;
use crate::resources::polydata::{PolyData, PrimitiveType};
use crate::resources::renderable::Renderable;
use crate::resources::texture::Texture;
use crate::resources::version_tracker::{ChangeTracker, ModificationTime};

pub const MAPPER_UBO: &str = "mapperUBO";
const PIPELINE_BASE: &str = "polydata";
const FIRST_TEXTURE_GROUP: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperOptions {
    /// Synthesize per-cell normals for surface polygons without normals.
    pub normals_from_points: bool,
}

/// Where the mapper is within [`PolyDataMapper::render`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MapperState {
    #[default]
    Idle,
    BuildingInput,
    ResolvingPipeline,
    Drawing,
}

/// What one [`PolyDataMapper::render`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub primitives_drawn: u32,
    pub pipelines_built: u32,
    pub ubo_uploaded: bool,
    pub textures_bound: u32,
}

#[derive(Debug, Default)]
struct PrimitiveBatch {
    input: VertexInput,
    usage: Option<UsageClass>,
    pipeline: Option<Arc<PipelineObject>>,
}

impl PrimitiveBatch {
    fn clear(&mut self) {
        self.input.clear();
        self.usage = None;
    }
}

#[derive(Debug)]
pub struct PolyDataMapper {
    options: MapperOptions,
    ubo: UniformBuffer,
    textures: TextureRegistry,
    batches: [PrimitiveBatch; 4],
    state: MapperState,
    build_time: ModificationTime,
    tracker: ChangeTracker,
}

impl Default for PolyDataMapper {
    fn default() -> Self {
        Self::new(MapperOptions::default())
    }
}

impl PolyDataMapper {
    #[must_use]
    pub fn new(options: MapperOptions) -> Self {
        Self {
            options,
            ubo: UniformBuffer::new(
                MAPPER_UBO,
                1,
                0,
                &[
                    ("MCWCMatrix", UniformType::Mat4x4F32),
                    ("MCWCNormals", UniformType::Mat4x4F32),
                    ("AmbientColor", UniformType::Vec4F32),
                    ("DiffuseColor", UniformType::Vec4F32),
                    ("SpecularColor", UniformType::Vec4F32),
                    ("AmbientIntensity", UniformType::F32),
                    ("DiffuseIntensity", UniformType::F32),
                    ("SpecularIntensity", UniformType::F32),
                    ("Opacity", UniformType::F32),
                    ("SpecularPower", UniformType::F32),
                ],
            ),
            textures: TextureRegistry::new(),
            batches: Default::default(),
            state: MapperState::Idle,
            build_time: ModificationTime::NEVER,
            tracker: ChangeTracker::new(),
        }
    }

    #[must_use]
    pub fn options(&self) -> MapperOptions {
        self.options
    }

    pub fn set_options(&mut self, options: MapperOptions) {
        if self.options != options {
            self.options = options;
            self.tracker.modified();
        }
    }

    #[must_use]
    pub fn state(&self) -> MapperState {
        self.state
    }

    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        self.tracker.last_modified()
    }

    /// Vertex input of one cell bucket as of the last build.
    #[must_use]
    pub fn vertex_input(&self, primitive: PrimitiveType) -> &VertexInput {
        &self.batches[primitive.index()].input
    }

    /// Pipeline key of one cell bucket as of the last draw.
    #[must_use]
    pub fn pipeline_key(&self, primitive: PrimitiveType) -> Option<&PipelineKey> {
        self.batches[primitive.index()]
            .pipeline
            .as_ref()
            .map(|p| p.key())
    }

    #[must_use]
    pub fn texture_registry(&self) -> &TextureRegistry {
        &self.textures
    }

    /// Clock value of the last mapper uniform upload.
    #[must_use]
    pub fn ubo_send_time(&self) -> ModificationTime {
        self.ubo.send_time()
    }

    pub fn render<D: GpuDevice>(
        &mut self,
        ctx: &mut DeviceContext<D>,
        encoder: &mut RenderEncoder,
        renderer: &mut RendererUniforms,
        actor: &Actor,
        renderable: &mut Renderable,
    ) -> Result<FrameReport> {
        let result = self.render_inner(ctx, encoder, renderer, actor, renderable);
        self.state = MapperState::Idle;
        result
    }

    fn render_inner<D: GpuDevice>(
        &mut self,
        ctx: &mut DeviceContext<D>,
        encoder: &mut RenderEncoder,
        renderer: &mut RendererUniforms,
        actor: &Actor,
        renderable: &mut Renderable,
    ) -> Result<FrameReport> {
        let mut report = FrameReport::default();

        self.state = MapperState::BuildingInput;
        // Opacity reaches the fragment stage through the mapper block.
        renderable.map_scalars(1.0);

        let input_time = self.input_time(actor, renderable);
        if renderable.is_static() && self.build_time >= input_time {
            log::trace!("Skipping vertex input rebuild for static renderable");
        } else {
            self.build_vertex_inputs(ctx, actor, renderable)?;
            self.build_time = ModificationTime::tick();
        }

        let mapping = renderable.color_mapping();
        let mut candidates: SmallVec<[&Texture; 4]> = SmallVec::new();
        if let Some(map) = mapping.color_texture_map() {
            candidates.push(map);
        }
        candidates.extend(actor.textures().iter().filter(|t| t.has_image()));
        self.textures.update(ctx, &candidates)?;
        report.textures_bound = self.textures.len() as u32;

        renderer.prepare(ctx)?;
        report.ubo_uploaded = self.update_ubo(ctx, actor, renderable)?;

        for primitive in PrimitiveType::ALL {
            let Some(usage) = self.batches[primitive.index()].usage else {
                continue;
            };
            if !self.batches[primitive.index()].input.has_attribute(vertex::POSITION) {
                continue;
            }

            self.state = MapperState::ResolvingPipeline;
            let features = PipelineFeatures {
                attributes: attributes_of(&self.batches[primitive.index()].input),
                texture_count: self.textures.len() as u32,
                usage,
            };
            let key = features.key(PIPELINE_BASE, encoder.pipeline_key());
            let pipeline = match ctx.get_pipeline(&key) {
                Some(pipeline) => pipeline,
                None => {
                    let builder =
                        self.pipeline_builder(ctx, renderer, key, &self.batches[primitive.index()].input)?;
                    report.pipelines_built += 1;
                    ctx.create_pipeline(builder, encoder)?
                }
            };

            self.state = MapperState::Drawing;
            let batch = &mut self.batches[primitive.index()];
            pipeline.bind(encoder);
            renderer.bind(encoder, 0);
            if let Some(group) = self.ubo.bind_group() {
                encoder.set_bind_group(1, group);
            }
            self.textures.bind(encoder, FIRST_TEXTURE_GROUP);
            batch.input.bind(encoder);
            encoder.draw(batch.input.vertex_count(), 1, 0, 0);
            batch.pipeline = Some(pipeline);
            report.primitives_drawn += 1;
        }

        Ok(report)
    }

    /// Newest stamp among everything the vertex inputs are built from.
    fn input_time(&self, actor: &Actor, renderable: &Renderable) -> ModificationTime {
        let mapping = renderable.color_mapping();
        [
            mapping.color_map_colors().map(ArrayRef::last_modified),
            mapping.color_coordinates().map(ArrayRef::last_modified),
        ]
        .into_iter()
        .flatten()
        .fold(
            renderable
                .last_modified()
                .max(actor.property().last_modified())
                .max(self.tracker.last_modified()),
            ModificationTime::max,
        )
    }

    // ─── BuildingInput ────────────────────────────────────────────────────

    fn build_vertex_inputs<D: GpuDevice>(
        &mut self,
        ctx: &mut DeviceContext<D>,
        actor: &Actor,
        renderable: &Renderable,
    ) -> Result<()> {
        let input = renderable.input();
        let representation = actor.property().representation();
        for primitive in PrimitiveType::ALL {
            let batch = &mut self.batches[primitive.index()];
            let usage = UsageClass::from_representation(representation, primitive);
            let bound = build_batch(ctx, batch, input, renderable, primitive, usage, self.options)?;
            batch.usage = bound.then_some(usage);
        }
        Ok(())
    }

    // ─── Uniforms ─────────────────────────────────────────────────────────

    fn update_ubo<D: GpuDevice>(
        &mut self,
        ctx: &mut DeviceContext<D>,
        actor: &Actor,
        renderable: &Renderable,
    ) -> Result<bool> {
        let stamp = self
            .tracker
            .last_modified()
            .max(actor.last_modified())
            .max(actor.property().last_modified())
            .max(renderable.last_modified());
        if self.ubo.bind_group().is_some() && self.ubo.send_time() > stamp {
            return Ok(false);
        }

        let model = actor.model_matrix();
        let values = actor.property().values();
        let rgba = |c: [f32; 3]| [c[0], c[1], c[2], 1.0];
        self.ubo.set_mat4("MCWCMatrix", &model)?;
        self.ubo.set_mat4("MCWCNormals", &model.inverse().transpose())?;
        self.ubo.set_array("AmbientColor", &rgba(values.ambient_color))?;
        self.ubo.set_array("DiffuseColor", &rgba(values.diffuse_color))?;
        self.ubo.set_array("SpecularColor", &rgba(values.specular_color))?;
        self.ubo.set_value("AmbientIntensity", values.ambient)?;
        self.ubo.set_value("DiffuseIntensity", values.diffuse)?;
        self.ubo.set_value("SpecularIntensity", values.specular)?;
        self.ubo.set_value("Opacity", values.opacity)?;
        self.ubo.set_value("SpecularPower", values.specular_power)?;

        let layout = ctx.mapper_bind_group_layout();
        self.ubo.send(ctx.device_mut(), layout)?;
        log::trace!("Uploaded {MAPPER_UBO}");
        Ok(true)
    }

    // ─── ResolvingPipeline ────────────────────────────────────────────────

    fn pipeline_builder<D: GpuDevice>(
        &self,
        ctx: &DeviceContext<D>,
        renderer: &RendererUniforms,
        key: PipelineKey,
        input: &VertexInput,
    ) -> Result<PipelineBuilder> {
        let features = key.features();
        let vs = ShaderDescription::new(
            ShaderStage::Vertex,
            "polydata.vert",
            load_template("polydata.vert")?,
        );
        let fs = ShaderDescription::new(
            ShaderStage::Fragment,
            "polydata.frag",
            load_template("polydata.frag")?,
        );
        let mut builder = PipelineBuilder::new(key, vs, fs);

        builder.add_bind_group_layout(RENDERER_UBO, ctx.renderer_bind_group_layout());
        builder.add_bind_group_layout(MAPPER_UBO, ctx.mapper_bind_group_layout());
        for i in 0..features.texture_count {
            builder.add_bind_group_layout(&format!("Texture{i}"), ctx.texture_bind_group_layout());
        }
        builder.set_topology(features.usage.topology());
        builder.set_vertex_layouts(input.vertex_layouts());

        let renderer_code = renderer.shader_code()?;
        let mapper_code = self.ubo.shader_code()?;
        let vertex_input = input.shader_code()?;
        let (vs, fs) = builder.shader_descriptions_mut();
        for stage in [&mut *vs, &mut *fs] {
            stage.replace("//Renderer::UBO", &[&renderer_code]);
            stage.replace("//Mapper::UBO", &[&mapper_code]);
        }
        vs.replace("//VertexInput", &[&vertex_input]);
        replace_texture_code(fs, features.texture_count);
        replace_normal_code(vs, fs, features)?;
        replace_color_code(vs, fs, features)?;
        replace_tcoord_code(vs, fs, features)?;
        Ok(builder)
    }

    /// Releases device resources owned by this mapper.
    pub fn release<D: GpuDevice>(&mut self, ctx: &mut DeviceContext<D>) {
        self.ubo.release(ctx.device_mut());
        self.textures.release(ctx.device_mut());
        for batch in &mut self.batches {
            batch.clear();
            batch.pipeline = None;
        }
        self.build_time = ModificationTime::NEVER;
    }
}

fn attributes_of(input: &VertexInput) -> VertexAttributes {
    let mut attributes = VertexAttributes::empty();
    attributes.set(VertexAttributes::NORMAL, input.has_attribute(vertex::NORMAL));
    attributes.set(VertexAttributes::COLOR, input.has_attribute(vertex::COLOR));
    attributes.set(VertexAttributes::TCOORD, input.has_attribute(vertex::TCOORD));
    attributes
}

/// Binds `source` under `name`, or removes the binding when there is nothing
/// to bind. Returns whether the attribute ended up bound.
fn bind_attribute<D: GpuDevice>(
    ctx: &mut DeviceContext<D>,
    input: &mut VertexInput,
    name: &str,
    request: Option<BufferRequest<'_>>,
) -> Result<bool> {
    let Some(request) = request.filter(|r| !r.source.is_empty()) else {
        input.remove_buffer_if_present(name);
        return Ok(false);
    };
    match ctx.get_buffer(&request) {
        Ok(buffer) => {
            input.add_buffer(name, buffer);
            Ok(true)
        }
        Err(RenderError::EmptySource(_)) => {
            input.remove_buffer_if_present(name);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Rebuilds one bucket. Returns whether it has anything to draw.
fn build_batch<D: GpuDevice>(
    ctx: &mut DeviceContext<D>,
    batch: &mut PrimitiveBatch,
    input: &PolyData,
    renderable: &Renderable,
    primitive: PrimitiveType,
    usage: UsageClass,
    options: MapperOptions,
) -> Result<bool> {
    let cells = input.cells(primitive);
    let Some(points) = input.points().filter(|_| cells.number_of_cells() > 0) else {
        batch.clear();
        return Ok(false);
    };
    let position = BufferRequest {
        label: vertex::POSITION,
        source: points,
        cells,
        usage,
        array_usage: ArrayUsage::PointArray,
        format: wgpu::VertexFormat::Float32x4,
        packing: Packing {
            pack_extra: true,
            ..Default::default()
        },
    };
    if !bind_attribute(ctx, &mut batch.input, vertex::POSITION, Some(position))? {
        batch.clear();
        return Ok(false);
    }

    let normal_packing = Packing {
        scale: 127.0,
        pack_extra: true,
        ..Default::default()
    };
    let point_normals = input.point_data().normals.as_ref().filter(|_| usage.is_surface());
    let normals = match point_normals {
        Some(normals) => Some(BufferRequest {
            label: vertex::NORMAL,
            source: normals,
            format: wgpu::VertexFormat::Snorm8x4,
            packing: normal_packing,
            ..position
        }),
        None if options.normals_from_points && usage == UsageClass::Triangles => {
            Some(BufferRequest {
                label: vertex::NORMAL,
                array_usage: ArrayUsage::NormalsFromPoints,
                format: wgpu::VertexFormat::Snorm8x4,
                packing: normal_packing,
                ..position
            })
        }
        None => None,
    };
    bind_attribute(ctx, &mut batch.input, vertex::NORMAL, normals)?;

    let mapping = renderable.color_mapping();
    let cell_data = mapping.uses_cell_scalars(input);
    let colors = mapping.color_map_colors().map(|colors| BufferRequest {
        label: vertex::COLOR,
        source: colors,
        format: wgpu::VertexFormat::Unorm8x4,
        packing: Packing {
            cell_data,
            cell_offset: if cell_data { input.cell_offset(primitive) } else { 0 },
            ..Default::default()
        },
        ..position
    });
    bind_attribute(ctx, &mut batch.input, vertex::COLOR, colors)?;

    let tcoords = mapping
        .color_coordinates()
        .or(input.point_data().tcoords.as_ref())
        .map(|tcoords| BufferRequest {
            label: vertex::TCOORD,
            source: tcoords,
            format: wgpu::VertexFormat::Float32x2,
            packing: Packing::default(),
            ..position
        });
    bind_attribute(ctx, &mut batch.input, vertex::TCOORD, tcoords)?;

    Ok(true)
}

// ─── Shader Features ──────────────────────────────────────────────────────────

fn replace_texture_code(fs: &mut ShaderDescription, texture_count: u32) {
    let mut lines = Vec::with_capacity(texture_count as usize * 2);
    for i in 0..texture_count {
        let group = FIRST_TEXTURE_GROUP + i;
        lines.push(format!("@group({group}) @binding(0) var Texture{i}: texture_2d<f32>;"));
        lines.push(format!("@group({group}) @binding(1) var Sampler{i}: sampler;"));
    }
    fs.replace("//Texture::Dec", &lines);
}

fn replace_normal_code(
    vs: &mut ShaderDescription,
    fs: &mut ShaderDescription,
    features: PipelineFeatures,
) -> Result<()> {
    if !features.attributes.contains(VertexAttributes::NORMAL) {
        fs.replace(
            "//Normal::Impl",
            &[
                "  let diffuse = diffuseColor.rgb;",
                "  let specular = vec3<f32>(0.0);",
            ],
        );
        return Ok(());
    }
    let dec = vs.output_declaration("vec3<f32>", "normalVC")?;
    vs.replace("//Normal::Dec", &[dec]);
    vs.replace(
        "//Normal::Impl",
        &["  output.normalVC = normalize((rendererUBO.WCVCNormals * mapperUBO.MCWCNormals * vec4<f32>(input.normalMC.xyz, 0.0)).xyz);"],
    );
    let dec = fs.input_declaration(vs, "normalVC")?;
    fs.replace("//Normal::Dec", &[dec]);
    fs.replace(
        "//Normal::Impl",
        &[
            "  var normal: vec3<f32> = normalize(input.normalVC);",
            "  if (!input.frontFacing) { normal = -normal; }",
            "  let lightDirection = vec3<f32>(0.0, 0.0, 1.0);",
            "  let lambert = max(dot(normal, lightDirection), 0.0);",
            "  let diffuse = lambert * diffuseColor.rgb;",
            "  let specular = pow(lambert, mapperUBO.SpecularPower) * mapperUBO.SpecularColor.rgb;",
        ],
    );
    Ok(())
}

fn replace_color_code(
    vs: &mut ShaderDescription,
    fs: &mut ShaderDescription,
    features: PipelineFeatures,
) -> Result<()> {
    if !features.attributes.contains(VertexAttributes::COLOR) {
        return Ok(());
    }
    let dec = vs.output_declaration("vec4<f32>", "color")?;
    vs.replace("//Color::Dec", &[dec]);
    vs.replace("//Color::Impl", &["  output.color = input.colorVI;"]);
    let dec = fs.input_declaration(vs, "color")?;
    fs.replace("//Color::Dec", &[dec]);
    fs.replace(
        "//Color::Impl",
        &[
            "  ambientColor = input.color;",
            "  diffuseColor = input.color;",
            "  opacity = opacity * input.color.a;",
        ],
    );
    Ok(())
}

fn replace_tcoord_code(
    vs: &mut ShaderDescription,
    fs: &mut ShaderDescription,
    features: PipelineFeatures,
) -> Result<()> {
    if !features.attributes.contains(VertexAttributes::TCOORD) {
        return Ok(());
    }
    let dec = vs.output_declaration("vec2<f32>", "tcoordVS")?;
    vs.replace("//TCoord::Dec", &[dec]);
    vs.replace("//TCoord::Impl", &["  output.tcoordVS = input.tcoord;"]);
    let dec = fs.input_declaration(vs, "tcoordVS")?;
    fs.replace("//TCoord::Dec", &[dec]);
    if features.texture_count > 0 {
        fs.replace(
            "//TCoord::Impl",
            &["  computedColor = computedColor * textureSample(Texture0, Sampler0, input.tcoordVS);"],
        );
    }
    Ok(())
}
