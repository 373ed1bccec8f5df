//! Pipeline Identity & Cache Tests
//!
//! Tests for:
//! - PipelineKey injectivity across attribute set, texture count and usage
//! - Encoder state as part of the key
//! - PipelineBuilder layouts, topology and composition failures
//! - PipelineCache insert-if-absent and LRU eviction

use std::collections::HashSet;
use std::sync::Arc;

use tessera::errors::RenderError;
use tessera::renderer::core::device::DepthState;
use tessera::renderer::core::resources::UsageClass;
use tessera::renderer::pipeline::{
    PipelineBuilder, PipelineFeatures, PipelineKey, ShaderDescription, ShaderStage,
    ShaderTemplate, VertexAttributes, load_template,
};
use tessera::renderer::{
    DeviceContext, EncoderState, HeadlessDevice, RenderEncoder, RendererSettings,
};

const USAGES: [UsageClass; 6] = [
    UsageClass::Verts,
    UsageClass::Lines,
    UsageClass::Triangles,
    UsageClass::Strips,
    UsageClass::LinesFromStrips,
    UsageClass::LinesFromTriangles,
];

fn color_state() -> EncoderState {
    EncoderState::color(wgpu::TextureFormat::Bgra8Unorm)
}

fn context(capacity: Option<usize>) -> DeviceContext<HeadlessDevice> {
    let settings = RendererSettings {
        pipeline_cache_capacity: capacity,
        ..Default::default()
    };
    DeviceContext::new(HeadlessDevice::new(), settings).unwrap()
}

fn key(attributes: VertexAttributes, texture_count: u32, usage: UsageClass) -> PipelineKey {
    PipelineFeatures {
        attributes,
        texture_count,
        usage,
    }
    .key("polydata", color_state())
}

fn builder(ctx: &DeviceContext<HeadlessDevice>, key: PipelineKey) -> PipelineBuilder {
    let vs = ShaderDescription::new(
        ShaderStage::Vertex,
        "test.vert",
        ShaderTemplate::parse("test.vert", "@vertex fn main() {}\n").unwrap(),
    );
    let fs = ShaderDescription::new(
        ShaderStage::Fragment,
        "polydata.frag",
        load_template("polydata.frag").unwrap(),
    );
    let usage = key.features().usage;
    let mut builder = PipelineBuilder::new(key, vs, fs);
    builder.add_bind_group_layout("rendererUBO", ctx.renderer_bind_group_layout());
    builder.add_bind_group_layout("mapperUBO", ctx.mapper_bind_group_layout());
    builder.set_topology(usage.topology());
    builder
}

// ============================================================================
// Key Identity
// ============================================================================

#[test]
fn keys_are_injective_over_features() {
    let mut seen = HashSet::new();
    let mut rendered = HashSet::new();
    let mut count = 0;
    for bits in 0..=VertexAttributes::all().bits() {
        let attributes = VertexAttributes::from_bits_truncate(bits);
        for textures in 0..4 {
            for usage in USAGES {
                let k = key(attributes, textures, usage);
                rendered.insert(k.to_string());
                seen.insert(k);
                count += 1;
            }
        }
    }
    assert_eq!(seen.len(), count);
    assert_eq!(rendered.len(), count);
}

#[test]
fn equal_features_give_equal_keys() {
    let a = key(VertexAttributes::COLOR | VertexAttributes::NORMAL, 1, UsageClass::Triangles);
    let b = key(VertexAttributes::NORMAL | VertexAttributes::COLOR, 1, UsageClass::Triangles);
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "polydata+n+c+tx1+pt2|c:Bgra8Unorm|s1");
}

#[test]
fn encoder_state_separates_keys() {
    let features = PipelineFeatures {
        attributes: VertexAttributes::empty(),
        texture_count: 0,
        usage: UsageClass::Triangles,
    };
    let plain = features.key("polydata", color_state());
    let depth = features.key(
        "polydata",
        color_state().with_depth(DepthState {
            format: wgpu::TextureFormat::Depth32Float,
            compare: wgpu::CompareFunction::Less,
            write_enabled: true,
        }),
    );
    let msaa = features.key("polydata", color_state().with_sample_count(4));
    let rgba = features.key("polydata", EncoderState::color(wgpu::TextureFormat::Rgba8Unorm));

    let all: HashSet<_> = [&plain, &depth, &msaa, &rgba].into_iter().collect();
    assert_eq!(all.len(), 4);
    assert_eq!(
        depth.to_string(),
        "polydata+pt2|c:Bgra8Unorm|d:Depth32Float:Less:w|s1"
    );
}

#[test]
fn key_round_trips_its_features() {
    let features = PipelineFeatures {
        attributes: VertexAttributes::TCOORD,
        texture_count: 2,
        usage: UsageClass::LinesFromStrips,
    };
    assert_eq!(features.key("polydata", color_state()).features(), features);
}

// ============================================================================
// Building
// ============================================================================

#[test]
fn built_pipeline_records_layouts_and_topology() {
    let mut ctx = context(None);
    let encoder = RenderEncoder::new(color_state()).unwrap();
    let k = key(VertexAttributes::empty(), 0, UsageClass::Lines);

    let pipeline = ctx.create_pipeline(builder(&ctx, k.clone()), &encoder).unwrap();

    assert_eq!(pipeline.key(), &k);
    assert_eq!(pipeline.topology(), wgpu::PrimitiveTopology::LineList);
    assert_eq!(pipeline.bind_group_layout_index("rendererUBO"), Some(0));
    assert_eq!(pipeline.bind_group_layout_index("mapperUBO"), Some(1));
    assert!(pipeline.fragment_source().contains("struct FragmentOutput"));
    assert!(!pipeline.fragment_source().contains("//RenderEncoder::Impl"));

    let recorded = ctx.device().pipeline(pipeline.id()).unwrap();
    assert_eq!(recorded.bind_group_layouts.len(), 2);
    assert_eq!(recorded.color_formats, vec![wgpu::TextureFormat::Bgra8Unorm]);
    assert!(ctx.pipeline_cache().contains(&k));
}

#[test]
fn identical_stages_share_shader_modules() {
    let mut ctx = context(None);
    let encoder = RenderEncoder::new(color_state()).unwrap();

    let a = ctx
        .create_pipeline(builder(&ctx, key(VertexAttributes::empty(), 0, UsageClass::Lines)), &encoder)
        .unwrap();
    let b = ctx
        .create_pipeline(builder(&ctx, key(VertexAttributes::empty(), 0, UsageClass::Verts)), &encoder)
        .unwrap();

    assert_ne!(a.id(), b.id());
    assert_eq!(a.shader_modules(), b.shader_modules());
    assert_eq!(ctx.device().counters().shader_modules_created, 2);
    assert_eq!(ctx.shader_manager().module_count(), 2);
}

#[test]
fn fragment_without_encoder_markers_fails_to_build() {
    let mut ctx = context(None);
    let encoder = RenderEncoder::new(color_state()).unwrap();
    let k = key(VertexAttributes::empty(), 0, UsageClass::Triangles);

    let vs = ShaderDescription::new(
        ShaderStage::Vertex,
        "test.vert",
        ShaderTemplate::parse("test.vert", "@vertex fn main() {}\n").unwrap(),
    );
    let fs = ShaderDescription::new(
        ShaderStage::Fragment,
        "bare.frag",
        ShaderTemplate::parse("bare.frag", "@fragment fn main() {}\n").unwrap(),
    );
    let err = ctx
        .create_pipeline(PipelineBuilder::new(k.clone(), vs, fs), &encoder)
        .unwrap_err();

    assert!(matches!(err, RenderError::MissingMarker { .. }));
    assert!(!ctx.pipeline_cache().contains(&k));
    assert_eq!(ctx.device().counters().pipelines_created, 0);
}

#[test]
fn undeclared_input_is_a_composition_error() {
    let vs = ShaderDescription::new(
        ShaderStage::Vertex,
        "polydata.vert",
        load_template("polydata.vert").unwrap(),
    );
    let fs = ShaderDescription::new(
        ShaderStage::Fragment,
        "polydata.frag",
        load_template("polydata.frag").unwrap(),
    );
    let err = fs.input_declaration(&vs, "normalVC").unwrap_err();
    assert!(matches!(err, RenderError::UndeclaredInput { .. }));
}

// ============================================================================
// Cache Behaviour
// ============================================================================

#[test]
fn lookup_after_insert_hits() {
    let mut ctx = context(None);
    let encoder = RenderEncoder::new(color_state()).unwrap();
    let k = key(VertexAttributes::NORMAL, 0, UsageClass::Triangles);

    assert!(ctx.get_pipeline(&k).is_none());
    let built = ctx.create_pipeline(builder(&ctx, k.clone()), &encoder).unwrap();
    let found = ctx.get_pipeline(&k).unwrap();

    assert!(Arc::ptr_eq(&built, &found));
    let stats = ctx.pipeline_cache().stats();
    assert_eq!((stats.hits, stats.misses, stats.inserted), (1, 1, 1));
}

#[test]
fn unbounded_cache_keeps_every_pipeline() {
    let mut ctx = context(None);
    let encoder = RenderEncoder::new(color_state()).unwrap();
    for usage in USAGES {
        ctx.create_pipeline(builder(&ctx, key(VertexAttributes::empty(), 0, usage)), &encoder)
            .unwrap();
        ctx.end_frame();
    }
    assert_eq!(ctx.pipeline_cache().len(), USAGES.len());
    assert_eq!(ctx.pipeline_cache().stats().evicted, 0);
}

#[test]
fn bounded_cache_evicts_least_recently_used() {
    let mut ctx = context(Some(2));
    let encoder = RenderEncoder::new(color_state()).unwrap();
    let k0 = key(VertexAttributes::empty(), 0, UsageClass::Verts);
    let k1 = key(VertexAttributes::empty(), 0, UsageClass::Lines);
    let k2 = key(VertexAttributes::empty(), 0, UsageClass::Triangles);

    ctx.create_pipeline(builder(&ctx, k0.clone()), &encoder).unwrap();
    ctx.end_frame();
    ctx.create_pipeline(builder(&ctx, k1.clone()), &encoder).unwrap();
    ctx.end_frame();
    // Touch k0 so k1 becomes the oldest.
    assert!(ctx.get_pipeline(&k0).is_some());
    ctx.create_pipeline(builder(&ctx, k2.clone()), &encoder).unwrap();
    ctx.end_frame();

    assert_eq!(ctx.pipeline_cache().len(), 2);
    assert!(ctx.pipeline_cache().contains(&k0));
    assert!(!ctx.pipeline_cache().contains(&k1));
    assert!(ctx.pipeline_cache().contains(&k2));
    assert_eq!(ctx.device().counters().pipelines_destroyed, 1);
}

#[test]
fn pipelines_used_this_frame_survive_eviction() {
    let mut ctx = context(Some(1));
    let encoder = RenderEncoder::new(color_state()).unwrap();
    ctx.create_pipeline(builder(&ctx, key(VertexAttributes::empty(), 0, UsageClass::Verts)), &encoder)
        .unwrap();
    ctx.create_pipeline(builder(&ctx, key(VertexAttributes::empty(), 0, UsageClass::Lines)), &encoder)
        .unwrap();
    ctx.end_frame();
    assert_eq!(ctx.pipeline_cache().len(), 2);
}
