//! Texture & Sampler Tests
//!
//! Tests for:
//! - Device texture readiness (Pending / Ready / Failed)
//! - Re-upload on image change and idle release
//! - TextureRegistry mark-and-sweep keeping bind groups by identity
//! - Failed bind group creation leaving existing bindings tracked
//! - Sampler sharing per filter mode
//! - FullScreenQuad view bind groups

use std::sync::Arc;

use tessera::renderer::core::ResourceState;
use tessera::renderer::core::device::{BindingResourceDesc, GpuDevice, SamplerDesc};
use tessera::renderer::core::resources::ViewHandle;
use tessera::renderer::{
    DeviceContext, EncoderState, FullScreenQuad, HeadlessDevice, RenderEncoder, RendererSettings,
    TextureRegistry,
};
use tessera::resources::{ImageData, Texture};

fn context() -> DeviceContext<HeadlessDevice> {
    DeviceContext::new(HeadlessDevice::new(), RendererSettings::default()).unwrap()
}

fn solid(r: u8) -> Texture {
    Texture::from_image(ImageData::new(2, 2, [r, 0, 0, 255].repeat(4)))
}

// ============================================================================
// Device Texture Readiness
// ============================================================================

#[test]
fn texture_without_image_is_pending() {
    let mut ctx = context();
    let texture = Texture::new();
    assert_eq!(ctx.get_texture(&texture).state, ResourceState::Pending);

    texture.set_loading();
    assert_eq!(ctx.get_texture(&texture).state, ResourceState::Pending);
    assert_eq!(ctx.device().counters().textures_created, 0);

    texture.set_image(ImageData::new(1, 1, vec![1, 2, 3, 4]));
    let lookup = ctx.get_texture(&texture);
    assert_eq!(lookup.state, ResourceState::Ready);
    let uploaded = ctx.device().texture(lookup.ready().unwrap().id).unwrap();
    assert_eq!(uploaded.data, vec![1, 2, 3, 4]);
}

#[test]
fn inconsistent_image_fails_until_changed() {
    let mut ctx = context();
    let texture = Texture::from_image(ImageData::new(2, 2, vec![0; 3]));

    assert_eq!(ctx.get_texture(&texture).state, ResourceState::Failed);
    assert_eq!(ctx.get_texture(&texture).state, ResourceState::Failed);
    assert_eq!(ctx.texture_cache().stats().failed, 1);

    texture.set_image(ImageData::new(1, 1, vec![0; 4]));
    assert_eq!(ctx.get_texture(&texture).state, ResourceState::Ready);
}

#[test]
fn same_source_shares_one_device_texture() {
    let mut ctx = context();
    let texture = solid(10);
    let a = ctx.get_texture(&texture).texture.unwrap();
    let b = ctx.get_texture(&texture.clone()).texture.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(ctx.device().counters().textures_created, 1);
}

#[test]
fn changed_image_is_reuploaded_and_old_released() {
    let mut ctx = context();
    let texture = solid(10);
    let old = ctx.get_texture(&texture).texture.unwrap();

    texture.set_image(ImageData::new(1, 1, vec![9; 4]));
    let new = ctx.get_texture(&texture).texture.unwrap();
    assert_ne!(old.id, new.id);

    drop(old);
    ctx.end_frame();
    assert_eq!(ctx.device().counters().textures_destroyed, 1);
}

#[test]
fn idle_textures_are_released() {
    let mut ctx = context();
    let texture = solid(10);
    let _ = ctx.get_texture(&texture);
    ctx.end_frame();
    assert_eq!(ctx.texture_cache().len(), 1);

    // Not requested during this frame.
    ctx.end_frame();
    assert_eq!(ctx.texture_cache().len(), 0);
    assert_eq!(ctx.device().counters().textures_destroyed, 1);
}

// ============================================================================
// Registry Mark-and-Sweep
// ============================================================================

#[test]
fn omitted_texture_is_swept_and_others_keep_bind_groups() {
    let mut ctx = context();
    let mut registry = TextureRegistry::new();
    let textures = [solid(1), solid(2), solid(3)];

    let created = registry.update(&mut ctx, &[&textures[0], &textures[1], &textures[2]]).unwrap();
    assert_eq!(created, 3);
    let before: Vec<_> = registry.bindings().iter().map(|b| b.bind_group).collect();

    let created = registry.update(&mut ctx, &[&textures[0], &textures[2]]).unwrap();
    assert_eq!(created, 0);
    assert_eq!(registry.len(), 2);
    let after: Vec<_> = registry.bindings().iter().map(|b| b.bind_group).collect();
    assert_eq!(after, vec![before[0], before[2]]);
    assert_eq!(ctx.device().counters().bind_groups_destroyed, 1);
}

#[test]
fn unchanged_candidates_cause_no_churn() {
    let mut ctx = context();
    let mut registry = TextureRegistry::new();
    let texture = solid(7);

    registry.update(&mut ctx, &[&texture]).unwrap();
    let groups = ctx.device().counters().bind_groups_created;
    for _ in 0..5 {
        assert_eq!(registry.update(&mut ctx, &[&texture]).unwrap(), 0);
        ctx.end_frame();
    }
    assert_eq!(ctx.device().counters().bind_groups_created, groups);
    assert_eq!(registry.len(), 1);
}

#[test]
fn pending_candidates_are_skipped_until_ready() {
    let mut ctx = context();
    let mut registry = TextureRegistry::new();
    let texture = Texture::new();
    texture.set_loading();

    registry.update(&mut ctx, &[&texture]).unwrap();
    assert!(registry.is_empty());

    texture.set_image(ImageData::new(1, 1, vec![0; 4]));
    registry.update(&mut ctx, &[&texture]).unwrap();
    assert_eq!(registry.len(), 1);
}

#[test]
fn failed_bind_group_keeps_unvisited_bindings_tracked() {
    let mut ctx = context();
    let mut registry = TextureRegistry::new();
    let kept = solid(1);
    let dropped = solid(2);
    registry.update(&mut ctx, &[&kept, &dropped]).unwrap();

    let broken = solid(3);
    let gone = ctx.get_texture(&broken).texture.unwrap();
    ctx.device_mut().destroy_texture(gone.id);

    assert!(registry.update(&mut ctx, &[&kept, &broken]).is_err());
    assert_eq!(registry.len(), 2);
    assert_eq!(ctx.device().counters().bind_groups_destroyed, 0);
    assert_eq!(ctx.device().live_bind_groups(), 2);

    registry.update(&mut ctx, &[&kept]).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(ctx.device().counters().bind_groups_destroyed, 1);
}

#[test]
fn bind_group_holds_view_then_sampler() {
    let mut ctx = context();
    let mut registry = TextureRegistry::new();
    let texture = solid(4);
    texture.set_interpolate(false);
    registry.update(&mut ctx, &[&texture]).unwrap();

    let binding = &registry.bindings()[0];
    let group = ctx.device().bind_group(binding.bind_group).unwrap();
    assert_eq!(group.entries[0].binding, 0);
    assert_eq!(
        group.entries[0].resource,
        BindingResourceDesc::TextureView(binding.texture.id)
    );
    assert_eq!(group.entries[1].resource, BindingResourceDesc::Sampler(binding.sampler));
    assert_eq!(
        ctx.device().sampler(binding.sampler),
        Some(&SamplerDesc::interpolated(false))
    );
}

#[test]
fn samplers_are_shared_per_filter_mode() {
    let mut ctx = context();
    let mut registry = TextureRegistry::new();
    let textures = [solid(1), solid(2)];
    registry.update(&mut ctx, &[&textures[0], &textures[1]]).unwrap();
    assert_eq!(ctx.device().counters().samplers_created, 1);

    let nearest = solid(3);
    nearest.set_interpolate(false);
    registry.update(&mut ctx, &[&textures[0], &textures[1], &nearest]).unwrap();
    assert_eq!(ctx.device().counters().samplers_created, 2);
}

// ============================================================================
// Full-screen Quad Views
// ============================================================================

#[test]
fn quad_rebuilds_view_bind_group_only_on_texture_change() {
    let mut ctx = context();
    let first = ctx.get_texture(&solid(1)).texture.unwrap();
    let second = ctx.get_texture(&solid(2)).texture.unwrap();

    let view = ViewHandle::new("Texture0", first.id);
    let mut quad = FullScreenQuad::new("blit").unwrap();
    quad.add_texture_view(view.clone());

    assert_eq!(quad.update_texture_views(&mut ctx).unwrap(), 1);
    assert_eq!(quad.update_texture_views(&mut ctx).unwrap(), 0);

    view.set_texture(second.id);
    assert_eq!(quad.update_texture_views(&mut ctx).unwrap(), 1);
    assert_eq!(ctx.device().counters().bind_groups_destroyed, 1);
}

#[test]
fn quad_draws_six_vertices_with_cached_pipeline() {
    let mut ctx = context();
    let texture = ctx.get_texture(&solid(1)).texture.unwrap();
    let mut quad = FullScreenQuad::new("blit").unwrap();
    quad.add_texture_view(ViewHandle::new("Texture0", texture.id));
    let mut encoder =
        RenderEncoder::new(EncoderState::color(wgpu::TextureFormat::Bgra8Unorm)).unwrap();

    quad.render(&mut ctx, &mut encoder).unwrap();
    quad.render(&mut ctx, &mut encoder).unwrap();

    assert_eq!(encoder.draw_count(), 2);
    assert_eq!(ctx.device().counters().pipelines_created, 1);
    let pipeline = quad.pipeline().unwrap();
    assert_eq!(pipeline.key().to_string(), "blit+tx1+pt2|c:Bgra8Unorm|s1");
    assert!(pipeline.vertex_source().contains("@location(0) tcoordVS: vec2<f32>,"));
    assert!(pipeline.fragment_source().contains("var Texture0: texture_2d<f32>;"));
}
