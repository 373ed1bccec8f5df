//! Rendering
//!
//! - `core`: device abstraction, shared caches and command recording
//! - `pipeline`: shader composition and pipeline caching
//! - `mapper`: per-frame polydata drawing
//! - `fullscreen_quad`: textured full-screen passes
//!
//! A frame is one or more [`PolyDataMapper::render`] /
//! [`FullScreenQuad::render`] calls into a [`RenderEncoder`], followed by
//! [`DeviceContext::end_frame`].

pub mod core;
pub mod fullscreen_quad;
pub mod mapper;
pub mod pipeline;
pub mod renderer_uniforms;
pub mod settings;
pub mod texture_registry;

pub use self::core::{
    DeviceContext, EncoderState, GpuDevice, HeadlessDevice, RenderEncoder, WgpuDevice,
};
pub use fullscreen_quad::FullScreenQuad;
pub use mapper::{FrameReport, MapperOptions, MapperState, PolyDataMapper};
pub use renderer_uniforms::RendererUniforms;
pub use settings::RendererSettings;
pub use texture_registry::{TextureBinding, TextureRegistry};
