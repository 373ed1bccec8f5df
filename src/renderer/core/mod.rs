//! Device-facing core.
//!
//! - `device`: the [`GpuDevice`] trait, typed ids and descriptors
//! - `headless` / `wgpu_device`: the two backends
//! - `context`: [`DeviceContext`], owner of all shared caches
//! - `encoder`: render command recording
//! - `resources`: buffer, texture and uniform caches

pub mod context;
pub mod device;
pub mod encoder;
pub mod headless;
pub mod resources;
pub mod wgpu_device;

pub use context::DeviceContext;
pub use device::{
    BindGroupId, BindGroupLayoutId, BufferId, DepthState, GpuDevice, RenderPipelineId, SamplerDesc,
    SamplerId, ShaderModuleId, TextureId,
};
pub use encoder::{EncoderKey, EncoderState, RenderCommand, RenderEncoder};
pub use headless::{DeviceCounters, HeadlessDevice};
pub use resources::ResourceState;
pub use wgpu_device::WgpuDevice;
