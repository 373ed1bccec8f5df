//! Renderer-global uniform block (bind group 0).

use glam::Mat4;

use crate::errors::Result;
use crate::renderer::core::context::DeviceContext;
use crate::renderer::core::device::{BindGroupId, GpuDevice};
use crate::renderer::core::encoder::RenderEncoder;
use crate::renderer::core::resources::{UniformBuffer, UniformType};
use crate::resources::version_tracker::ModificationTime;

pub const RENDERER_UBO: &str = "rendererUBO";

/// World → device and world → view normal transforms shared by every draw.
#[derive(Debug)]
pub struct RendererUniforms {
    ubo: UniformBuffer,
}

impl Default for RendererUniforms {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererUniforms {
    #[must_use]
    pub fn new() -> Self {
        let mut uniforms = Self {
            ubo: UniformBuffer::new(
                RENDERER_UBO,
                0,
                0,
                &[
                    ("WCDCMatrix", UniformType::Mat4x4F32),
                    ("WCVCNormals", UniformType::Mat4x4F32),
                ],
            ),
        };
        if let Err(e) = uniforms.set_camera(Mat4::IDENTITY, Mat4::IDENTITY) {
            log::error!("Failed to initialize renderer uniforms: {e}");
        }
        uniforms
    }

    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) -> Result<()> {
        self.ubo.set_mat4("WCDCMatrix", &(projection * view))?;
        self.ubo.set_mat4("WCVCNormals", &view.inverse().transpose())
    }

    /// Uploads the block if the camera changed since the last upload.
    pub fn prepare<D: GpuDevice>(&mut self, ctx: &mut DeviceContext<D>) -> Result<bool> {
        let layout = ctx.renderer_bind_group_layout();
        self.ubo.send_if_needed(ctx.device_mut(), layout)
    }

    pub fn shader_code(&self) -> Result<String> {
        self.ubo.shader_code()
    }

    #[must_use]
    pub fn bind_group(&self) -> Option<BindGroupId> {
        self.ubo.bind_group()
    }

    #[must_use]
    pub fn send_time(&self) -> ModificationTime {
        self.ubo.send_time()
    }

    pub fn bind(&self, encoder: &mut RenderEncoder, index: u32) {
        if let Some(group) = self.ubo.bind_group() {
            encoder.set_bind_group(index, group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::headless::HeadlessDevice;
    use crate::renderer::settings::RendererSettings;

    #[test]
    fn uploads_only_after_camera_changes() {
        let mut ctx = DeviceContext::new(HeadlessDevice::new(), RendererSettings::default()).unwrap();
        let mut uniforms = RendererUniforms::new();
        assert!(uniforms.prepare(&mut ctx).unwrap());
        assert!(!uniforms.prepare(&mut ctx).unwrap());

        uniforms
            .set_camera(Mat4::from_translation(glam::Vec3::Z), Mat4::IDENTITY)
            .unwrap();
        assert!(uniforms.prepare(&mut ctx).unwrap());
        assert_eq!(ctx.device().counters().buffers_created, 1);
        assert_eq!(ctx.device().counters().buffer_writes, 1);
    }
}
