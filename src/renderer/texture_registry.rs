//! Per-mapper texture bindings.
//!
//! Each frame the mapper hands [`TextureRegistry::update`] the textures it
//! wants bound. Every candidate that is ready on the device is matched
//! against the existing bindings by device texture identity; a match keeps
//! its sampler and bind group, a new texture gets fresh ones. The binding
//! list is then rebuilt from the candidates, and bind groups of anything
//! left out are destroyed.

use std::sync::Arc;

use crate::errors::Result;
use crate::renderer::core::context::DeviceContext;
use crate::renderer::core::device::{
    BindGroupEntryDesc, BindGroupId, BindingResourceDesc, GpuDevice, SamplerDesc, SamplerId,
};
use crate::renderer::core::encoder::RenderEncoder;
use crate::renderer::core::resources::DeviceTexture;
use crate::resources::texture::Texture;

/// A texture, its sampler and the bind group joining them.
#[derive(Debug, Clone)]
pub struct TextureBinding {
    pub texture: Arc<DeviceTexture>,
    pub sampler: SamplerId,
    pub bind_group: BindGroupId,
}

#[derive(Debug, Default)]
pub struct TextureRegistry {
    bindings: Vec<TextureBinding>,
}

impl TextureRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the binding list from `candidates`. Returns the number of
    /// bind groups created.
    pub fn update<D: GpuDevice>(
        &mut self,
        ctx: &mut DeviceContext<D>,
        candidates: &[&Texture],
    ) -> Result<usize> {
        let mut previous = std::mem::take(&mut self.bindings);
        let mut created = 0;

        for source in candidates {
            let lookup = ctx.get_texture(source);
            let Some(texture) = lookup.ready() else {
                continue;
            };
            if self.bindings.iter().any(|b| Arc::ptr_eq(&b.texture, texture)) {
                continue;
            }
            if let Some(at) = previous.iter().position(|b| Arc::ptr_eq(&b.texture, texture)) {
                self.bindings.push(previous.swap_remove(at));
                continue;
            }

            match create_binding(ctx, source, texture) {
                Ok(binding) => self.bindings.push(binding),
                Err(e) => {
                    // Untouched entries stay tracked so the next update can sweep them.
                    self.bindings.append(&mut previous);
                    return Err(e);
                }
            }
            created += 1;
        }

        for stale in previous {
            log::debug!("Dropping texture binding #{}", stale.texture.source_id);
            ctx.device_mut().destroy_bind_group(stale.bind_group);
        }
        Ok(created)
    }

    #[must_use]
    pub fn bindings(&self) -> &[TextureBinding] {
        &self.bindings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binds texture `i` at group `first_index + i`.
    pub fn bind(&self, encoder: &mut RenderEncoder, first_index: u32) {
        for (i, binding) in self.bindings.iter().enumerate() {
            encoder.set_bind_group(first_index + i as u32, binding.bind_group);
        }
    }

    pub fn release<D: GpuDevice>(&mut self, device: &mut D) {
        for binding in self.bindings.drain(..) {
            device.destroy_bind_group(binding.bind_group);
        }
    }
}

fn create_binding<D: GpuDevice>(
    ctx: &mut DeviceContext<D>,
    source: &Texture,
    texture: &Arc<DeviceTexture>,
) -> Result<TextureBinding> {
    let sampler = ctx.get_sampler(SamplerDesc::interpolated(source.interpolate()))?;
    let layout = ctx.texture_bind_group_layout();
    let bind_group = ctx.device_mut().create_bind_group(
        &format!("Texture#{}", texture.source_id),
        layout,
        &[
            BindGroupEntryDesc {
                binding: 0,
                resource: BindingResourceDesc::TextureView(texture.id),
            },
            BindGroupEntryDesc {
                binding: 1,
                resource: BindingResourceDesc::Sampler(sampler),
            },
        ],
    )?;
    Ok(TextureBinding {
        texture: Arc::clone(texture),
        sampler,
        bind_group,
    })
}
