//! Vertex Input Assembly
//!
//! A named-attribute → buffer binding table for one draw. Attributes are kept
//! in a fixed canonical order (position, normal, color, texture coordinate)
//! regardless of the order they were added in, so vertex layouts, shader
//! locations and pipeline keys are reproducible.

use serde::Serialize;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::errors::Result;
use crate::renderer::core::device::VertexBufferLayoutDesc;
use crate::renderer::core::encoder::RenderEncoder;
use crate::renderer::core::resources::{GpuBuffer, format_to_wgsl_type};
use crate::renderer::pipeline::shader_manager::render_chunk;

pub const POSITION: &str = "vertexMC";
pub const NORMAL: &str = "normalMC";
pub const COLOR: &str = "colorVI";
pub const TCOORD: &str = "tcoord";

const CANONICAL_ORDER: [&str; 4] = [POSITION, NORMAL, COLOR, TCOORD];

fn rank(name: &str) -> usize {
    CANONICAL_ORDER
        .iter()
        .position(|n| *n == name)
        .unwrap_or(CANONICAL_ORDER.len())
}

#[derive(Debug, Clone)]
struct AttributeBinding {
    name: String,
    buffer: Arc<GpuBuffer>,
}

#[derive(Serialize)]
struct AttributeContext<'a> {
    location: u32,
    name: &'a str,
    wgsl_type: &'static str,
}

#[derive(Serialize)]
struct VertexInputContext<'a> {
    attributes: Vec<AttributeContext<'a>>,
}

#[derive(Debug, Clone, Default)]
pub struct VertexInput {
    bindings: SmallVec<[AttributeBinding; 4]>,
}

impl VertexInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `buffer` to `name`, replacing any previous binding.
    pub fn add_buffer(&mut self, name: &str, buffer: Arc<GpuBuffer>) {
        if let Some(existing) = self.bindings.iter_mut().find(|b| b.name == name) {
            existing.buffer = buffer;
            return;
        }
        let at = self
            .bindings
            .iter()
            .position(|b| (rank(&b.name), b.name.as_str()) > (rank(name), name))
            .unwrap_or(self.bindings.len());
        self.bindings.insert(
            at,
            AttributeBinding {
                name: name.to_string(),
                buffer,
            },
        );
    }

    /// Returns whether a binding was removed.
    pub fn remove_buffer_if_present(&mut self, name: &str) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.name != name);
        self.bindings.len() != before
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name)
    }

    #[must_use]
    pub fn buffer(&self, name: &str) -> Option<&Arc<GpuBuffer>> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.buffer)
    }

    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.bindings.len()
    }

    /// Attribute names in binding order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Number of vertices the position buffer holds.
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.buffer(POSITION)
            .map_or(0, |b| (b.size / b.stride.max(1)) as u32)
    }

    /// One buffer per attribute, shader location = slot.
    #[must_use]
    pub fn vertex_layouts(&self) -> Vec<VertexBufferLayoutDesc> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(location, b)| VertexBufferLayoutDesc {
                array_stride: b.buffer.stride,
                attributes: vec![wgpu::VertexAttribute {
                    format: b.buffer.format,
                    offset: 0,
                    shader_location: location as u32,
                }],
            })
            .collect()
    }

    /// `struct VertexInput` declaration matching [`vertex_layouts`](Self::vertex_layouts).
    pub fn shader_code(&self) -> Result<String> {
        let attributes = self
            .bindings
            .iter()
            .enumerate()
            .map(|(location, b)| AttributeContext {
                location: location as u32,
                name: &b.name,
                wgsl_type: format_to_wgsl_type(b.buffer.format),
            })
            .collect();
        render_chunk("vertex_input", VertexInputContext { attributes })
    }

    pub fn bind(&self, encoder: &mut RenderEncoder) {
        for (slot, b) in self.bindings.iter().enumerate() {
            encoder.set_vertex_buffer(slot as u32, b.buffer.id);
        }
    }
}
