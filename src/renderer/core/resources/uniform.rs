//! Uniform blocks.
//!
//! A [`UniformBuffer`] owns a CPU byte image laid out with WGSL uniform
//! alignment rules, the matching WGSL struct declaration, and, once sent,
//! a device buffer plus its bind group.
//!
//! Entries are stably sorted by alignment (largest first), with `vec3`
//! members last among the 16-byte aligned ones, so that the scalars after
//! them pack into the last `vec3` tail. The layout is frozen by the first
//! value write.

use glam::Mat4;
use serde::Serialize;
use std::cmp::Reverse;

use crate::errors::{RenderError, Result};
use crate::renderer::core::device::{
    BindGroupEntryDesc, BindGroupId, BindGroupLayoutId, BindingResourceDesc, BufferId, GpuDevice,
};
use crate::renderer::pipeline::shader_manager::render_chunk;
use crate::resources::version_tracker::ModificationTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    F32,
    I32,
    U32,
    Vec2F32,
    Vec3F32,
    Vec4F32,
    Mat4x4F32,
}

impl UniformType {
    #[must_use]
    pub fn align(self) -> u64 {
        match self {
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::Vec2F32 => 8,
            Self::Vec3F32 | Self::Vec4F32 | Self::Mat4x4F32 => 16,
        }
    }

    #[must_use]
    pub fn size(self) -> u64 {
        match self {
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::Vec2F32 => 8,
            Self::Vec3F32 => 12,
            Self::Vec4F32 => 16,
            Self::Mat4x4F32 => 64,
        }
    }

    #[must_use]
    pub fn wgsl_type(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::Vec2F32 => "vec2<f32>",
            Self::Vec3F32 => "vec3<f32>",
            Self::Vec4F32 => "vec4<f32>",
            Self::Mat4x4F32 => "mat4x4<f32>",
        }
    }
}

#[derive(Debug, Clone)]
struct UniformEntry {
    name: String,
    ty: UniformType,
    offset: u64,
}

#[derive(Serialize)]
struct EntryContext<'a> {
    name: &'a str,
    wgsl_type: &'a str,
}

#[derive(Serialize)]
struct BlockContext<'a> {
    name: &'a str,
    struct_name: String,
    group: u32,
    binding: u32,
    entries: Vec<EntryContext<'a>>,
}

#[derive(Debug)]
pub struct UniformBuffer {
    name: String,
    group: u32,
    binding: u32,
    entries: Vec<UniformEntry>,
    data: Vec<u8>,
    frozen: bool,
    dirty: bool,
    send_time: ModificationTime,
    buffer: Option<BufferId>,
    bind_group: Option<BindGroupId>,
}

impl UniformBuffer {
    pub fn new(name: &str, group: u32, binding: u32, entries: &[(&str, UniformType)]) -> Self {
        let mut ubo = Self {
            name: name.to_string(),
            group,
            binding,
            entries: Vec::with_capacity(entries.len()),
            data: Vec::new(),
            frozen: false,
            dirty: true,
            send_time: ModificationTime::NEVER,
            buffer: None,
            bind_group: None,
        };
        for &(entry, ty) in entries {
            ubo.push_entry(entry, ty);
        }
        ubo.layout();
        ubo
    }

    /// Adds an entry. Fails once any value has been written.
    pub fn add_entry(&mut self, name: &str, ty: UniformType) -> Result<()> {
        if self.frozen {
            return Err(RenderError::UniformLayoutFrozen(self.name.clone()));
        }
        self.push_entry(name, ty);
        self.layout();
        Ok(())
    }

    fn push_entry(&mut self, name: &str, ty: UniformType) {
        if self.entries.iter().any(|e| e.name == name) {
            return;
        }
        self.entries.push(UniformEntry {
            name: name.to_string(),
            ty,
            offset: 0,
        });
    }

    fn layout(&mut self) {
        self.entries
            .sort_by_key(|e| (Reverse(e.ty.align()), e.ty == UniformType::Vec3F32));
        let mut offset: u64 = 0;
        for entry in &mut self.entries {
            offset = offset.next_multiple_of(entry.ty.align());
            entry.offset = offset;
            offset += entry.ty.size();
        }
        self.data = vec![0; offset.next_multiple_of(16).max(16) as usize];
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn group(&self) -> u32 {
        self.group
    }

    /// Size of the byte image, a multiple of 16.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte offset of `name`.
    #[must_use]
    pub fn offset(&self, name: &str) -> Option<u64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.offset)
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| RenderError::UnknownUniform(name.to_string()))?;
        if entry.ty.size() != bytes.len() as u64 {
            return Err(RenderError::UniformSizeMismatch {
                name: name.to_string(),
                expected: entry.ty.size() as usize,
                actual: bytes.len(),
            });
        }
        self.frozen = true;
        let start = entry.offset as usize;
        let slot = &mut self.data[start..start + bytes.len()];
        if slot != bytes {
            slot.copy_from_slice(bytes);
            self.dirty = true;
        }
        Ok(())
    }

    pub fn set_value(&mut self, name: &str, value: f32) -> Result<()> {
        self.write(name, bytemuck::bytes_of(&value))
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.write(name, bytemuck::bytes_of(&value))
    }

    pub fn set_uint(&mut self, name: &str, value: u32) -> Result<()> {
        self.write(name, bytemuck::bytes_of(&value))
    }

    pub fn set_array(&mut self, name: &str, values: &[f32]) -> Result<()> {
        self.write(name, bytemuck::cast_slice(values))
    }

    pub fn set_mat4(&mut self, name: &str, value: &Mat4) -> Result<()> {
        self.write(name, bytemuck::cast_slice(&value.to_cols_array()))
    }

    /// WGSL struct and `var<uniform>` declaration.
    pub fn shader_code(&self) -> Result<String> {
        render_chunk(
            "uniform_block",
            BlockContext {
                name: &self.name,
                struct_name: format!("{}Struct", self.name),
                group: self.group,
                binding: self.binding,
                entries: self
                    .entries
                    .iter()
                    .map(|e| EntryContext {
                        name: &e.name,
                        wgsl_type: e.ty.wgsl_type(),
                    })
                    .collect(),
            },
        )
    }

    /// Uploads the byte image, creating buffer and bind group on first use.
    pub fn send<D: GpuDevice>(&mut self, device: &mut D, layout: BindGroupLayoutId) -> Result<()> {
        match self.buffer {
            Some(buffer) => device.write_buffer(buffer, 0, &self.data)?,
            None => {
                let buffer = device.create_buffer(
                    &self.name,
                    wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    &self.data,
                )?;
                let group = device.create_bind_group(
                    &self.name,
                    layout,
                    &[BindGroupEntryDesc {
                        binding: self.binding,
                        resource: BindingResourceDesc::Buffer(buffer),
                    }],
                )?;
                self.buffer = Some(buffer);
                self.bind_group = Some(group);
            }
        }
        self.dirty = false;
        self.send_time = ModificationTime::tick();
        Ok(())
    }

    /// Sends only if a value changed since the last send. Returns whether it did.
    pub fn send_if_needed<D: GpuDevice>(
        &mut self,
        device: &mut D,
        layout: BindGroupLayoutId,
    ) -> Result<bool> {
        if !self.dirty && self.buffer.is_some() {
            return Ok(false);
        }
        self.send(device, layout)?;
        Ok(true)
    }

    /// Clock value of the last send, [`ModificationTime::NEVER`] before the first.
    #[must_use]
    pub fn send_time(&self) -> ModificationTime {
        self.send_time
    }

    #[must_use]
    pub fn bind_group(&self) -> Option<BindGroupId> {
        self.bind_group
    }

    pub fn release<D: GpuDevice>(&mut self, device: &mut D) {
        if let Some(group) = self.bind_group.take() {
            device.destroy_bind_group(group);
        }
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer);
        }
        self.send_time = ModificationTime::NEVER;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> UniformBuffer {
        UniformBuffer::new(
            "mapperUBO",
            1,
            0,
            &[
                ("Opacity", UniformType::F32),
                ("DiffuseColor", UniformType::Vec3F32),
                ("MCWCMatrix", UniformType::Mat4x4F32),
                ("Flags", UniformType::U32),
            ],
        )
    }

    #[test]
    fn entries_sorted_by_alignment() {
        let ubo = block();
        assert_eq!(ubo.offset("MCWCMatrix"), Some(0));
        assert_eq!(ubo.offset("DiffuseColor"), Some(64));
        // f32 packs into the vec3 tail
        assert_eq!(ubo.offset("Opacity"), Some(76));
        assert_eq!(ubo.offset("Flags"), Some(80));
        assert_eq!(ubo.size(), 96);
    }

    #[test]
    fn vec3_tail_follows_wider_members() {
        let ubo = UniformBuffer::new(
            "u",
            0,
            0,
            &[
                ("Color", UniformType::Vec3F32),
                ("Tint", UniformType::Vec4F32),
                ("Power", UniformType::F32),
            ],
        );
        assert_eq!(ubo.offset("Tint"), Some(0));
        assert_eq!(ubo.offset("Color"), Some(16));
        assert_eq!(ubo.offset("Power"), Some(28));
        assert_eq!(ubo.size(), 32);
    }

    #[test]
    fn size_mismatch_and_unknown_names() {
        let mut ubo = block();
        assert!(matches!(
            ubo.set_array("DiffuseColor", &[1.0, 0.0]),
            Err(RenderError::UniformSizeMismatch { expected: 12, actual: 8, .. })
        ));
        assert!(matches!(ubo.set_value("Missing", 1.0), Err(RenderError::UnknownUniform(_))));
    }

    #[test]
    fn layout_freezes_on_first_write() {
        let mut ubo = block();
        ubo.add_entry("SpecularPower", UniformType::F32).unwrap();
        ubo.set_value("Opacity", 0.5).unwrap();
        assert!(matches!(
            ubo.add_entry("Late", UniformType::F32),
            Err(RenderError::UniformLayoutFrozen(_))
        ));
        let at = ubo.offset("Opacity").unwrap() as usize;
        assert_eq!(&ubo.data()[at..at + 4], &0.5_f32.to_le_bytes());
    }

    #[test]
    fn generated_declaration() {
        let code = block().shader_code().unwrap();
        assert!(code.contains("struct mapperUBOStruct {"));
        assert!(code.contains("  MCWCMatrix: mat4x4<f32>,"));
        assert!(code.contains("@group(1) @binding(0) var<uniform> mapperUBO: mapperUBOStruct;"));
        let matrix = code.find("MCWCMatrix").unwrap();
        let opacity = code.find("Opacity").unwrap();
        assert!(matrix < opacity);
    }
}
