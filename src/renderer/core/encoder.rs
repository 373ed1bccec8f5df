//! Render encoder.
//!
//! Records the draw stream of one render pass as a flat list of
//! [`RenderCommand`]s. Recording is backend-independent; a backend replays
//! the list into its own pass object (see `WgpuDevice::execute`).
//!
//! The encoder also owns the output side of every pipeline drawn into it:
//! its [`EncoderState`] is part of each pipeline key, and
//! [`RenderEncoder::replace_shader_code`] writes the fragment outputs.

use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;

use super::device::{BindGroupId, BufferId, DepthState, RenderPipelineId};
use crate::errors::{RenderError, Result};
use crate::renderer::pipeline::shader_description::ShaderDescription;

pub const ENCODER_DEC_MARKER: &str = "//RenderEncoder::Dec";
pub const ENCODER_IMPL_MARKER: &str = "//RenderEncoder::Impl";

/// Output-format-affecting state of a render pass.
///
/// Doubles as the encoder's contribution to a pipeline key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncoderState {
    pub color_formats: SmallVec<[wgpu::TextureFormat; 2]>,
    pub depth: Option<DepthState>,
    pub sample_count: u32,
}

pub type EncoderKey = EncoderState;

impl EncoderState {
    /// One color target, no depth, no multisampling.
    #[must_use]
    pub fn color(format: wgpu::TextureFormat) -> Self {
        Self {
            color_formats: SmallVec::from_slice(&[format]),
            depth: None,
            sample_count: 1,
        }
    }

    #[must_use]
    pub fn with_depth(mut self, depth: DepthState) -> Self {
        self.depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }
}

impl fmt::Display for EncoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("|c")?;
        for format in &self.color_formats {
            write!(f, ":{format:?}")?;
        }
        if let Some(depth) = &self.depth {
            write!(
                f,
                "|d:{:?}:{:?}:{}",
                depth.format,
                depth.compare,
                if depth.write_enabled { "w" } else { "r" }
            )?;
        }
        write!(f, "|s{}", self.sample_count)
    }
}

/// One recorded encoder call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCommand {
    SetPipeline(RenderPipelineId),
    SetBindGroup { index: u32, group: BindGroupId },
    SetVertexBuffer { slot: u32, buffer: BufferId },
    Draw { vertices: Range<u32>, instances: Range<u32> },
}

/// Command recorder for one render pass.
#[derive(Debug, Clone)]
pub struct RenderEncoder {
    state: EncoderState,
    commands: Vec<RenderCommand>,
}

impl RenderEncoder {
    pub fn new(state: EncoderState) -> Result<Self> {
        if state.color_formats.is_empty() {
            return Err(RenderError::InvalidEncoder(
                "at least one color target is required".into(),
            ));
        }
        if state.sample_count == 0 {
            return Err(RenderError::InvalidEncoder(
                "sample count must be at least 1".into(),
            ));
        }
        Ok(Self {
            state,
            commands: Vec::new(),
        })
    }

    #[must_use]
    pub fn state(&self) -> &EncoderState {
        &self.state
    }

    /// The encoder's part of every pipeline key.
    #[must_use]
    pub fn pipeline_key(&self) -> EncoderKey {
        self.state.clone()
    }

    /// Declares `FragmentOutput` and writes `computedColor` to every target.
    pub fn replace_shader_code(&self, fragment: &mut ShaderDescription) -> Result<()> {
        let mut dec = vec!["struct FragmentOutput {".to_string()];
        let mut imp = vec!["  var output: FragmentOutput;".to_string()];
        for i in 0..self.state.color_formats.len() {
            dec.push(format!("  @location({i}) outColor{i}: vec4<f32>,"));
            imp.push(format!("  output.outColor{i} = computedColor;"));
        }
        dec.push("}".to_string());
        imp.push("  return output;".to_string());

        for (marker, lines) in [(ENCODER_DEC_MARKER, dec), (ENCODER_IMPL_MARKER, imp)] {
            if !fragment.replace(marker, &lines) {
                return Err(RenderError::MissingMarker {
                    stage: fragment.label().to_string(),
                    marker: marker.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.commands.push(RenderCommand::SetPipeline(pipeline));
    }

    pub fn set_bind_group(&mut self, index: u32, group: BindGroupId) {
        self.commands.push(RenderCommand::SetBindGroup { index, group });
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId) {
        self.commands
            .push(RenderCommand::SetVertexBuffer { slot, buffer });
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.commands.push(RenderCommand::Draw {
            vertices: first_vertex..first_vertex + vertex_count,
            instances: first_instance..first_instance + instance_count,
        });
    }

    #[must_use]
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Drains the recorded stream, leaving the encoder ready for a new pass.
    pub fn take_commands(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of recorded draw calls.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::Draw { .. }))
            .count()
    }
}
