//! Strongly-typed pipeline cache keys.
//!
//! A [`PipelineKey`] names a compiled pipeline by the features that shape it:
//! a base tag chosen by the producer, the optional vertex attributes, the
//! texture count, the usage class and the render encoder's output state.
//! Keys derive `Hash`/`Eq` field by field, so two keys compare equal exactly
//! when every feature matches. The `Display` form is the compact human
//! readable tag used in labels and logs, e.g. `polydata+n+c+tx1+pt2|c:Bgra8Unorm|s1`.

use bitflags::bitflags;
use std::borrow::Cow;
use std::fmt;

use crate::renderer::core::encoder::EncoderKey;
use crate::renderer::core::resources::UsageClass;

bitflags! {
    /// Optional vertex attributes, in canonical key order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertexAttributes: u8 {
        const NORMAL = 1 << 0;
        const COLOR  = 1 << 1;
        const TCOORD = 1 << 2;
    }
}

/// Everything about a draw that changes the compiled pipeline, minus the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineFeatures {
    pub attributes: VertexAttributes,
    pub texture_count: u32,
    pub usage: UsageClass,
}

impl PipelineFeatures {
    #[must_use]
    pub fn key(&self, base: impl Into<Cow<'static, str>>, encoder: EncoderKey) -> PipelineKey {
        PipelineKey {
            base: base.into(),
            attributes: self.attributes,
            texture_count: self.texture_count,
            usage: self.usage,
            encoder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub base: Cow<'static, str>,
    pub attributes: VertexAttributes,
    pub texture_count: u32,
    pub usage: UsageClass,
    pub encoder: EncoderKey,
}

impl PipelineKey {
    #[must_use]
    pub fn features(&self) -> PipelineFeatures {
        PipelineFeatures {
            attributes: self.attributes,
            texture_count: self.texture_count,
            usage: self.usage,
        }
    }
}

impl fmt::Display for PipelineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        for (flag, tag) in [
            (VertexAttributes::NORMAL, "+n"),
            (VertexAttributes::COLOR, "+c"),
            (VertexAttributes::TCOORD, "+t"),
        ] {
            if self.attributes.contains(flag) {
                f.write_str(tag)?;
            }
        }
        if self.texture_count > 0 {
            write!(f, "+tx{}", self.texture_count)?;
        }
        write!(f, "+{}{}", self.usage, self.encoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::encoder::EncoderState;

    fn encoder() -> EncoderKey {
        EncoderState::color(wgpu::TextureFormat::Bgra8Unorm)
    }

    #[test]
    fn display_uses_canonical_order() {
        let features = PipelineFeatures {
            attributes: VertexAttributes::TCOORD | VertexAttributes::NORMAL,
            texture_count: 2,
            usage: UsageClass::Triangles,
        };
        assert_eq!(
            features.key("polydata", encoder()).to_string(),
            "polydata+n+t+tx2+pt2|c:Bgra8Unorm|s1"
        );
    }

    #[test]
    fn plain_surface_has_no_feature_suffixes() {
        let features = PipelineFeatures {
            attributes: VertexAttributes::empty(),
            texture_count: 0,
            usage: UsageClass::Triangles,
        };
        assert_eq!(features.key("polydata", encoder()).to_string(), "polydata+pt2|c:Bgra8Unorm|s1");
    }

    #[test]
    fn encoder_state_is_part_of_identity() {
        let features = PipelineFeatures {
            attributes: VertexAttributes::COLOR,
            texture_count: 0,
            usage: UsageClass::Lines,
        };
        let a = features.key("polydata", encoder());
        let b = features.key("polydata", encoder().with_sample_count(4));
        assert_ne!(a, b);
        assert_eq!(a.features(), b.features());
    }
}
