#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod resources;

pub use errors::{RenderError, Result};
pub use renderer::{
    DeviceContext, EncoderState, FrameReport, FullScreenQuad, GpuDevice, HeadlessDevice,
    MapperOptions, PolyDataMapper, RenderEncoder, RendererSettings, RendererUniforms, WgpuDevice,
};
pub use resources::{
    Actor, ArrayRef, CellArrayRef, ImageData, PolyData, PrimitiveType, Property, Renderable,
    Representation, Texture,
};
