//! Pipeline composition
//!
//! Turns the feature set of one draw into a compiled render pipeline:
//! - shader_template: marker-checked WGSL skeletons and line substitution
//! - shader_description: per-stage source with inter-stage locations
//! - shader_manager: embedded templates, minijinja chunks, module cache
//! - vertex: named vertex buffer bindings
//! - pipeline_key: feature flags and the derived cache key
//! - object: pipeline builder and the built pipeline
//! - cache: keyed pipeline cache with optional LRU bound

pub mod cache;
pub mod object;
pub mod pipeline_key;
pub mod shader_description;
pub mod shader_manager;
pub mod shader_template;
pub mod vertex;

pub use cache::{PipelineCache, PipelineCacheStats};
pub use object::{NamedLayout, PipelineBuilder, PipelineObject};
pub use pipeline_key::{PipelineFeatures, PipelineKey, VertexAttributes};
pub use shader_description::{InterfaceVariable, ShaderDescription, ShaderStage};
pub use shader_manager::{ShaderManager, load_template, render_chunk};
pub use shader_template::{ShaderTemplate, SubstitutePolicy, Substitution, substitute};
pub use vertex::VertexInput;
