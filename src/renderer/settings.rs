//! Renderer Settings
//!
//! Device-wide cache policy and diagnostics switches.
//!
//! ```rust,ignore
//! use tessera::renderer::RendererSettings;
//!
//! let settings = RendererSettings {
//!     pipeline_cache_capacity: Some(256),
//!     debug_shaders: true,
//!     ..Default::default()
//! };
//! ```

/// Configuration of a [`DeviceContext`](crate::renderer::core::DeviceContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererSettings {
    /// Upper bound on cached pipelines, enforced at the end of each frame by
    /// evicting least-recently-used entries. `None` keeps every pipeline for
    /// the lifetime of the context.
    pub pipeline_cache_capacity: Option<usize>,

    /// Device textures nobody requested for this many frames are released.
    /// Values below 1 behave as 1.
    pub texture_idle_frames: u64,

    /// Trace-log every generated shader with line numbers before compiling.
    pub debug_shaders: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            pipeline_cache_capacity: None,
            texture_idle_frames: 1,
            debug_shaders: false,
        }
    }
}
