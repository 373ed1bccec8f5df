//! Error Types
//!
//! This module defines the error types used throughout the renderer core.
//!
//! # Overview
//!
//! The main error type [`RenderError`] covers the failure modes that must be
//! surfaced to the caller:
//! - Shader composition errors (undeclared inter-stage variables, bad templates)
//! - Buffer packing errors (unsupported formats, malformed connectivity)
//! - Uniform block misuse
//! - Backend device failures
//!
//! Missing optional data (no normals, no texture coordinates, no textures) and
//! resources that are not ready yet are *not* errors. Callers observe those as
//! absent bindings or a [`ResourceState::Pending`] value and retry next frame.
//!
//! [`ResourceState::Pending`]: crate::renderer::core::resources::ResourceState::Pending
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, RenderError>`.

use thiserror::Error;

/// The main error type for the renderer core.
#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // Shader Composition Errors
    // ========================================================================
    /// A stage asked for an input that the producing stage never declared.
    #[error("Shader composition error in {stage} stage: input '{name}' was never declared as an output of the {producer} stage")]
    UndeclaredInput {
        /// Stage requesting the input
        stage: String,
        /// Stage expected to produce it
        producer: String,
        /// Inter-stage variable name
        name: String,
    },

    /// An output was declared twice with different types.
    #[error("Shader composition error in {stage} stage: output '{name}' already declared as {existing}, cannot redeclare as {requested}")]
    ConflictingOutput {
        /// Stage declaring the output
        stage: String,
        /// Inter-stage variable name
        name: String,
        /// Type recorded by the first declaration
        existing: String,
        /// Type of the rejected declaration
        requested: String,
    },

    /// A mandatory substitution marker is missing from a shader stage.
    #[error("Shader composition error in {stage} stage: marker '{marker}' not found")]
    MissingMarker {
        /// Stage being composed
        stage: String,
        /// The missing marker
        marker: String,
    },

    /// A shader template declares the same marker more than once.
    #[error("Shader template '{template}' declares marker '{marker}' more than once")]
    DuplicateMarker {
        /// Template name
        template: String,
        /// Marker found twice
        marker: String,
    },

    /// The requested embedded shader template does not exist.
    #[error("Shader template not found: {0}")]
    TemplateNotFound(String),

    /// Rendering a generated shader chunk failed.
    #[error("Shader template error: {0}")]
    Template(#[from] minijinja::Error),

    // ========================================================================
    // Buffer Errors
    // ========================================================================
    /// The vertex format cannot be produced by the packer.
    #[error("Unsupported vertex format: {0:?}")]
    UnsupportedVertexFormat(wgpu::VertexFormat),

    /// The buffer source has no values (or packs to zero vertices).
    #[error("Buffer source '{0}' is empty")]
    EmptySource(String),

    /// A cell references a tuple beyond the end of the source array.
    #[error("Cell connectivity references tuple {index} but the source only has {count}")]
    InvalidCellIndex {
        /// The referenced tuple
        index: usize,
        /// Number of tuples in the source
        count: usize,
    },

    // ========================================================================
    // Uniform Errors
    // ========================================================================
    /// No uniform entry exists with the given name.
    #[error("Unknown uniform entry '{0}'")]
    UnknownUniform(String),

    /// The value written does not match the entry's byte size.
    #[error("Uniform entry '{name}' expects {expected} bytes, got {actual}")]
    UniformSizeMismatch {
        /// Entry name
        name: String,
        /// Byte size of the entry type
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// Entries cannot be added once values have been written.
    #[error("Uniform block '{0}' layout is frozen")]
    UniformLayoutFrozen(String),

    // ========================================================================
    // Texture & Encoder Errors
    // ========================================================================
    /// Image data does not match its declared dimensions.
    #[error("Invalid texture image: {0}")]
    InvalidImage(String),

    /// The render encoder configuration cannot produce a pipeline.
    #[error("Invalid render encoder configuration: {0}")]
    InvalidEncoder(String),

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The backend rejected an operation (unknown id, out-of-bounds write...).
    #[error("Device error: {0}")]
    Device(String),
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
