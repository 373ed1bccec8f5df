//! Source data model
//!
//! CPU-side entities the renderer consumes. None of these depend on a GPU:
//! - DataArray / CellArray: shared numeric tuples and connectivity
//! - PolyData: points, cells and attribute arrays
//! - Property / Actor / Texture: appearance and placement
//! - ColorMapping: scalar-to-color conversion
//! - Renderable: what a mapper draws
//!
//! Every entity carries a stamp from the process-wide modification clock in
//! [`version_tracker`].

pub mod actor;
pub mod cell_array;
pub mod color_mapping;
pub mod data_array;
pub mod polydata;
pub mod property;
pub mod renderable;
pub mod texture;
pub mod version_tracker;

pub use actor::Actor;
pub use cell_array::{CellArrayRef, CellIter};
pub use color_mapping::{ColorMapping, LookupTable, ScalarMode};
pub use data_array::{ArrayRef, DataValues};
pub use polydata::{CellData, PointData, PolyData, PrimitiveType};
pub use property::{Property, PropertyValues, Representation};
pub use renderable::Renderable;
pub use texture::{ImageData, Texture, TextureImage};
pub use version_tracker::{ChangeTracker, ModificationTime, MutGuard};
