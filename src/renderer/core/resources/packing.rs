//! Vertex packing.
//!
//! Expands cell connectivity into a non-indexed vertex stream for one usage
//! class and converts source tuples into the requested vertex format.
//!
//! # Value transform
//!
//! Each source value `v` is remapped to `(v - shift) * scale` in the target's
//! storage domain, then rounded and clamped for integer formats. A normal in
//! `[-1, 1]` packed as `Snorm8x4` therefore uses `scale = 127`.
//!
//! # Channel fill
//!
//! | Target channel `c` | Value |
//! |--------------------|-------|
//! | `c < source components` | transformed `tuple[c]` |
//! | single-channel source, `c < 3` | transformed `tuple[0]` |
//! | otherwise, `pack_extra` | normalized 1.0 of the format |
//! | otherwise | 0 |

use glam::DVec3;
use half::f16;
use smallvec::SmallVec;
use std::fmt;

use crate::errors::{RenderError, Result};
use crate::resources::cell_array::CellIter;
use crate::resources::data_array::DataValues;
use crate::resources::polydata::PrimitiveType;
use crate::resources::property::Representation;

// ─── Usage Classes ────────────────────────────────────────────────────────────

/// Classification of a primitive batch driving packing and topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UsageClass {
    Verts,
    Lines,
    Triangles,
    Strips,
    LinesFromStrips,
    LinesFromTriangles,
}

impl UsageClass {
    /// Usage of a cell bucket drawn with the given representation.
    #[must_use]
    pub fn from_representation(representation: Representation, primitive: PrimitiveType) -> Self {
        match (representation, primitive) {
            (Representation::Points, _) | (_, PrimitiveType::Verts) => Self::Verts,
            (_, PrimitiveType::Lines) => Self::Lines,
            (Representation::Wireframe, PrimitiveType::Polys) => Self::LinesFromTriangles,
            (Representation::Wireframe, PrimitiveType::Strips) => Self::LinesFromStrips,
            (Representation::Surface, PrimitiveType::Polys) => Self::Triangles,
            (Representation::Surface, PrimitiveType::Strips) => Self::Strips,
        }
    }

    #[must_use]
    pub fn topology(self) -> wgpu::PrimitiveTopology {
        match self {
            Self::Verts => wgpu::PrimitiveTopology::PointList,
            Self::Triangles | Self::Strips => wgpu::PrimitiveTopology::TriangleList,
            Self::Lines | Self::LinesFromStrips | Self::LinesFromTriangles => {
                wgpu::PrimitiveTopology::LineList
            }
        }
    }

    /// Numeric tag used in pipeline key strings.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the batch is shaded as a surface.
    #[must_use]
    pub fn is_surface(self) -> bool {
        matches!(self, Self::Triangles | Self::Strips)
    }
}

impl fmt::Display for UsageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pt{}", self.code())
    }
}

/// How the source array is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayUsage {
    /// One tuple per point (or per cell with [`Packing::cell_data`]).
    PointArray,
    /// Source is the point coordinates; emit one polygon normal per cell.
    NormalsFromPoints,
}

// ─── Packing Parameters ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packing {
    pub shift: f64,
    pub scale: f64,
    pub pack_extra: bool,
    /// Address tuples by cell index instead of point id.
    pub cell_data: bool,
    /// Index of this bucket's first cell in cell-associated arrays.
    pub cell_offset: usize,
}

impl Default for Packing {
    fn default() -> Self {
        Self {
            shift: 0.0,
            scale: 1.0,
            pack_extra: false,
            cell_data: false,
            cell_offset: 0,
        }
    }
}

/// Hashable mirror of [`Packing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackingKey {
    pub shift_bits: u64,
    pub scale_bits: u64,
    pub pack_extra: bool,
    pub cell_data: bool,
    pub cell_offset: usize,
}

impl From<Packing> for PackingKey {
    fn from(p: Packing) -> Self {
        Self {
            shift_bits: p.shift.to_bits(),
            scale_bits: p.scale.to_bits(),
            pack_extra: p.pack_extra,
            cell_data: p.cell_data,
            cell_offset: p.cell_offset,
        }
    }
}

// ─── Formats ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Float32,
    Float16,
    Snorm8,
    Unorm8,
    Snorm16,
    Unorm16,
    Uint32,
    Sint32,
}

impl ComponentKind {
    /// Storage value representing normalized 1.0.
    fn one(self) -> f64 {
        match self {
            Self::Float32 | Self::Float16 | Self::Uint32 | Self::Sint32 => 1.0,
            Self::Snorm8 => 127.0,
            Self::Unorm8 => 255.0,
            Self::Snorm16 => 32767.0,
            Self::Unorm16 => 65535.0,
        }
    }

    fn write(self, value: f64, out: &mut Vec<u8>) {
        match self {
            Self::Float32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            Self::Float16 => out.extend_from_slice(&f16::from_f64(value).to_le_bytes()),
            Self::Snorm8 => out.push((value.round().clamp(-127.0, 127.0) as i8).to_le_bytes()[0]),
            Self::Unorm8 => out.push(value.round().clamp(0.0, 255.0) as u8),
            Self::Snorm16 => {
                out.extend_from_slice(&(value.round().clamp(-32767.0, 32767.0) as i16).to_le_bytes());
            }
            Self::Unorm16 => {
                out.extend_from_slice(&(value.round().clamp(0.0, 65535.0) as u16).to_le_bytes());
            }
            Self::Uint32 => {
                out.extend_from_slice(&(value.round().clamp(0.0, f64::from(u32::MAX)) as u32).to_le_bytes());
            }
            Self::Sint32 => {
                let v = value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX));
                out.extend_from_slice(&(v as i32).to_le_bytes());
            }
        }
    }
}

/// Layout of a supported vertex format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub components: usize,
    pub kind: ComponentKind,
}

impl FormatInfo {
    pub fn of(format: wgpu::VertexFormat) -> Result<Self> {
        use wgpu::VertexFormat as F;
        let (components, kind) = match format {
            F::Float32 => (1, ComponentKind::Float32),
            F::Float32x2 => (2, ComponentKind::Float32),
            F::Float32x3 => (3, ComponentKind::Float32),
            F::Float32x4 => (4, ComponentKind::Float32),
            F::Float16x2 => (2, ComponentKind::Float16),
            F::Float16x4 => (4, ComponentKind::Float16),
            F::Snorm8x4 => (4, ComponentKind::Snorm8),
            F::Unorm8x4 => (4, ComponentKind::Unorm8),
            F::Snorm16x2 => (2, ComponentKind::Snorm16),
            F::Snorm16x4 => (4, ComponentKind::Snorm16),
            F::Unorm16x2 => (2, ComponentKind::Unorm16),
            F::Unorm16x4 => (4, ComponentKind::Unorm16),
            F::Uint32 => (1, ComponentKind::Uint32),
            F::Sint32 => (1, ComponentKind::Sint32),
            other => return Err(RenderError::UnsupportedVertexFormat(other)),
        };
        Ok(Self { components, kind })
    }
}

/// WGSL type a vertex attribute of `format` is read as.
#[must_use]
pub fn format_to_wgsl_type(format: wgpu::VertexFormat) -> &'static str {
    use wgpu::VertexFormat as F;
    match format {
        F::Float32 => "f32",
        F::Float32x2 | F::Float16x2 | F::Snorm16x2 | F::Unorm16x2 => "vec2<f32>",
        F::Float32x3 => "vec3<f32>",
        F::Uint32 => "u32",
        F::Sint32 => "i32",
        _ => "vec4<f32>",
    }
}

// ─── Cell Expansion ───────────────────────────────────────────────────────────

/// One emitted vertex: the point it reads and the cell it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexRef {
    pub point: u32,
    pub cell: u32,
}

/// Expands legacy connectivity into the vertex stream of `usage`.
#[must_use]
pub fn expand_cells(connectivity: &[u32], usage: UsageClass) -> Vec<VertexRef> {
    let mut out = Vec::new();
    for (cell, ids) in CellIter::new(connectivity).enumerate() {
        let cell = cell as u32;
        let mut emit = |i: usize| out.push(VertexRef { point: ids[i], cell });
        let n = ids.len();
        match usage {
            UsageClass::Verts => (0..n).for_each(&mut emit),
            UsageClass::Lines => {
                for i in 1..n {
                    emit(i - 1);
                    emit(i);
                }
            }
            UsageClass::Triangles => {
                for i in 1..n.saturating_sub(1) {
                    emit(0);
                    emit(i);
                    emit(i + 1);
                }
            }
            UsageClass::Strips => {
                for i in 0..n.saturating_sub(2) {
                    if i % 2 == 0 {
                        emit(i);
                        emit(i + 1);
                    } else {
                        emit(i + 1);
                        emit(i);
                    }
                    emit(i + 2);
                }
            }
            UsageClass::LinesFromTriangles => {
                if n >= 2 {
                    for i in 0..n {
                        emit(i);
                        emit((i + 1) % n);
                    }
                }
            }
            UsageClass::LinesFromStrips => {
                if n >= 2 {
                    emit(0);
                    emit(1);
                }
                for i in 2..n {
                    emit(i - 2);
                    emit(i);
                    emit(i - 1);
                    emit(i);
                }
            }
        }
    }
    out
}

// ─── Packing ──────────────────────────────────────────────────────────────────

/// Result of packing one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedVertices {
    pub bytes: Vec<u8>,
    pub stride: u64,
    pub vertex_count: u32,
}

/// Borrowed view of a tuple array.
#[derive(Debug, Clone, Copy)]
pub struct SourceView<'a> {
    pub values: &'a DataValues,
    pub components: usize,
}

impl SourceView<'_> {
    fn tuples(&self) -> usize {
        self.values.len() / self.components
    }

    fn tuple(&self, index: usize, out: &mut SmallVec<[f64; 4]>) -> Result<()> {
        let count = self.tuples();
        if index >= count {
            return Err(RenderError::InvalidCellIndex { index, count });
        }
        out.clear();
        let base = index * self.components;
        out.extend((0..self.components).map(|c| self.values.get(base + c)));
        Ok(())
    }
}

/// Packs `source` for every vertex of `vertices`.
pub fn pack_vertices(
    source: SourceView<'_>,
    vertices: &[VertexRef],
    connectivity: &[u32],
    array_usage: ArrayUsage,
    format: wgpu::VertexFormat,
    packing: &Packing,
) -> Result<PackedVertices> {
    let info = FormatInfo::of(format)?;
    let stride = format.size();
    let mut bytes = Vec::with_capacity(vertices.len() * stride as usize);
    let mut tuple: SmallVec<[f64; 4]> = SmallVec::new();

    match array_usage {
        ArrayUsage::PointArray => {
            for v in vertices {
                let index = if packing.cell_data {
                    packing.cell_offset + v.cell as usize
                } else {
                    v.point as usize
                };
                source.tuple(index, &mut tuple)?;
                write_tuple(&tuple, info, packing, &mut bytes);
            }
        }
        ArrayUsage::NormalsFromPoints => {
            let normals = cell_normals(source, connectivity)?;
            for v in vertices {
                let n = normals.get(v.cell as usize).copied().unwrap_or(DVec3::Z);
                tuple.clear();
                tuple.extend_from_slice(&[n.x, n.y, n.z]);
                write_tuple(&tuple, info, packing, &mut bytes);
            }
        }
    }

    Ok(PackedVertices {
        bytes,
        stride,
        vertex_count: vertices.len() as u32,
    })
}

fn write_tuple(tuple: &[f64], info: FormatInfo, packing: &Packing, out: &mut Vec<u8>) {
    let transform = |v: f64| (v - packing.shift) * packing.scale;
    for c in 0..info.components {
        let value = if c < tuple.len() {
            transform(tuple[c])
        } else if tuple.len() == 1 && c < 3 {
            transform(tuple[0])
        } else if packing.pack_extra {
            info.kind.one()
        } else {
            0.0
        };
        info.kind.write(value, out);
    }
}

/// Newell normal of every cell, unit length (or +Z when degenerate).
fn cell_normals(points: SourceView<'_>, connectivity: &[u32]) -> Result<Vec<DVec3>> {
    let mut tuple: SmallVec<[f64; 4]> = SmallVec::new();
    let mut corners: SmallVec<[DVec3; 8]> = SmallVec::new();
    let mut normals = Vec::new();
    for ids in CellIter::new(connectivity) {
        corners.clear();
        for &id in ids {
            points.tuple(id as usize, &mut tuple)?;
            let get = |i: usize| tuple.get(i).copied().unwrap_or(0.0);
            corners.push(DVec3::new(get(0), get(1), get(2)));
        }
        let mut n = DVec3::ZERO;
        for (i, a) in corners.iter().enumerate() {
            let b = corners[(i + 1) % corners.len()];
            n.x += (a.y - b.y) * (a.z + b.z);
            n.y += (a.z - b.z) * (a.x + b.x);
            n.z += (a.x - b.x) * (a.y + b.y);
        }
        normals.push(n.try_normalize().unwrap_or(DVec3::Z));
    }
    Ok(normals)
}
