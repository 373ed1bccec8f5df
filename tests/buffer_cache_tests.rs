//! Buffer Cache Tests
//!
//! Tests for:
//! - Cache hit determinism for equal keys
//! - Invalidation when source or cells change, and deferred release
//! - Packing per usage class (triangles, wireframe edges, strips)
//! - Absent data handling

use std::sync::Arc;

use tessera::errors::RenderError;
use tessera::renderer::core::resources::{ArrayUsage, BufferRequest, Packing, UsageClass};
use tessera::renderer::{DeviceContext, HeadlessDevice, RendererSettings};
use tessera::resources::{ArrayRef, CellArrayRef};

fn context() -> DeviceContext<HeadlessDevice> {
    DeviceContext::new(HeadlessDevice::new(), RendererSettings::default()).unwrap()
}

fn quad_points() -> ArrayRef {
    ArrayRef::new(
        "points",
        3,
        vec![0.0_f32, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
    )
}

fn request<'a>(source: &'a ArrayRef, cells: &'a CellArrayRef, usage: UsageClass) -> BufferRequest<'a> {
    BufferRequest {
        label: "vertexMC",
        source,
        cells,
        usage,
        array_usage: ArrayUsage::PointArray,
        format: wgpu::VertexFormat::Float32x4,
        packing: Packing {
            pack_extra: true,
            ..Default::default()
        },
    }
}

// ============================================================================
// Hit Determinism
// ============================================================================

#[test]
fn identical_requests_share_one_buffer() {
    let mut ctx = context();
    let points = quad_points();
    let cells = CellArrayRef::from_cells(&[&[0, 1, 2, 3]]);

    let a = ctx.get_buffer(&request(&points, &cells, UsageClass::Triangles)).unwrap();
    let b = ctx.get_buffer(&request(&points, &cells, UsageClass::Triangles)).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(ctx.device().counters().buffers_created, 1);
    assert_eq!(ctx.buffer_cache().stats().hits, 1);
    assert_eq!(ctx.buffer_cache().stats().misses, 1);
}

#[test]
fn label_is_not_part_of_the_key() {
    let mut ctx = context();
    let points = quad_points();
    let cells = CellArrayRef::from_cells(&[&[0, 1, 2]]);

    let a = ctx.get_buffer(&request(&points, &cells, UsageClass::Triangles)).unwrap();
    let relabeled = BufferRequest {
        label: "somethingElse",
        ..request(&points, &cells, UsageClass::Triangles)
    };
    let b = ctx.get_buffer(&relabeled).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn format_and_packing_distinguish_buffers() {
    let mut ctx = context();
    let points = quad_points();
    let cells = CellArrayRef::from_cells(&[&[0, 1, 2]]);
    let base = request(&points, &cells, UsageClass::Triangles);

    let a = ctx.get_buffer(&base).unwrap();
    let b = ctx
        .get_buffer(&BufferRequest {
            format: wgpu::VertexFormat::Float32x3,
            ..base
        })
        .unwrap();
    let c = ctx
        .get_buffer(&BufferRequest {
            packing: Packing {
                shift: 0.5,
                pack_extra: true,
                ..Default::default()
            },
            ..base
        })
        .unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(ctx.device().counters().buffers_created, 3);
}

#[test]
fn alternating_formats_keep_both_buffers() {
    let mut ctx = context();
    let points = quad_points();
    let cells = CellArrayRef::from_cells(&[&[0, 1, 2]]);
    let wide = request(&points, &cells, UsageClass::Triangles);
    let narrow = BufferRequest {
        format: wgpu::VertexFormat::Float32x2,
        ..wide
    };

    let a = ctx.get_buffer(&wide).unwrap();
    let b = ctx.get_buffer(&narrow).unwrap();
    let again = ctx.get_buffer(&wide).unwrap();

    assert!(Arc::ptr_eq(&a, &again));
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(ctx.device().counters().buffers_created, 2);
    assert_eq!(ctx.buffer_cache().stats().superseded, 0);
    assert_eq!(ctx.buffer_cache().len(), 2);
}

// ============================================================================
// Invalidation
// ============================================================================

#[test]
fn newer_source_supersedes_old_buffer() {
    let mut ctx = context();
    let points = quad_points();
    let cells = CellArrayRef::from_cells(&[&[0, 1, 2]]);

    let old = ctx.get_buffer(&request(&points, &cells, UsageClass::Triangles)).unwrap();
    let old_key = request(&points, &cells, UsageClass::Triangles).key();

    points.set_values(vec![0.0_f32, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0]);
    let new = ctx.get_buffer(&request(&points, &cells, UsageClass::Triangles)).unwrap();

    assert!(!Arc::ptr_eq(&old, &new));
    assert!(!ctx.buffer_cache().contains(&old_key));
    assert_eq!(ctx.buffer_cache().len(), 1);
    assert_eq!(ctx.buffer_cache().stats().superseded, 1);

    // Still referenced by `old`, so not destroyed yet.
    ctx.end_frame();
    assert_eq!(ctx.device().counters().buffers_destroyed, 0);
    assert_eq!(ctx.buffer_cache().retired_len(), 1);

    drop(old);
    ctx.end_frame();
    assert_eq!(ctx.device().counters().buffers_destroyed, 1);
    assert_eq!(ctx.buffer_cache().retired_len(), 0);
}

#[test]
fn changed_cells_rebuild_the_buffer() {
    let mut ctx = context();
    let points = quad_points();
    let cells = CellArrayRef::from_cells(&[&[0, 1, 2]]);

    let a = ctx.get_buffer(&request(&points, &cells, UsageClass::Triangles)).unwrap();
    cells.set_cells(&[&[0, 1, 2, 3]]);
    let b = ctx.get_buffer(&request(&points, &cells, UsageClass::Triangles)).unwrap();

    assert_eq!(a.vertex_count, 3);
    assert_eq!(b.vertex_count, 6);
}

// ============================================================================
// Packing per Usage Class
// ============================================================================

#[test]
fn vertex_counts_follow_usage_class() {
    let mut ctx = context();
    let points = quad_points();
    let quad = CellArrayRef::from_cells(&[&[0, 1, 2, 3]]);

    let surface = ctx.get_buffer(&request(&points, &quad, UsageClass::Triangles)).unwrap();
    let wireframe = ctx
        .get_buffer(&request(&points, &quad, UsageClass::LinesFromTriangles))
        .unwrap();
    let strip = ctx.get_buffer(&request(&points, &quad, UsageClass::Strips)).unwrap();
    let strip_edges = ctx
        .get_buffer(&request(&points, &quad, UsageClass::LinesFromStrips))
        .unwrap();
    let verts = ctx.get_buffer(&request(&points, &quad, UsageClass::Verts)).unwrap();

    assert_eq!(surface.vertex_count, 6);
    assert_eq!(wireframe.vertex_count, 8);
    assert_eq!(strip.vertex_count, 6);
    assert_eq!(strip_edges.vertex_count, 2 + 2 * 4);
    assert_eq!(verts.vertex_count, 4);
    assert_eq!(surface.size, 6 * 16);
    assert_eq!(surface.stride, 16);
}

#[test]
fn uploaded_positions_are_padded_with_one() {
    let mut ctx = context();
    let points = quad_points();
    let cells = CellArrayRef::from_cells(&[&[0, 1, 2]]);

    let buffer = ctx.get_buffer(&request(&points, &cells, UsageClass::Triangles)).unwrap();
    let data = &ctx.device().buffer(buffer.id).unwrap().data;
    let floats: Vec<f32> = data
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    assert_eq!(&floats[..8], &[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn normals_from_points_emit_one_normal_per_cell() {
    let mut ctx = context();
    let points = quad_points();
    let cells = CellArrayRef::from_cells(&[&[0, 1, 2, 3]]);

    let buffer = ctx
        .get_buffer(&BufferRequest {
            label: "normalMC",
            array_usage: ArrayUsage::NormalsFromPoints,
            format: wgpu::VertexFormat::Snorm8x4,
            packing: Packing {
                scale: 127.0,
                pack_extra: true,
                ..Default::default()
            },
            ..request(&points, &cells, UsageClass::Triangles)
        })
        .unwrap();

    let data = &ctx.device().buffer(buffer.id).unwrap().data;
    assert_eq!(data.len(), 6 * 4);
    for vertex in data.chunks(4) {
        assert_eq!(vertex, &[0, 0, 127, 127]);
    }
}

// ============================================================================
// Absent Data
// ============================================================================

#[test]
fn empty_source_is_reported_not_uploaded() {
    let mut ctx = context();
    let empty = ArrayRef::new("points", 3, Vec::<f32>::new());
    let cells = CellArrayRef::from_cells(&[&[0, 1, 2]]);

    let err = ctx.get_buffer(&request(&empty, &cells, UsageClass::Triangles)).unwrap_err();
    assert!(matches!(err, RenderError::EmptySource(_)));
    assert_eq!(ctx.device().counters().buffers_created, 0);
}

#[test]
fn cells_without_vertices_are_reported_empty() {
    let mut ctx = context();
    let points = quad_points();
    let cells = CellArrayRef::default();

    let err = ctx.get_buffer(&request(&points, &cells, UsageClass::Triangles)).unwrap_err();
    assert!(matches!(err, RenderError::EmptySource(_)));
}

#[test]
fn fullscreen_quad_is_shared() {
    let mut ctx = context();
    let a = ctx.fullscreen_quad_buffer().unwrap();
    let b = ctx.fullscreen_quad_buffer().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.vertex_count, 6);
    assert_eq!(a.size, 72);
}
