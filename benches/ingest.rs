use criterion::{criterion_group, criterion_main, Criterion, black_box};

use std::collections::BTreeMap;

use base64::Engine;
use fafnir::scene::{decode_batch, MeshGeometry};
use fafnir_wire::document::{
    Accessor, Buffer, BufferView, GltfDocument, GltfMesh, Primitive, ATTRIBUTE_NORMAL, ATTRIBUTE_POSITION,
    COMPONENT_U32,
};
use fafnir_wire::{DataId, Frame, FrameReader, MemoryTransport, MethodId};

/// A flat `n`x`n` quad grid as one primitive
fn grid_document(n: u32) -> GltfDocument {
    let mut positions = Vec::new();
    for y in 0..=n {
        for x in 0..=n {
            positions.extend_from_slice(&[x as f32, y as f32, ((x + y) % 3) as f32 * 0.1]);
        }
    }
    let vertex_count = (n + 1) * (n + 1);
    let mut indices = Vec::new();
    for y in 0..n {
        for x in 0..n {
            let i = y * (n + 1) + x;
            indices.extend_from_slice(&[i, i + 1, i + n + 1, i + 1, i + n + 2, i + n + 1]);
        }
    }

    let pos_bytes: Vec<u8> = positions.iter().flat_map(|v| v.to_le_bytes()).collect();
    let nrm_bytes: Vec<u8> = (0..vertex_count).flat_map(|_| [0.0f32, 0.0, 1.0]).flat_map(|v| v.to_le_bytes()).collect();
    let idx_bytes: Vec<u8> = indices.iter().flat_map(|v| v.to_le_bytes()).collect();

    let mut blob = pos_bytes.clone();
    blob.extend_from_slice(&nrm_bytes);
    blob.extend_from_slice(&idx_bytes);

    let view = |offset: usize, len: usize| BufferView {
        buffer: 0,
        byte_offset: offset,
        byte_length: Some(len),
        byte_stride: None,
    };
    let mut attributes = BTreeMap::new();
    attributes.insert(ATTRIBUTE_POSITION.to_string(), 0);
    attributes.insert(ATTRIBUTE_NORMAL.to_string(), 1);
    let mut meshes = BTreeMap::new();
    meshes.insert("Grid".to_string(), GltfMesh {
        primitives: vec![Primitive { indices: Some(2), attributes }],
    });

    GltfDocument {
        meshes,
        accessors: vec![
            Accessor { buffer_view: Some(0), count: vertex_count as usize, ..Default::default() },
            Accessor { buffer_view: Some(1), count: vertex_count as usize, ..Default::default() },
            Accessor {
                buffer_view: Some(2),
                count: indices.len(),
                component_type: Some(COMPONENT_U32),
                ..Default::default()
            },
        ],
        buffer_views: vec![
            view(0, pos_bytes.len()),
            view(pos_bytes.len(), nrm_bytes.len()),
            view(pos_bytes.len() + nrm_bytes.len(), idx_bytes.len()),
        ],
        buffers: vec![Buffer {
            uri: format!("data:application/octet-stream;base64,{}", base64::engine::general_purpose::STANDARD.encode(&blob)),
            byte_length: Some(blob.len()),
        }],
        nodes: serde_json::Value::Null,
    }
}

fn bench_frame_reassembly_16mb(c: &mut Criterion) {
    let frame = Frame::new(MethodId::Add, DataId::Gltf, vec![0x5A; 16 * 1024 * 1024]);
    let bytes = frame.encode().unwrap_or_default();
    let reader = FrameReader::default();

    c.bench_function("frame_reassembly_16mb", |b| {
        b.iter(|| {
            let mut transport = MemoryTransport::new();
            transport.push_inbound(black_box(&bytes));
            reader.try_read_frame(&mut transport).ok().flatten()
        });
    });
}

fn bench_frame_reassembly_small_reads(c: &mut Criterion) {
    let frame = Frame::new(MethodId::Add, DataId::Gltf, vec![0x5A; 256 * 1024]);
    let bytes = frame.encode().unwrap_or_default();
    let reader = FrameReader::new(64 * 1024, usize::MAX);

    c.bench_function("frame_reassembly_1kb_reads", |b| {
        b.iter(|| {
            let mut transport = MemoryTransport::new().with_read_limit(1024);
            transport.push_inbound(black_box(&bytes));
            reader.try_read_frame(&mut transport).ok().flatten()
        });
    });
}

fn bench_decode_batch_grid_64(c: &mut Criterion) {
    let doc = grid_document(64);

    c.bench_function("decode_batch_grid_64", |b| {
        b.iter(|| decode_batch(black_box(&doc)));
    });
}

fn bench_decode_batch_json_grid_64(c: &mut Criterion) {
    let payload = serde_json::to_vec(&grid_document(64)).unwrap_or_default();

    c.bench_function("decode_batch_json_grid_64", |b| {
        b.iter(|| {
            let doc: GltfDocument = serde_json::from_slice(black_box(&payload)).unwrap_or_default();
            decode_batch(&doc)
        });
    });
}

fn bench_mesh_geometry_grid_256(c: &mut Criterion) {
    let primitive = decode_batch(&grid_document(256)).ok().and_then(|mut p| p.pop());
    let Some(primitive) = primitive else {
        return;
    };

    c.bench_function("mesh_geometry_grid_256", |b| {
        b.iter(|| MeshGeometry::new(black_box(primitive.clone()), 256));
    });
}

criterion_group!(
    benches,
    bench_frame_reassembly_16mb,
    bench_frame_reassembly_small_reads,
    bench_decode_batch_grid_64,
    bench_decode_batch_json_grid_64,
    bench_mesh_geometry_grid_256,
);
criterion_main!(benches);
