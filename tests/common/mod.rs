//! Shared helpers for the tick-loop integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;

use base64::Engine;
use fafnir::app::Renderer;
use fafnir::core::{BackendKind, RendererConfig};
use fafnir::gpu::NullBackend;
use fafnir_wire::document::{
    Accessor, Buffer, BufferView, GltfDocument, GltfMesh, Primitive, ATTRIBUTE_NORMAL, ATTRIBUTE_POSITION,
};
use fafnir_wire::{DataId, Frame, MatrixPayload, MemoryTransport, MethodId, ViewportPayload};
use glam::Mat4;

pub type TestRenderer = Renderer<NullBackend, MemoryTransport>;

pub fn config() -> RendererConfig {
    RendererConfig {
        backend: BackendKind::Null,
        initial_width: 16,
        initial_height: 16,
        ..Default::default()
    }
}

pub fn renderer() -> TestRenderer {
    Renderer::new(NullBackend::new(16, 16), MemoryTransport::new(), &config()).unwrap()
}

pub fn send(renderer: &mut TestRenderer, frame: &Frame) {
    renderer.transport_mut().push_inbound(&frame.encode().unwrap());
}

pub fn viewport(width: u32, height: u32) -> Frame {
    Frame::json(MethodId::Update, DataId::Viewport, &ViewportPayload { width, height }).unwrap()
}

pub fn matrix(data: DataId, matrix: Mat4) -> Frame {
    let payload = MatrixPayload {
        data: matrix.transpose().to_cols_array(),
    };
    Frame::json(MethodId::Update, data, &payload).unwrap()
}

/// A document with one single-triangle primitive per name, offset along x
pub fn triangles(names: &[&str]) -> GltfDocument {
    let mut doc = GltfDocument::default();
    let mut blob = Vec::new();

    for (i, name) in names.iter().enumerate() {
        let x = i as f32 * 3.0;
        let positions = [[x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x, 1.0, 0.0]];
        let normals = [[0.0f32, 0.0, 1.0]; 3];

        let mut view = |bytes: Vec<u8>, count: usize, component_type: Option<u32>| {
            doc.buffer_views.push(BufferView {
                buffer: 0,
                byte_offset: blob.len(),
                byte_length: Some(bytes.len()),
                byte_stride: None,
            });
            blob.extend_from_slice(&bytes);
            while blob.len() % 4 != 0 {
                blob.push(0);
            }
            doc.accessors.push(Accessor {
                buffer_view: Some(doc.buffer_views.len() - 1),
                count,
                component_type,
                ..Default::default()
            });
            doc.accessors.len() - 1
        };

        let position = view(positions.iter().flatten().flat_map(|v| v.to_le_bytes()).collect(), 3, None);
        let normal = view(normals.iter().flatten().flat_map(|v| v.to_le_bytes()).collect(), 3, None);
        let index = view([0u16, 1, 2].iter().flat_map(|v| v.to_le_bytes()).collect(), 3, None);

        let mut attributes = BTreeMap::new();
        attributes.insert(ATTRIBUTE_POSITION.to_string(), position);
        attributes.insert(ATTRIBUTE_NORMAL.to_string(), normal);
        doc.meshes.insert(name.to_string(), GltfMesh {
            primitives: vec![Primitive { indices: Some(index), attributes }],
        });
    }

    doc.buffers.push(Buffer {
        uri: format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&blob)
        ),
        byte_length: Some(blob.len()),
    });
    doc
}

pub fn geometry(method: MethodId, doc: &GltfDocument) -> Frame {
    Frame::json(method, DataId::Gltf, doc).unwrap()
}
