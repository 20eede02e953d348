//! Scenes the host streams to the renderer

use std::collections::BTreeMap;
use std::path::Path;

use base64::Engine;
use fafnir_wire::document::{
    Accessor, Buffer, BufferView, GltfDocument, GltfMesh, Primitive, ATTRIBUTE_NORMAL, ATTRIBUTE_POSITION,
    COMPONENT_F32, COMPONENT_U16,
};
use fafnir_wire::{DataId, Frame, MatrixPayload, MethodId, ViewportPayload};
use glam::{Mat4, Vec3};

use crate::error::HostError;

/// Everything sent to the renderer before frames are collected
#[derive(Debug, Clone)]
pub struct HostScene {
    pub width: u32,
    pub height: u32,
    pub view: Mat4,
    pub projection: Mat4,
    pub geometry: GltfDocument,
}

impl HostScene {
    /// A unit cube seen from above and to the side
    pub fn demo(width: u32, height: u32) -> Self {
        Self::with_geometry(width, height, cube_document("Cube"))
    }

    /// Load the geometry batch from a glTF-subset JSON file
    pub fn from_file(width: u32, height: u32, path: &Path) -> Result<Self, HostError> {
        let text = std::fs::read_to_string(path)?;
        let geometry: GltfDocument = serde_json::from_str(&text)?;
        log::info!("Loaded {} meshes from {}", geometry.meshes.len(), path.display());
        Ok(Self::with_geometry(width, height, geometry))
    }

    fn with_geometry(width: u32, height: u32, geometry: GltfDocument) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Self {
            width,
            height,
            view: Mat4::look_at_rh(Vec3::new(2.5, 2.0, 3.0), Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 100.0),
            geometry,
        }
    }

    /// Frames in send order: Viewport, View, Projection, geometry
    pub fn frames(&self) -> Result<Vec<Frame>, HostError> {
        Ok(vec![
            Frame::json(MethodId::Update, DataId::Viewport, &ViewportPayload {
                width: self.width,
                height: self.height,
            })?,
            Frame::json(MethodId::Update, DataId::View, &row_major(self.view))?,
            Frame::json(MethodId::Update, DataId::Projection, &row_major(self.projection))?,
            Frame::json(MethodId::Add, DataId::Gltf, &self.geometry)?,
        ])
    }
}

fn row_major(matrix: Mat4) -> MatrixPayload {
    MatrixPayload {
        data: matrix.transpose().to_cols_array(),
    }
}

/// One axis-aligned face: normal plus the two in-plane axes
const CUBE_FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
];

/// A unit cube centred on the origin, 24 vertices with face normals
pub fn cube_document(name: &str) -> GltfDocument {
    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut indices: Vec<u16> = Vec::with_capacity(36);

    for (normal, u, v) in CUBE_FACES {
        let (n, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
        let base = positions.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            positions.push((n + u * su + v * sv) * 0.5);
            normals.push(n);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let mut blob: Vec<u8> = Vec::new();
    let mut views = Vec::new();
    let mut push_view = |bytes: Vec<u8>| {
        views.push(BufferView {
            buffer: 0,
            byte_offset: blob.len(),
            byte_length: Some(bytes.len()),
            byte_stride: None,
        });
        blob.extend_from_slice(&bytes);
        views.len() - 1
    };
    let position_view = push_view(vec3_bytes(&positions));
    let normal_view = push_view(vec3_bytes(&normals));
    let index_view = push_view(indices.iter().flat_map(|i| i.to_le_bytes()).collect());

    let accessors = vec![
        Accessor {
            buffer_view: Some(position_view),
            count: positions.len(),
            component_type: Some(COMPONENT_F32),
            ..Default::default()
        },
        Accessor {
            buffer_view: Some(normal_view),
            count: normals.len(),
            component_type: Some(COMPONENT_F32),
            ..Default::default()
        },
        Accessor {
            buffer_view: Some(index_view),
            count: indices.len(),
            component_type: Some(COMPONENT_U16),
            ..Default::default()
        },
    ];

    let mut attributes = BTreeMap::new();
    attributes.insert(ATTRIBUTE_POSITION.to_string(), 0);
    attributes.insert(ATTRIBUTE_NORMAL.to_string(), 1);
    let mut meshes = BTreeMap::new();
    meshes.insert(name.to_string(), GltfMesh {
        primitives: vec![Primitive { indices: Some(2), attributes }],
    });

    let encoded = base64::engine::general_purpose::STANDARD.encode(&blob);
    GltfDocument {
        meshes,
        accessors,
        buffer_views: views,
        buffers: vec![Buffer {
            uri: format!("data:application/octet-stream;base64,{}", encoded),
            byte_length: Some(blob.len()),
        }],
        nodes: serde_json::Value::Null,
    }
}

fn vec3_bytes(values: &[Vec3]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|v| v.to_array())
        .flat_map(|c| c.to_le_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_layout() {
        let doc = cube_document("Cube");
        assert_eq!(doc.accessors[0].count, 24);
        assert_eq!(doc.accessors[2].count, 36);
        assert_eq!(doc.buffer_views[2].byte_offset, 24 * 12 * 2);

        let data = doc.buffers[0].base64_data().unwrap();
        let blob = base64::engine::general_purpose::STANDARD.decode(data).unwrap();
        assert_eq!(blob.len(), 24 * 12 * 2 + 36 * 2);
    }

    #[test]
    fn test_cube_vertices_on_unit_box() {
        let doc = cube_document("Cube");
        let blob = base64::engine::general_purpose::STANDARD
            .decode(doc.buffers[0].base64_data().unwrap())
            .unwrap();
        for chunk in blob[..24 * 12].chunks_exact(4) {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            assert_eq!(value.abs(), 0.5);
        }
    }

    #[test]
    fn test_frame_order() {
        let frames = HostScene::demo(300, 200).frames().unwrap();
        let kinds: Vec<DataId> = frames.iter().map(|f| f.data).collect();
        assert_eq!(kinds, vec![DataId::Viewport, DataId::View, DataId::Projection, DataId::Gltf]);
    }

    #[test]
    fn test_matrix_sent_row_major() {
        let mut scene = HostScene::demo(4, 4);
        scene.view = Mat4::from_translation(Vec3::new(7.0, 0.0, 0.0));
        let frames = scene.frames().unwrap();
        let payload: MatrixPayload = serde_json::from_slice(&frames[1].payload).unwrap();
        assert_eq!(payload.data[3], 7.0);
    }
}
