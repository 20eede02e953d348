//! glTF-subset geometry document carried by `Gltf` frames
//!
//! Only the fields the renderer consumes are modelled. Unknown fields are
//! ignored so hosts may send a fuller document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// glTF component type for unsigned bytes
pub const COMPONENT_U8: u32 = 5121;
/// glTF component type for unsigned shorts (the default index type)
pub const COMPONENT_U16: u32 = 5123;
/// glTF component type for unsigned ints
pub const COMPONENT_U32: u32 = 5125;
/// glTF component type for 32-bit floats
pub const COMPONENT_F32: u32 = 5126;

/// Attribute name of vertex positions
pub const ATTRIBUTE_POSITION: &str = "POSITION";
/// Attribute name of vertex normals
pub const ATTRIBUTE_NORMAL: &str = "NORMAL";

/// Top-level geometry batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GltfDocument {
    /// Meshes keyed by their host-side name
    #[serde(default)]
    pub meshes: BTreeMap<String, GltfMesh>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    #[serde(default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    /// Scene nodes; accepted but not interpreted
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub nodes: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GltfMesh {
    #[serde(default)]
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Primitive {
    /// Accessor index of the triangle list
    #[serde(default)]
    pub indices: Option<usize>,
    /// Attribute name to accessor index
    #[serde(default)]
    pub attributes: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(default)]
    pub buffer_view: Option<usize>,
    pub count: usize,
    #[serde(default)]
    pub byte_offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    /// `data:` URI with the binary blob base64-encoded after the first comma
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_length: Option<usize>,
}

impl Buffer {
    /// The base64 part of the data URI, if the URI has one
    pub fn base64_data(&self) -> Option<&str> {
        self.uri.split_once(',').map(|(_, data)| data)
    }
}
