//! GeometryBatch decoding
//!
//! Resolves the accessor/bufferView/buffer triples of a [`GltfDocument`] into
//! typed arrays, one [`DecodedPrimitive`] per mesh primitive. The whole batch
//! is decoded before anything is handed to the registry, so a malformed
//! document never leaves a partial update behind.

use base64::Engine;
use fafnir_wire::document::{
    Accessor, GltfDocument, ATTRIBUTE_NORMAL, ATTRIBUTE_POSITION, COMPONENT_F32, COMPONENT_U16,
    COMPONENT_U32, COMPONENT_U8,
};
use thiserror::Error;

use crate::core::types::Vec3;

/// Bytes in one float32 triple
const VEC3_BYTES: usize = 12;

/// Errors raised while decoding a GeometryBatch
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("accessor {0} does not exist")]
    MissingAccessor(usize),

    #[error("accessor {0} does not reference a buffer view")]
    UnboundAccessor(usize),

    #[error("buffer view {0} does not exist")]
    MissingBufferView(usize),

    #[error("buffer {0} does not exist")]
    MissingBuffer(usize),

    #[error("primitive {key} has no {attribute} attribute")]
    MissingAttribute { key: String, attribute: &'static str },

    #[error("buffer {0} has no base64 data URI")]
    InvalidBufferUri(usize),

    #[error("buffer {buffer} is not valid base64: {source}")]
    Base64 {
        buffer: usize,
        #[source]
        source: base64::DecodeError,
    },

    #[error("accessor {accessor} reads up to byte {end} of a {len}-byte view")]
    OutOfBounds { accessor: usize, end: usize, len: usize },

    #[error("primitive {key}: {detail}")]
    CountMismatch { key: String, detail: String },

    #[error("primitive {key}: index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { key: String, index: u32, vertex_count: usize },

    #[error("accessor {accessor} has unsupported component type {component_type}")]
    UnsupportedComponent { accessor: usize, component_type: u32 },

    #[error("primitive {0} has no vertices")]
    EmptyPrimitive(String),

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Typed arrays of one primitive, keyed `<meshName>_prim<index>`
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPrimitive {
    pub key: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl DecodedPrimitive {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Registry key of a mesh primitive
pub fn primitive_key(mesh: &str, primitive: usize) -> String {
    format!("{}_prim{}", mesh, primitive)
}

/// Decode every primitive of every mesh in the document
pub fn decode_batch(doc: &GltfDocument) -> Result<Vec<DecodedPrimitive>, DecodeError> {
    let mut blobs = BlobCache::new(doc);
    let mut decoded = Vec::new();

    for (name, mesh) in &doc.meshes {
        for (index, primitive) in mesh.primitives.iter().enumerate() {
            let key = primitive_key(name, index);

            let position_accessor = *primitive.attributes.get(ATTRIBUTE_POSITION).ok_or_else(|| {
                DecodeError::MissingAttribute { key: key.clone(), attribute: ATTRIBUTE_POSITION }
            })?;
            let normal_accessor = *primitive.attributes.get(ATTRIBUTE_NORMAL).ok_or_else(|| {
                DecodeError::MissingAttribute { key: key.clone(), attribute: ATTRIBUTE_NORMAL }
            })?;

            let positions = read_vec3(doc, &mut blobs, position_accessor)?;
            if positions.is_empty() {
                return Err(DecodeError::EmptyPrimitive(key));
            }
            let normals = read_vec3(doc, &mut blobs, normal_accessor)?;
            if normals.len() != positions.len() {
                return Err(DecodeError::CountMismatch {
                    detail: format!("{} normals for {} positions", normals.len(), positions.len()),
                    key,
                });
            }

            // Non-indexed primitives draw their vertices in order
            let indices = match primitive.indices {
                Some(accessor) => read_indices(doc, &mut blobs, accessor)?,
                None => (0..positions.len() as u32).collect(),
            };
            validate_indices(&key, &indices, positions.len())?;

            decoded.push(DecodedPrimitive { key, positions, normals, indices });
        }
    }

    Ok(decoded)
}

fn validate_indices(key: &str, indices: &[u32], vertex_count: usize) -> Result<(), DecodeError> {
    if indices.len() % 3 != 0 {
        return Err(DecodeError::CountMismatch {
            key: key.to_string(),
            detail: format!("{} indices is not a whole number of triangles", indices.len()),
        });
    }
    if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(DecodeError::IndexOutOfRange {
            key: key.to_string(),
            index,
            vertex_count,
        });
    }
    Ok(())
}

/// Base64-decodes each buffer on first use and keeps the bytes for the batch
struct BlobCache<'a> {
    doc: &'a GltfDocument,
    blobs: Vec<Option<Vec<u8>>>,
}

impl<'a> BlobCache<'a> {
    fn new(doc: &'a GltfDocument) -> Self {
        Self {
            doc,
            blobs: vec![None; doc.buffers.len()],
        }
    }

    fn get(&mut self, buffer: usize) -> Result<&[u8], DecodeError> {
        let source = self.doc.buffers.get(buffer).ok_or(DecodeError::MissingBuffer(buffer))?;
        let slot = &mut self.blobs[buffer];
        if slot.is_none() {
            let data = source.base64_data().ok_or(DecodeError::InvalidBufferUri(buffer))?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|source| DecodeError::Base64 { buffer, source })?;
            *slot = Some(bytes);
        }
        Ok(slot.as_deref().unwrap_or_default())
    }
}

/// Byte layout of an accessor resolved against its view and buffer
struct AccessorView<'b> {
    bytes: &'b [u8],
    base: usize,
    stride: usize,
    count: usize,
}

impl AccessorView<'_> {
    fn element(&self, i: usize) -> &[u8] {
        &self.bytes[self.base + i * self.stride..]
    }
}

fn resolve<'b>(
    doc: &'b GltfDocument,
    blobs: &'b mut BlobCache<'_>,
    index: usize,
    element_bytes: usize,
) -> Result<(AccessorView<'b>, &'b Accessor), DecodeError> {
    let accessor = doc.accessors.get(index).ok_or(DecodeError::MissingAccessor(index))?;
    let view_index = accessor.buffer_view.ok_or(DecodeError::UnboundAccessor(index))?;
    let view = doc.buffer_views.get(view_index).ok_or(DecodeError::MissingBufferView(view_index))?;
    let blob = blobs.get(view.buffer)?;

    // The view ends at its declared length, or at the end of the buffer
    let view_end = match view.byte_length {
        Some(len) => view.byte_offset.saturating_add(len).min(blob.len()),
        None => blob.len(),
    };
    let view_bytes = blob.get(..view_end).unwrap_or_default();

    let base = view.byte_offset.saturating_add(accessor.byte_offset);
    let stride = accessor.byte_stride.or(view.byte_stride).unwrap_or(element_bytes);

    if accessor.count > 0 {
        let end = (accessor.count - 1)
            .checked_mul(stride)
            .and_then(|v| v.checked_add(base))
            .and_then(|v| v.checked_add(element_bytes))
            .unwrap_or(usize::MAX);
        if end > view_bytes.len() || stride < element_bytes {
            return Err(DecodeError::OutOfBounds {
                accessor: index,
                end,
                len: view_bytes.len(),
            });
        }
    }

    let accessor_view = AccessorView {
        bytes: view_bytes,
        base,
        stride,
        count: accessor.count,
    };
    Ok((accessor_view, accessor))
}

fn read_vec3(doc: &GltfDocument, blobs: &mut BlobCache<'_>, index: usize) -> Result<Vec<Vec3>, DecodeError> {
    let (view, accessor) = resolve(doc, blobs, index, VEC3_BYTES)?;
    if let Some(component_type) = accessor.component_type.filter(|&c| c != COMPONENT_F32) {
        return Err(DecodeError::UnsupportedComponent { accessor: index, component_type });
    }

    let mut out = Vec::with_capacity(view.count);
    for i in 0..view.count {
        let e = view.element(i);
        let x = f32::from_le_bytes([e[0], e[1], e[2], e[3]]);
        let y = f32::from_le_bytes([e[4], e[5], e[6], e[7]]);
        let z = f32::from_le_bytes([e[8], e[9], e[10], e[11]]);
        out.push(Vec3::new(x, y, z));
    }
    Ok(out)
}

fn read_indices(doc: &GltfDocument, blobs: &mut BlobCache<'_>, index: usize) -> Result<Vec<u32>, DecodeError> {
    let component_type = doc
        .accessors
        .get(index)
        .ok_or(DecodeError::MissingAccessor(index))?
        .component_type
        .unwrap_or(COMPONENT_U16);
    let element_bytes = match component_type {
        COMPONENT_U8 => 1,
        COMPONENT_U16 => 2,
        COMPONENT_U32 => 4,
        _ => return Err(DecodeError::UnsupportedComponent { accessor: index, component_type }),
    };

    let (view, _) = resolve(doc, blobs, index, element_bytes)?;
    let mut out = Vec::with_capacity(view.count);
    for i in 0..view.count {
        let e = view.element(i);
        out.push(match element_bytes {
            1 => e[0] as u32,
            2 => u16::from_le_bytes([e[0], e[1]]) as u32,
            _ => u32::from_le_bytes([e[0], e[1], e[2], e[3]]),
        });
    }
    Ok(out)
}
