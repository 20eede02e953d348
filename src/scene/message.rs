//! Interpretation of inbound frames as scene messages

use fafnir_wire::document::GltfDocument;
use fafnir_wire::{DataId, Frame, MatrixPayload, MethodId, ViewportPayload};

use crate::core::types::Mat4;
use crate::scene::decoder::{decode_batch, DecodeError, DecodedPrimitive};

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum SceneMessage {
    Projection(Mat4),
    View(Mat4),
    Viewport { width: u32, height: u32 },
    /// Fully decoded primitives to upsert
    GeometryBatch(Vec<DecodedPrimitive>),
    /// Names of meshes whose primitives are to be removed
    RemoveMeshes(Vec<String>),
}

impl SceneMessage {
    pub fn from_frame(frame: &Frame) -> Result<Self, DecodeError> {
        match frame.data {
            DataId::Projection => Ok(SceneMessage::Projection(parse_matrix(&frame.payload)?)),
            DataId::View => Ok(SceneMessage::View(parse_matrix(&frame.payload)?)),
            DataId::Viewport => {
                let viewport: ViewportPayload = serde_json::from_slice(&frame.payload)?;
                Ok(SceneMessage::Viewport {
                    width: viewport.width,
                    height: viewport.height,
                })
            }
            DataId::Gltf => {
                let doc: GltfDocument = serde_json::from_slice(&frame.payload)?;
                if !doc.nodes.is_null() {
                    log::debug!("GeometryBatch nodes: {}", doc.nodes);
                }
                if frame.method == MethodId::Delete {
                    return Ok(SceneMessage::RemoveMeshes(doc.meshes.into_keys().collect()));
                }
                Ok(SceneMessage::GeometryBatch(decode_batch(&doc)?))
            }
        }
    }
}

/// Sixteen floats in row-major order
fn parse_matrix(payload: &[u8]) -> Result<Mat4, DecodeError> {
    let matrix: MatrixPayload = serde_json::from_slice(payload)?;
    Ok(Mat4::from_cols_array(&matrix.data).transpose())
}
