//! Protocol ids and small JSON payload definitions

use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// What the host wants done with the data in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodId {
    Add,
    Update,
    Delete,
}

impl MethodId {
    pub fn to_nibble(self) -> u8 {
        match self {
            MethodId::Add => 0,
            MethodId::Update => 1,
            MethodId::Delete => 2,
        }
    }

    pub fn from_nibble(value: u8) -> Option<Self> {
        match value {
            0 => Some(MethodId::Add),
            1 => Some(MethodId::Update),
            2 => Some(MethodId::Delete),
            _ => None,
        }
    }
}

/// Which kind of data a frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataId {
    /// 4x4 view matrix
    View,
    /// 4x4 projection matrix
    Projection,
    /// Host viewport size in pixels
    Viewport,
    /// glTF-subset geometry batch
    Gltf,
}

impl DataId {
    pub fn to_nibble(self) -> u8 {
        match self {
            DataId::View => 0,
            DataId::Projection => 1,
            DataId::Viewport => 2,
            DataId::Gltf => 3,
        }
    }

    pub fn from_nibble(value: u8) -> Option<Self> {
        match value {
            0 => Some(DataId::View),
            1 => Some(DataId::Projection),
            2 => Some(DataId::Viewport),
            3 => Some(DataId::Gltf),
            _ => None,
        }
    }
}

/// Pack a method and data id into the single command byte
pub fn encode_command(method: MethodId, data: DataId) -> u8 {
    (method.to_nibble() << 4) | (data.to_nibble() & 0x0F)
}

/// Split a command byte back into its method and data ids
pub fn decode_command(byte: u8) -> Result<(MethodId, DataId), WireError> {
    let method = MethodId::from_nibble((byte & 0xF0) >> 4);
    let data = DataId::from_nibble(byte & 0x0F);
    match (method, data) {
        (Some(method), Some(data)) => Ok((method, data)),
        _ => Err(WireError::InvalidCommand(byte)),
    }
}

/// Payload of View and Projection frames: 16 floats, row-major
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixPayload {
    pub data: [f32; 16],
}

/// Payload of Viewport frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportPayload {
    pub width: u32,
    pub height: u32,
}
