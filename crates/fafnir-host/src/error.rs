//! Host tool errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wire error: {0}")]
    Wire(#[from] fafnir_wire::WireError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("renderer sent {actual} pixel bytes for a {width}x{height} frame")]
    InvalidImage { width: u32, height: u32, actual: usize },

    #[error("{0}")]
    Usage(String),
}
