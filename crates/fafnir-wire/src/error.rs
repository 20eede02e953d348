//! Transport error taxonomy

use std::io;
use thiserror::Error;

/// Errors raised while reading or writing wire frames
#[derive(Debug, Error)]
pub enum WireError {
    #[error("peer closed the connection")]
    PeerClosed,

    #[error("connection reset: {0}")]
    ConnectionReset(io::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid command byte 0x{0:02x}")]
    InvalidCommand(u8),

    #[error("declared payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("output send timed out after {sent} of {total} bytes")]
    SendTimedOut { sent: usize, total: usize },

    #[error("output dimension {0} does not fit the 16-bit header")]
    DimensionOverflow(u32),

    #[error("output has {actual} pixel bytes, header declares {expected}")]
    PixelCountMismatch { expected: usize, actual: usize },
}

impl WireError {
    /// Map an I/O error, separating resets from other failures
    pub fn from_io(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => WireError::ConnectionReset(error),
            io::ErrorKind::UnexpectedEof => WireError::PeerClosed,
            _ => WireError::Io(error),
        }
    }

    /// Whether the connection can no longer be used.
    ///
    /// Only a send timeout leaves the connection in service. Any bytes it
    /// did not send must go out before the next image.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WireError::SendTimedOut { .. })
    }
}
