//! Error types for the fafnir renderer

use fafnir_wire::WireError;
use thiserror::Error;

use crate::scene::DecodeError;

/// Main error type for the renderer
#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] WireError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Allocation error: {0}")]
    Allocation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the process should stop.
    ///
    /// Decode and allocation failures only cost the offending message; a
    /// send timeout only costs one frame of output.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_fatal(),
            Error::Decode(_) | Error::Allocation(_) => false,
            Error::Gpu(_) | Error::Config(_) | Error::Io(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::from(WireError::PeerClosed).is_fatal());
        assert!(!Error::from(WireError::SendTimedOut { sent: 0, total: 1 }).is_fatal());
        assert!(!Error::from(DecodeError::MissingAccessor(3)).is_fatal());
        assert!(!Error::Allocation("voxel grid".into()).is_fatal());
        assert!(Error::Gpu("no adapter".into()).is_fatal());
    }
}
