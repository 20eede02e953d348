//! Wire protocol for fafnir - framed scene messages in, RGB frames out
//!
//! Inbound frames are `[command:u8][size:u32 native-endian][payload]`, where the
//! command byte packs a method id (high nibble) and a data id (low nibble).
//! Outbound frames are `[width:u16][height:u16][width*height*3 bytes RGB8]`.
//!
//! ```ignore
//! let reader = FrameReader::new(DEFAULT_CHUNK_BYTES, DEFAULT_MAX_PAYLOAD_BYTES);
//! while let Some(frame) = reader.try_read_frame(&mut stream)? {
//!     handle(frame);
//! }
//! ```

pub mod codec;
pub mod document;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod transport;

pub use codec::{send_output, send_pending, Frame, FrameReader, OutputHeader};
pub use error::WireError;
pub use memory::MemoryTransport;
pub use protocol::*;
pub use transport::Transport;

/// Default port the host tool listens on
pub const DEFAULT_PORT: u16 = 4242;

/// Largest single receive issued while reassembling a payload (8 MiB)
pub const DEFAULT_CHUNK_BYTES: usize = 1 << 23;

/// Upper bound on a declared payload size before the frame is rejected
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1 << 30;
