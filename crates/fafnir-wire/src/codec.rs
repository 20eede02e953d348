//! Frame codec - command/size/payload framing with chunked reassembly

use std::io;

use serde::Serialize;

use crate::error::WireError;
use crate::protocol::{decode_command, encode_command, DataId, MethodId};
use crate::transport::Transport;

/// Bytes in the size field following the command byte
pub const SIZE_FIELD_BYTES: usize = 4;

/// Bytes in the outbound width/height header
pub const OUTPUT_HEADER_BYTES: usize = 4;

/// Bytes per outbound pixel (RGB8)
pub const OUTPUT_BYTES_PER_PIXEL: usize = 3;

/// One inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub method: MethodId,
    pub data: DataId,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(method: MethodId, data: DataId, payload: Vec<u8>) -> Self {
        Self { method, data, payload }
    }

    /// Build a frame whose payload is `value` serialized as JSON
    pub fn json<T: Serialize>(method: MethodId, data: DataId, value: &T) -> serde_json::Result<Self> {
        Ok(Self::new(method, data, serde_json::to_vec(value)?))
    }

    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Serialize to the on-wire byte layout
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let size = size_field(self.payload.len())?;
        let mut bytes = Vec::with_capacity(1 + SIZE_FIELD_BYTES + self.payload.len());
        bytes.push(encode_command(self.method, self.data));
        bytes.extend_from_slice(&size);
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }
}

/// Encode a payload length as the 32-bit size field
fn size_field(len: usize) -> Result<[u8; SIZE_FIELD_BYTES], WireError> {
    u32::try_from(len)
        .map(u32::to_ne_bytes)
        .map_err(|_| WireError::PayloadTooLarge {
            size: len,
            limit: u32::MAX as usize,
        })
}

/// Reads frames off a transport.
///
/// The command byte is probed without blocking; once it arrives the size and
/// payload are read in blocking mode, so a frame is never left half-consumed
/// between calls.
#[derive(Debug, Clone)]
pub struct FrameReader {
    chunk_bytes: usize,
    max_payload_bytes: usize,
}

impl FrameReader {
    pub fn new(chunk_bytes: usize, max_payload_bytes: usize) -> Self {
        Self {
            chunk_bytes: chunk_bytes.max(1),
            max_payload_bytes,
        }
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// Return the next frame, or `None` if no command byte is available yet
    pub fn try_read_frame<T: Transport>(&self, transport: &mut T) -> Result<Option<Frame>, WireError> {
        transport.set_nonblocking(true).map_err(WireError::from_io)?;

        let mut command = [0u8; 1];
        loop {
            match transport.read(&mut command) {
                Ok(0) => return Err(WireError::PeerClosed),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(WireError::from_io(e)),
            }
        }

        transport.set_nonblocking(false).map_err(WireError::from_io)?;

        let (method, data) = decode_command(command[0])?;

        let mut size = [0u8; SIZE_FIELD_BYTES];
        read_full(transport, &mut size)?;
        let size = u32::from_ne_bytes(size) as usize;
        if size > self.max_payload_bytes {
            return Err(WireError::PayloadTooLarge {
                size,
                limit: self.max_payload_bytes,
            });
        }

        let payload = self.read_payload(transport, size)?;
        log::debug!("Frame {:?}/{:?}: {} bytes", method, data, size);

        Ok(Some(Frame { method, data, payload }))
    }

    /// Receive at most `chunk_bytes` at a time until `size` bytes have arrived
    fn read_payload<T: Transport>(&self, transport: &mut T, size: usize) -> Result<Vec<u8>, WireError> {
        let mut payload = Vec::with_capacity(size);
        let mut chunk = vec![0u8; self.chunk_bytes.min(size)];

        while payload.len() < size {
            let want = self.chunk_bytes.min(size - payload.len());
            match transport.read(&mut chunk[..want]) {
                Ok(0) => return Err(WireError::PeerClosed),
                Ok(n) => payload.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(WireError::from_io(e)),
            }
        }

        Ok(payload)
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(crate::DEFAULT_CHUNK_BYTES, crate::DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

fn read_full<T: Transport>(transport: &mut T, buf: &mut [u8]) -> Result<(), WireError> {
    let mut filled = 0;
    while filled < buf.len() {
        match transport.read(&mut buf[filled..]) {
            Ok(0) => return Err(WireError::PeerClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WireError::from_io(e)),
        }
    }
    Ok(())
}

/// Width/height prefix of an outbound image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputHeader {
    pub width: u16,
    pub height: u16,
}

impl OutputHeader {
    pub fn new(width: u32, height: u32) -> Result<Self, WireError> {
        let width = u16::try_from(width).map_err(|_| WireError::DimensionOverflow(width))?;
        let height = u16::try_from(height).map_err(|_| WireError::DimensionOverflow(height))?;
        Ok(Self { width, height })
    }

    pub fn pixel_bytes(&self) -> usize {
        self.width as usize * self.height as usize * OUTPUT_BYTES_PER_PIXEL
    }

    pub fn encode(&self) -> [u8; OUTPUT_HEADER_BYTES] {
        let w = self.width.to_ne_bytes();
        let h = self.height.to_ne_bytes();
        [w[0], w[1], h[0], h[1]]
    }

    pub fn decode(bytes: [u8; OUTPUT_HEADER_BYTES]) -> Self {
        Self {
            width: u16::from_ne_bytes([bytes[0], bytes[1]]),
            height: u16::from_ne_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// Send one RGB8 image in blocking mode.
///
/// Returns the number of bytes written. A write timeout surfaces as
/// `WireError::SendTimedOut`; when `sent` is non-zero the caller owns the
/// unsent tail and must deliver it with [`send_pending`] before anything else.
pub fn send_output<T: Transport>(transport: &mut T, header: OutputHeader, pixels: &[u8]) -> Result<usize, WireError> {
    if pixels.len() != header.pixel_bytes() {
        return Err(WireError::PixelCountMismatch {
            expected: header.pixel_bytes(),
            actual: pixels.len(),
        });
    }

    transport.set_nonblocking(false).map_err(WireError::from_io)?;

    let total = OUTPUT_HEADER_BYTES + pixels.len();
    let head = header.encode();
    write_full(transport, &head, 0, total)?;
    write_full(transport, pixels, OUTPUT_HEADER_BYTES, total)?;
    transport.flush().map_err(WireError::from_io)?;
    Ok(total)
}

/// Write the unsent tail of an earlier image in blocking mode.
///
/// A timeout reports how many of `bytes` made it out.
pub fn send_pending<T: Transport>(transport: &mut T, bytes: &[u8]) -> Result<usize, WireError> {
    transport.set_nonblocking(false).map_err(WireError::from_io)?;
    write_full(transport, bytes, 0, bytes.len())?;
    transport.flush().map_err(WireError::from_io)?;
    Ok(bytes.len())
}

fn write_full<T: Transport>(transport: &mut T, bytes: &[u8], already_sent: usize, total: usize) -> Result<(), WireError> {
    let mut sent = 0;
    while sent < bytes.len() {
        match transport.write(&bytes[sent..]) {
            Ok(0) => return Err(WireError::PeerClosed),
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(WireError::SendTimedOut {
                    sent: already_sent + sent,
                    total,
                });
            }
            Err(e) => return Err(WireError::from_io(e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;

    const CHUNK: usize = 64;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_frame_encode_layout() {
        let frame = Frame::new(MethodId::Update, DataId::Viewport, vec![1, 2, 3]);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes[0], 0x12);
        assert_eq!(u32::from_ne_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]), 3);
        assert_eq!(&bytes[5..], &[1, 2, 3]);
    }

    #[test]
    fn test_round_trip_across_chunk_boundaries() {
        let reader = FrameReader::new(CHUNK, 1 << 20);
        for size in [0, 1, CHUNK, CHUNK + 1, CHUNK * 3, CHUNK * 7 + 5] {
            let frame = Frame::new(MethodId::Add, DataId::Gltf, pattern(size));
            let mut transport = MemoryTransport::new();
            transport.push_inbound(&frame.encode().unwrap());

            let decoded = reader.try_read_frame(&mut transport).unwrap().unwrap();
            assert_eq!(decoded, frame, "size {}", size);
        }
    }

    #[test]
    fn test_round_trip_real_chunk_cap() {
        let reader = FrameReader::default();
        let size = crate::DEFAULT_CHUNK_BYTES + 1;
        let frame = Frame::new(MethodId::Update, DataId::Gltf, pattern(size));
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&frame.encode().unwrap());

        let decoded = reader.try_read_frame(&mut transport).unwrap().unwrap();
        assert_eq!(decoded.payload.len(), size);
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_single_byte_delivery() {
        let reader = FrameReader::new(CHUNK, 1 << 20);
        let first = Frame::new(MethodId::Add, DataId::View, pattern(CHUNK * 2 + 3));
        let second = Frame::new(MethodId::Update, DataId::Projection, pattern(17));

        let mut transport = MemoryTransport::new().with_read_limit(1);
        transport.push_inbound(&first.encode().unwrap());
        transport.push_inbound(&second.encode().unwrap());

        assert_eq!(reader.try_read_frame(&mut transport).unwrap().unwrap(), first);
        assert_eq!(reader.try_read_frame(&mut transport).unwrap().unwrap(), second);
        assert!(reader.try_read_frame(&mut transport).unwrap().is_none());
    }

    #[test]
    fn test_no_frame_available() {
        let reader = FrameReader::new(CHUNK, 1 << 20);
        let mut transport = MemoryTransport::new();
        assert!(reader.try_read_frame(&mut transport).unwrap().is_none());
    }

    #[test]
    fn test_peer_closed_is_fatal() {
        let reader = FrameReader::new(CHUNK, 1 << 20);
        let mut transport = MemoryTransport::new();
        transport.close();
        let err = reader.try_read_frame(&mut transport).unwrap_err();
        assert!(matches!(err, WireError::PeerClosed));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_truncated_payload_is_fatal() {
        let reader = FrameReader::new(CHUNK, 1 << 20);
        let frame = Frame::new(MethodId::Add, DataId::Gltf, pattern(100));
        let bytes = frame.encode().unwrap();
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&bytes[..50]);
        transport.close();
        assert!(matches!(reader.try_read_frame(&mut transport), Err(WireError::PeerClosed)));
    }

    #[test]
    fn test_payload_limit() {
        let reader = FrameReader::new(CHUNK, 10);
        let frame = Frame::new(MethodId::Add, DataId::Gltf, pattern(11));
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&frame.encode().unwrap());
        assert!(matches!(
            reader.try_read_frame(&mut transport),
            Err(WireError::PayloadTooLarge { size: 11, limit: 10 })
        ));
    }

    #[test]
    fn test_send_output_partial_writes() {
        let header = OutputHeader::new(4, 2).unwrap();
        let pixels = pattern(header.pixel_bytes());
        let mut transport = MemoryTransport::new().with_write_limit(1);

        let sent = send_output(&mut transport, header, &pixels).unwrap();
        assert_eq!(sent, OUTPUT_HEADER_BYTES + pixels.len());

        let out = transport.outbound();
        assert_eq!(OutputHeader::decode([out[0], out[1], out[2], out[3]]), header);
        assert_eq!(&out[OUTPUT_HEADER_BYTES..], &pixels[..]);
    }

    #[test]
    fn test_send_output_timeout() {
        let header = OutputHeader::new(8, 8).unwrap();
        let pixels = pattern(header.pixel_bytes());
        let mut transport = MemoryTransport::new().with_write_budget(20);

        let err = send_output(&mut transport, header, &pixels).unwrap_err();
        assert!(matches!(err, WireError::SendTimedOut { sent: 20, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_send_pending_resumes_image() {
        let header = OutputHeader::new(8, 8).unwrap();
        let pixels = pattern(header.pixel_bytes());
        let mut transport = MemoryTransport::new().with_write_budget(20);

        let Err(WireError::SendTimedOut { sent, total }) = send_output(&mut transport, header, &pixels) else {
            panic!("expected timeout");
        };
        let mut whole = header.encode().to_vec();
        whole.extend_from_slice(&pixels);
        assert_eq!(total, whole.len());

        transport.refill_write_budget(usize::MAX);
        assert_eq!(send_pending(&mut transport, &whole[sent..]).unwrap(), total - sent);
        assert_eq!(transport.outbound(), &whole[..]);
    }

    #[test]
    fn test_size_field_rejects_oversized_payload() {
        assert_eq!(size_field(3).unwrap(), 3u32.to_ne_bytes());
        assert_eq!(size_field(u32::MAX as usize).unwrap(), u32::MAX.to_ne_bytes());
        assert!(matches!(
            size_field(u32::MAX as usize + 1),
            Err(WireError::PayloadTooLarge { size, .. }) if size == u32::MAX as usize + 1
        ));
    }

    #[test]
    fn test_send_output_pixel_mismatch() {
        let header = OutputHeader::new(2, 2).unwrap();
        let mut transport = MemoryTransport::new();
        assert!(matches!(
            send_output(&mut transport, header, &[0u8; 5]),
            Err(WireError::PixelCountMismatch { expected: 12, actual: 5 })
        ));
        assert!(transport.outbound().is_empty());
    }

    #[test]
    fn test_header_dimension_overflow() {
        assert!(OutputHeader::new(65535, 1).is_ok());
        assert!(matches!(OutputHeader::new(65536, 1), Err(WireError::DimensionOverflow(65536))));
    }
}
