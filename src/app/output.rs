//! Output encoder: readiness gate, output sizing and the outbound send

use fafnir_wire::{send_output, send_pending, OutputHeader, Transport, WireError};

use crate::core::types::Result;

/// Result of one output attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStatus {
    /// No Viewport has arrived yet
    NotReady,
    /// Bytes written, header included
    Sent(usize),
    /// The send timed out; whatever part of the image was not written is
    /// delivered ahead of the next one
    Skipped,
}

/// Round a requested dimension up to a power of two, clamped to `max`
pub fn output_dimension(requested: u32, max: u32) -> u32 {
    requested
        .max(1)
        .checked_next_power_of_two()
        .unwrap_or(max)
        .min(max)
}

pub struct OutputEncoder {
    ready: bool,
    width: u32,
    height: u32,
    max_dimension: u32,
    /// Unsent tail of a timed-out image
    pending: Vec<u8>,
}

impl OutputEncoder {
    /// Start unready at the rounded initial size
    pub fn new(initial_width: u32, initial_height: u32, max_dimension: u32) -> Self {
        Self {
            ready: false,
            width: output_dimension(initial_width, max_dimension),
            height: output_dimension(initial_height, max_dimension),
            max_dimension,
            pending: Vec::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes of a timed-out image still owed to the peer
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Open the gate and compute the output size for a viewport
    pub fn apply_viewport(&mut self, width: u32, height: u32) -> (u32, u32) {
        let rounded = (
            output_dimension(width, self.max_dimension),
            output_dimension(height, self.max_dimension),
        );
        if width > self.max_dimension || height > self.max_dimension {
            log::warn!(
                "Viewport {}x{} exceeds the output limit {}; clamped to {}x{}",
                width,
                height,
                self.max_dimension,
                rounded.0,
                rounded.1
            );
        }
        if rounded != (self.width, self.height) {
            log::info!("Viewport {}x{} -> output {}x{}", width, height, rounded.0, rounded.1);
        }
        self.width = rounded.0;
        self.height = rounded.1;
        self.ready = true;
        rounded
    }

    /// Send one image of `width`x`height` RGB8 pixels, if the gate is open.
    ///
    /// A leftover tail from an earlier timeout goes first; the new image is
    /// skipped if that tail cannot be finished.
    pub fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<OutputStatus> {
        if !self.ready {
            return Ok(OutputStatus::NotReady);
        }
        let header = OutputHeader::new(width, height)?;
        if pixels.len() != header.pixel_bytes() {
            return Err(WireError::PixelCountMismatch {
                expected: header.pixel_bytes(),
                actual: pixels.len(),
            }
            .into());
        }

        if !self.flush_pending(transport)? {
            return Ok(OutputStatus::Skipped);
        }

        match send_output(transport, header, pixels) {
            Ok(bytes) => Ok(OutputStatus::Sent(bytes)),
            Err(WireError::SendTimedOut { sent, total }) => {
                if sent > 0 {
                    self.pending = header
                        .encode()
                        .iter()
                        .chain(pixels)
                        .skip(sent)
                        .copied()
                        .collect();
                }
                log::warn!(
                    "Output send timed out after {} of {} bytes, {} bytes held back",
                    sent,
                    total,
                    self.pending.len()
                );
                Ok(OutputStatus::Skipped)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Finish a timed-out image. Returns false while bytes remain.
    fn flush_pending<T: Transport>(&mut self, transport: &mut T) -> Result<bool> {
        if self.pending.is_empty() {
            return Ok(true);
        }
        match send_pending(transport, &self.pending) {
            Ok(bytes) => {
                log::debug!("Flushed {} held-back output bytes", bytes);
                self.pending.clear();
                Ok(true)
            }
            Err(WireError::SendTimedOut { sent, .. }) => {
                self.pending.drain(..sent);
                log::warn!("Output still blocked, {} bytes held back", self.pending.len());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use fafnir_wire::MemoryTransport;

    #[test]
    fn test_output_dimension_rounding() {
        assert_eq!(output_dimension(300, 8192), 512);
        assert_eq!(output_dimension(200, 8192), 256);
        assert_eq!(output_dimension(256, 8192), 256);
        assert_eq!(output_dimension(0, 8192), 1);
        assert_eq!(output_dimension(10_000, 8192), 8192);
        assert_eq!(output_dimension(u32::MAX, 8192), 8192);
    }

    #[test]
    fn test_initial_size_rounded() {
        let encoder = OutputEncoder::new(1506, 871, 8192);
        assert_eq!(encoder.size(), (2048, 1024));
        assert!(!encoder.is_ready());
    }

    #[test]
    fn test_gate_closed_until_viewport() {
        let mut transport = MemoryTransport::new();
        let mut encoder = OutputEncoder::new(4, 4, 8192);
        let pixels = vec![0u8; 4 * 4 * 3];

        assert_eq!(encoder.send(&mut transport, 4, 4, &pixels).unwrap(), OutputStatus::NotReady);
        assert!(transport.outbound().is_empty());

        assert_eq!(encoder.apply_viewport(3, 3), (4, 4));
        assert_eq!(encoder.send(&mut transport, 4, 4, &pixels).unwrap(), OutputStatus::Sent(4 + 48));
        assert_eq!(transport.outbound().len(), 52);
    }

    #[test]
    fn test_timeout_skips_frame() {
        let mut transport = MemoryTransport::new().with_write_budget(0);
        let mut encoder = OutputEncoder::new(4, 4, 8192);
        encoder.apply_viewport(4, 4);
        let pixels = vec![0u8; 4 * 4 * 3];

        assert_eq!(encoder.send(&mut transport, 4, 4, &pixels).unwrap(), OutputStatus::Skipped);
        assert_eq!(encoder.pending_bytes(), 0);
        assert!(transport.outbound().is_empty());
    }

    #[test]
    fn test_partial_send_tail_precedes_next_frame() {
        let mut transport = MemoryTransport::new().with_write_budget(10);
        let mut encoder = OutputEncoder::new(4, 4, 8192);
        encoder.apply_viewport(4, 4);
        let first = vec![1u8; 4 * 4 * 3];
        let second = vec![2u8; 4 * 4 * 3];

        assert_eq!(encoder.send(&mut transport, 4, 4, &first).unwrap(), OutputStatus::Skipped);
        assert_eq!(encoder.pending_bytes(), 52 - 10);

        // Still blocked: the tail shrinks, nothing of the new frame goes out
        transport.refill_write_budget(2);
        assert_eq!(encoder.send(&mut transport, 4, 4, &second).unwrap(), OutputStatus::Skipped);
        assert_eq!(encoder.pending_bytes(), 52 - 12);

        transport.refill_write_budget(usize::MAX);
        assert_eq!(encoder.send(&mut transport, 4, 4, &second).unwrap(), OutputStatus::Sent(52));
        assert_eq!(encoder.pending_bytes(), 0);

        let out = transport.outbound();
        assert_eq!(out.len(), 2 * 52);
        for (frame, fill) in out.chunks(52).zip([1u8, 2]) {
            assert_eq!(OutputHeader::decode([frame[0], frame[1], frame[2], frame[3]]), OutputHeader::new(4, 4).unwrap());
            assert!(frame[4..].iter().all(|&b| b == fill));
        }
    }

    #[test]
    fn test_pixel_mismatch_is_error() {
        let mut transport = MemoryTransport::new();
        let mut encoder = OutputEncoder::new(4, 4, 8192);
        encoder.apply_viewport(4, 4);

        let err = encoder.send(&mut transport, 4, 4, &[0u8; 5]).unwrap_err();
        assert!(matches!(err, Error::Transport(WireError::PixelCountMismatch { .. })));
    }
}
