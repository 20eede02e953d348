//! One renderer connection

use fafnir_wire::{Frame, OutputHeader};
use fafnir_wire::codec::OUTPUT_HEADER_BYTES;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::HostError;
use crate::scene::HostScene;

/// An RGB8 frame as sent by the renderer, bottom row first
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub struct HostSession<S> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> HostSession<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> Result<(), HostError> {
        self.stream.write_all(&frame.encode()?).await?;
        log::debug!("Sent {:?}/{:?} ({} bytes)", frame.method, frame.data, frame.payload_size());
        Ok(())
    }

    pub async fn send_scene(&mut self, scene: &HostScene) -> Result<(), HostError> {
        for frame in scene.frames()? {
            self.send_frame(&frame).await?;
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Wait for the next outbound image
    pub async fn read_output(&mut self) -> Result<ReceivedImage, HostError> {
        let mut head = [0u8; OUTPUT_HEADER_BYTES];
        self.stream.read_exact(&mut head).await?;
        let header = OutputHeader::decode(head);

        let mut pixels = vec![0u8; header.pixel_bytes()];
        self.stream.read_exact(&mut pixels).await?;
        Ok(ReceivedImage {
            width: header.width as u32,
            height: header.height as u32,
            pixels,
        })
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
