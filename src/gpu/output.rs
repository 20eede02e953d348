//! Double-buffered output textures and RGB readback

use crate::core::error::Error;
use crate::gpu::pipelines::VoxelPipelines;

/// Bytes per texel of the Rgba8Unorm output textures
const TEXEL_BYTES: u32 = 4;

struct OutputTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// Front/back output textures plus a staging buffer for readback
pub struct OutputTargets {
    targets: [OutputTexture; 2],
    front: usize,
    staging: wgpu::Buffer,
    padded_bytes_per_row: u32,
    width: u32,
    height: u32,
}

impl OutputTargets {
    pub fn new(device: &wgpu::Device, pipelines: &VoxelPipelines, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let create = |label: &str| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipelines.output_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                }],
            });
            OutputTexture { texture, bind_group }
        };

        let padded_bytes_per_row = (width * TEXEL_BYTES).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("output_staging"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            targets: [create("output_a"), create("output_b")],
            front: 0,
            staging,
            padded_bytes_per_row,
            width,
            height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Storage binding of the buffer the next render writes
    pub fn back_bind_group(&self) -> &wgpu::BindGroup {
        &self.targets[1 - self.front].bind_group
    }

    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }

    /// Copy the front texture back and strip it to tightly packed RGB8
    pub fn read_front(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<u8>, Error> {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("output_readback_encoder"),
        });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.targets[self.front].texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        queue.submit(std::iter::once(encoder.finish()));

        let slice = self.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).ok();
        });
        device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .map_err(|e| Error::Gpu(format!("output readback poll failed: {:?}", e)))?;

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Gpu(format!("output readback map failed: {}", e))),
            Err(_) => return Err(Error::Gpu("output readback callback dropped".into())),
        }

        let data = slice.get_mapped_range();
        let rgb = strip_rows(&data, self.width, self.height, self.padded_bytes_per_row);
        drop(data);
        self.staging.unmap();
        Ok(rgb)
    }
}

/// Padded RGBA rows to tightly packed RGB rows, keeping row order
fn strip_rows(data: &[u8], width: u32, height: u32, padded_bytes_per_row: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for row in data.chunks(padded_bytes_per_row as usize).take(height as usize) {
        for texel in row[..(width * TEXEL_BYTES) as usize].chunks_exact(TEXEL_BYTES as usize) {
            rgb.extend_from_slice(&texel[..3]);
        }
    }
    rgb
}
