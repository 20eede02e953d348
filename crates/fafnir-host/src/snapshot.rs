//! PNG snapshots of received frames

use std::path::Path;

use image::ImageEncoder;

use crate::error::HostError;
use crate::session::ReceivedImage;

/// Rows reordered top first, as image files expect
pub fn top_first_rows(frame: &ReceivedImage) -> Result<Vec<u8>, HostError> {
    let row_bytes = frame.width as usize * 3;
    if frame.pixels.len() != row_bytes * frame.height as usize {
        return Err(HostError::InvalidImage {
            width: frame.width,
            height: frame.height,
            actual: frame.pixels.len(),
        });
    }
    if row_bytes == 0 {
        return Ok(Vec::new());
    }
    Ok(frame.pixels.chunks_exact(row_bytes).rev().flatten().copied().collect())
}

pub fn encode_png(frame: &ReceivedImage) -> Result<Vec<u8>, HostError> {
    let rgb = top_first_rows(frame)?;
    let mut png_data = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_data).write_image(
        &rgb,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(png_data)
}

pub fn save_png(frame: &ReceivedImage, path: &Path) -> Result<(), HostError> {
    std::fs::write(path, encode_png(frame)?)?;
    log::info!("Saved {}x{} frame to {}", frame.width, frame.height, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_rows() -> ReceivedImage {
        // Bottom row red, top row blue
        ReceivedImage {
            width: 1,
            height: 2,
            pixels: vec![255, 0, 0, 0, 0, 255],
        }
    }

    #[test]
    fn test_rows_flipped_to_top_first() {
        assert_eq!(top_first_rows(&two_rows()).unwrap(), vec![0, 0, 255, 255, 0, 0]);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let frame = ReceivedImage { width: 2, height: 2, pixels: vec![0; 3] };
        assert!(matches!(encode_png(&frame), Err(HostError::InvalidImage { .. })));
    }

    #[test]
    fn test_png_decodes_back() {
        let png = encode_png(&two_rows()).unwrap();
        let loaded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (1, 2));
        assert_eq!(loaded.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(loaded.get_pixel(0, 1).0, [255, 0, 0]);
    }
}
