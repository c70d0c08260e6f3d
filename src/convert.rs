//! Pixel buffer to RGB conversion for previews and snapshots.

use crate::errors::CameraError;
use crate::types::{PixelBuffer, PixelFormat};
use image::RgbImage;

/// Convert a captured buffer to an RGB image.
pub fn to_rgb_image(buffer: &PixelBuffer) -> Result<RgbImage, CameraError> {
    // compressed formats have no fixed frame length
    let Some(expected) = buffer.format.frame_len(buffer.width, buffer.height) else {
        return image::load_from_memory_with_format(&buffer.data, image::ImageFormat::Jpeg)
            .map(|img| img.to_rgb8())
            .map_err(|e| CameraError::CaptureError(format!("JPEG decode failed: {}", e)));
    };
    if buffer.data.len() < expected {
        return Err(CameraError::CaptureError(format!(
            "buffer too short for {}x{} {:?}: {} < {}",
            buffer.width,
            buffer.height,
            buffer.format,
            buffer.data.len(),
            expected
        )));
    }

    let (w, h) = (buffer.width, buffer.height);
    let rgb = match buffer.format {
        PixelFormat::Nv12FullRange => nv12_to_rgb(&buffer.data, w, h, true),
        PixelFormat::Nv12VideoRange => nv12_to_rgb(&buffer.data, w, h, false),
        PixelFormat::Yuyv => yuyv_to_rgb(&buffer.data, w, h),
        PixelFormat::Bgra => buffer.data[..expected]
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
        PixelFormat::Rgb | PixelFormat::Mjpeg => buffer.data[..expected].to_vec(),
    };

    RgbImage::from_vec(buffer.width, buffer.height, rgb)
        .ok_or_else(|| CameraError::CaptureError("failed to build RGB image".to_string()))
}

/// BT.601 YCbCr to RGB in 8.8 fixed point.
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8, full_range: bool) -> [u8; 3] {
    let d = cb as i32 - 128;
    let e = cr as i32 - 128;

    let (r, g, b) = if full_range {
        let c = (y as i32) << 8;
        (
            (c + 359 * e + 128) >> 8,
            (c - 88 * d - 183 * e + 128) >> 8,
            (c + 454 * d + 128) >> 8,
        )
    } else {
        let c = 298 * (y as i32 - 16);
        (
            (c + 409 * e + 128) >> 8,
            (c - 100 * d - 208 * e + 128) >> 8,
            (c + 516 * d + 128) >> 8,
        )
    };

    [
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    ]
}

fn nv12_to_rgb(data: &[u8], width: u32, height: u32, full_range: bool) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let chroma_stride = 2 * w.div_ceil(2);
    let (y_plane, uv_plane) = data.split_at(w * h);

    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        for col in 0..w {
            let uv = (row / 2) * chroma_stride + (col / 2) * 2;
            rgb.extend_from_slice(&ycbcr_to_rgb(
                y_plane[row * w + col],
                uv_plane[uv],
                uv_plane[uv + 1],
                full_range,
            ));
        }
    }
    rgb
}

fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        for col in 0..w {
            let pair = row * w * 2 + (col / 2) * 4;
            let y = data[row * w * 2 + col * 2];
            // odd widths leave the last pixel without a Cr sample
            let cr = data.get(pair + 3).copied().unwrap_or(128);
            rgb.extend_from_slice(&ycbcr_to_rgb(y, data[pair + 1], cr, false));
        }
    }
    rgb
}
