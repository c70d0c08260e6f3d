//! Synthetic camera data
//!
//! Deterministic frames and device lists shaped like a phone's camera
//! cluster, so the whole pipeline runs without hardware.

use crate::types::{CameraDeviceInfo, CameraPosition, DeviceType, PixelBuffer, PixelFormat};

/// Create a synthetic frame in `format` for the given frame number.
///
/// NV12 frames carry a luma gradient that shifts every frame over neutral
/// chroma; packed formats get a per-position byte pattern. Compressed
/// formats have no synthetic representation and yield `None`.
pub fn synthetic_frame(
    frame_number: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Option<PixelBuffer> {
    let len = format.frame_len(width, height)?;
    let base = (frame_number % 256) as u8;

    let data = match format {
        PixelFormat::Nv12FullRange | PixelFormat::Nv12VideoRange => {
            let mut data = vec![128u8; len];
            for y in 0..height {
                for x in 0..width {
                    let idx = (y * width + x) as usize;
                    data[idx] = base.wrapping_add(((x + y) % 256) as u8);
                }
            }
            data
        }
        _ => (0..len)
            .map(|i| base.wrapping_add((i % 251) as u8))
            .collect(),
    };

    Some(PixelBuffer::new(data, width, height, format))
}

/// Camera cluster of a typical phone, in the order discovery reports it.
pub fn phone_camera_devices() -> Vec<CameraDeviceInfo> {
    vec![
        CameraDeviceInfo::new("front-wide", "Front Camera")
            .with_type(DeviceType::BuiltInWideAngleCamera)
            .with_position(CameraPosition::Front),
        CameraDeviceInfo::new("back-ultra-wide", "Back Ultra Wide Camera")
            .with_type(DeviceType::BuiltInUltraWideCamera)
            .with_position(CameraPosition::Back),
        CameraDeviceInfo::new("back-wide", "Back Camera")
            .with_type(DeviceType::BuiltInWideAngleCamera)
            .with_position(CameraPosition::Back),
        CameraDeviceInfo::new("back-tele", "Back Telephoto Camera")
            .with_type(DeviceType::BuiltInTelephotoCamera)
            .with_position(CameraPosition::Back),
    ]
}
