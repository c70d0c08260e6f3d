//! Native camera backend built on nokhwa
//!
//! nokhwa reports neither device type nor facing, so both are inferred from
//! the device name. USB cameras come out as `External` with an unspecified
//! position.

use super::{CameraBackend, DeviceInput, OutputSettings};
use crate::errors::CameraError;
use crate::timing::PTSClock;
use crate::types::{
    CameraDeviceInfo, CameraPosition, DeviceType, PixelBuffer, PixelFormat, SampleBuffer,
};
use bytes::Bytes;
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution,
    },
    Camera,
};

#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for NativeBackend {
    fn devices(&self) -> Result<Vec<CameraDeviceInfo>, CameraError> {
        let cameras = query(ApiBackend::Auto).map_err(|e| {
            CameraError::InitializationError(format!("Failed to query cameras: {}", e))
        })?;

        Ok(cameras
            .into_iter()
            .map(|info| {
                let name = info.human_name();
                CameraDeviceInfo::new(info.index().to_string(), name.clone())
                    .with_type(infer_device_type(&name))
                    .with_position(infer_position(&name))
            })
            .collect())
    }

    fn open_input(
        &self,
        device: &CameraDeviceInfo,
        settings: &OutputSettings,
    ) -> Result<Box<dyn DeviceInput>, CameraError> {
        let index = device
            .id
            .parse::<u32>()
            .map_err(|_| {
                CameraError::InputUnavailable(format!("Invalid device ID {}", device.id))
            })?;

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(settings.width, settings.height),
                frame_format_for(settings.pixel_format),
                settings.fps,
            ),
        ));

        let camera = Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
            CameraError::InputUnavailable(format!("Failed to open camera {}: {}", device.id, e))
        })?;

        Ok(Box::new(NativeInput {
            device: device.clone(),
            camera,
            clock: PTSClock::new(),
        }))
    }
}

struct NativeInput {
    device: CameraDeviceInfo,
    camera: Camera,
    clock: PTSClock,
}

// SAFETY: a NativeInput is opened, driven and dropped on the capture thread
// and never shared; the session only crosses threads before any input exists.
unsafe impl Send for NativeInput {}

impl DeviceInput for NativeInput {
    fn device(&self) -> &CameraDeviceInfo {
        &self.device
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.camera.open_stream().map_err(|e| {
            CameraError::InitializationError(format!("Failed to start stream: {}", e))
        })
    }

    fn next_sample(&mut self) -> Result<Option<SampleBuffer>, CameraError> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| CameraError::CaptureError(format!("Failed to capture frame: {}", e)))?;
        let time = self.clock.now();

        let image = pixel_format_for(frame.source_frame_format()).map(|format| {
            let resolution = frame.resolution();
            PixelBuffer::new(
                Bytes::copy_from_slice(frame.buffer()),
                resolution.width_x,
                resolution.height_y,
                format,
            )
        });

        Ok(Some(SampleBuffer { image, presentation_time: time }))
    }

    fn stop(&mut self) -> Result<(), CameraError> {
        self.camera.stop_stream().map_err(|e| {
            CameraError::StreamError(format!("Failed to stop stream: {}", e))
        })
    }
}

fn frame_format_for(format: PixelFormat) -> FrameFormat {
    match format {
        PixelFormat::Nv12FullRange | PixelFormat::Nv12VideoRange => FrameFormat::NV12,
        PixelFormat::Yuyv => FrameFormat::YUYV,
        PixelFormat::Mjpeg => FrameFormat::MJPEG,
        PixelFormat::Rgb | PixelFormat::Bgra => FrameFormat::RAWRGB,
    }
}

// Formats without a PixelFormat counterpart surface as samples without image data.
fn pixel_format_for(format: FrameFormat) -> Option<PixelFormat> {
    match format {
        FrameFormat::NV12 => Some(PixelFormat::Nv12VideoRange),
        FrameFormat::YUYV => Some(PixelFormat::Yuyv),
        FrameFormat::MJPEG => Some(PixelFormat::Mjpeg),
        FrameFormat::RAWRGB => Some(PixelFormat::Rgb),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn infer_device_type(name: &str) -> DeviceType {
    let name = name.to_lowercase();
    if name.contains("ultra wide") {
        DeviceType::BuiltInUltraWideCamera
    } else if name.contains("telephoto") {
        DeviceType::BuiltInTelephotoCamera
    } else if name.contains("dual") {
        DeviceType::BuiltInDualCamera
    } else if infer_position(&name) != CameraPosition::Unspecified {
        DeviceType::BuiltInWideAngleCamera
    } else {
        DeviceType::External
    }
}

fn infer_position(name: &str) -> CameraPosition {
    let name = name.to_lowercase();
    if name.contains("back") || name.contains("rear") {
        CameraPosition::Back
    } else if name.contains("front") || name.contains("facetime") {
        CameraPosition::Front
    } else {
        CameraPosition::Unspecified
    }
}
