//! Core value types shared by the capture, bridge and RTC layers.

use crate::timing::MediaTime;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical camera type, as reported by device discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    BuiltInUltraWideCamera,
    BuiltInWideAngleCamera,
    BuiltInTelephotoCamera,
    BuiltInDualCamera,
    External,
}

/// Which way the camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraPosition {
    Back,
    Front,
    /// Matches every position when used in a discovery request.
    Unspecified,
}

impl CameraPosition {
    pub fn matches(self, device_position: CameraPosition) -> bool {
        self == CameraPosition::Unspecified || self == device_position
    }
}

/// A discoverable camera device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDeviceInfo {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub position: CameraPosition,
}

impl CameraDeviceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type: DeviceType::External,
            position: CameraPosition::Unspecified,
        }
    }

    pub fn with_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    pub fn with_position(mut self, position: CameraPosition) -> Self {
        self.position = position;
        self
    }
}

impl fmt::Display for CameraDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {:?}/{:?})",
            self.name, self.id, self.device_type, self.position
        )
    }
}

/// Pixel layout of a captured buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Bi-planar 4:2:0, full range luma. Default capture format.
    Nv12FullRange,
    Nv12VideoRange,
    Bgra,
    Yuyv,
    Mjpeg,
    Rgb,
}

impl PixelFormat {
    /// Expected byte length of a tightly packed frame, `None` for compressed formats.
    pub fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        let (w, h) = (width as usize, height as usize);
        match self {
            PixelFormat::Nv12FullRange | PixelFormat::Nv12VideoRange => {
                Some(w * h + 2 * w.div_ceil(2) * h.div_ceil(2))
            }
            PixelFormat::Bgra => Some(w * h * 4),
            PixelFormat::Yuyv => Some(w * h * 2),
            PixelFormat::Rgb => Some(w * h * 3),
            PixelFormat::Mjpeg => None,
        }
    }
}

/// Reference to camera-produced pixel data.
///
/// Cloning is cheap: the bytes are shared, not copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl PixelBuffer {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            format,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One timestamped unit of captured media.
///
/// `image` is `None` when the camera delivered a sample without
/// extractable pixel data.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub image: Option<PixelBuffer>,
    pub presentation_time: MediaTime,
}

impl SampleBuffer {
    pub fn with_image(image: PixelBuffer, presentation_time: MediaTime) -> Self {
        Self {
            image: Some(image),
            presentation_time,
        }
    }

    pub fn empty(presentation_time: MediaTime) -> Self {
        Self {
            image: None,
            presentation_time,
        }
    }
}

/// Clockwise rotation the receiver must apply to display a frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {other}")),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees() as u16
    }
}

/// Physical orientation of the device holding the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    Portrait,
    PortraitUpsideDown,
    /// Device rotated so the top edge points left.
    LandscapeLeft,
    /// Device rotated so the top edge points right.
    LandscapeRight,
    FaceUp,
    FaceDown,
    Unknown,
}

impl DeviceOrientation {
    /// Whether this orientation says anything about how the image is rotated.
    pub fn is_interface_orientation(self) -> bool {
        matches!(
            self,
            DeviceOrientation::Portrait
                | DeviceOrientation::PortraitUpsideDown
                | DeviceOrientation::LandscapeLeft
                | DeviceOrientation::LandscapeRight
        )
    }
}

/// A frame after it crossed from the capture thread to the forwarder.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub buffer: PixelBuffer,
    pub timestamp: MediaTime,
    pub rotation: Rotation,
}

/// Pixel format code understood by the RTC engine's external source API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalFrameFormat {
    I420,
    Bgra,
    Nv21,
    Rgba,
    Nv12,
    /// Opaque platform pixel buffer reference.
    PixelBuffer,
}

impl ExternalFrameFormat {
    pub fn code(self) -> i32 {
        match self {
            ExternalFrameFormat::I420 => 1,
            ExternalFrameFormat::Bgra => 2,
            ExternalFrameFormat::Nv21 => 3,
            ExternalFrameFormat::Rgba => 4,
            ExternalFrameFormat::Nv12 => 8,
            ExternalFrameFormat::PixelBuffer => 12,
        }
    }
}

/// Frame record handed to the RTC engine, discarded after the push.
#[derive(Debug, Clone)]
pub struct ExternalVideoFrame {
    pub format: ExternalFrameFormat,
    pub buffer: PixelBuffer,
    pub rotation: Rotation,
    pub time: MediaTime,
}

impl ExternalVideoFrame {
    pub fn from_captured(frame: CapturedFrame, format: ExternalFrameFormat) -> Self {
        Self {
            format,
            buffer: frame.buffer,
            rotation: frame.rotation,
            time: frame.timestamp,
        }
    }

    pub fn format_code(&self) -> i32 {
        self.format.code()
    }
}

/// Integer rectangle used for surface and layer geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Same size, origin at zero.
    pub fn bounds(self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}
