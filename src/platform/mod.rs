//! Camera subsystem abstraction
//!
//! A `CameraBackend` discovers devices and opens inputs on them. Inputs are
//! created, driven and dropped on the capture thread; `Send` is only needed
//! to move the session onto that thread.

use crate::errors::CameraError;
use crate::types::{CameraDeviceInfo, CameraPosition, DeviceType, PixelFormat, SampleBuffer};

#[cfg(feature = "native")]
pub mod native;
pub mod synthetic;

#[cfg(feature = "native")]
pub use native::NativeBackend;
pub use synthetic::{ScriptedSample, SyntheticBackend};

/// Output settings requested from an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Platform camera backend.
pub trait CameraBackend: Send + Sync {
    /// All devices known to the backend, in discovery order.
    fn devices(&self) -> Result<Vec<CameraDeviceInfo>, CameraError>;

    /// Construct an input for `device`. Failure leaves no side effects.
    fn open_input(
        &self,
        device: &CameraDeviceInfo,
        settings: &OutputSettings,
    ) -> Result<Box<dyn DeviceInput>, CameraError>;

    /// Devices of one of `device_types` at `position`, in discovery order.
    fn discover(
        &self,
        device_types: &[DeviceType],
        position: CameraPosition,
    ) -> Result<Vec<CameraDeviceInfo>, CameraError> {
        Ok(self
            .devices()?
            .into_iter()
            .filter(|d| device_types.contains(&d.device_type) && position.matches(d.position))
            .collect())
    }
}

/// An opened camera input.
pub trait DeviceInput: Send {
    fn device(&self) -> &CameraDeviceInfo;

    fn start(&mut self) -> Result<(), CameraError>;

    /// Next sample, blocking until one is available. `Ok(None)` means the
    /// input has no more samples to deliver.
    fn next_sample(&mut self) -> Result<Option<SampleBuffer>, CameraError>;

    fn stop(&mut self) -> Result<(), CameraError>;
}

/// First device of a preferred type at the requested position.
pub fn first_matching_device(
    backend: &dyn CameraBackend,
    device_types: &[DeviceType],
    position: CameraPosition,
) -> Result<Option<CameraDeviceInfo>, CameraError> {
    Ok(backend.discover(device_types, position)?.into_iter().next())
}
