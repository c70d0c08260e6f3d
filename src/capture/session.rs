//! Capture session: at most one device input feeding one video data output.
//!
//! The session is owned by the capture thread; nothing here is shared.

use crate::errors::CameraError;
use crate::platform::{CameraBackend, DeviceInput, OutputSettings};
use crate::types::{CameraDeviceInfo, PixelBuffer, SampleBuffer};
use tokio::sync::watch;
use uuid::Uuid;

/// Output delivering uncompressed frames in a fixed pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoDataOutput {
    pub settings: OutputSettings,
}

/// Why a device switch left the session unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The backend could not construct an input for the device.
    InputUnavailable(String),
    /// The session has no output to size the input against.
    NoOutput,
    /// The new input opened but refused to start.
    StartFailed(String),
}

/// Result of `CaptureSession::set_device`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSwitch {
    Switched {
        previous: Option<CameraDeviceInfo>,
        current: CameraDeviceInfo,
    },
    Ignored(IgnoreReason),
}

impl InputSwitch {
    pub fn is_switched(&self) -> bool {
        matches!(self, InputSwitch::Switched { .. })
    }
}

pub struct CaptureSession {
    id: Uuid,
    input: Option<Box<dyn DeviceInput>>,
    output: Option<VideoDataOutput>,
    running: bool,
    in_configuration: bool,
    preview: watch::Sender<Option<PixelBuffer>>,
}

impl CaptureSession {
    pub fn new() -> Self {
        let (preview, _) = watch::channel(None);
        Self {
            id: Uuid::new_v4(),
            input: None,
            output: None,
            running: false,
            in_configuration: false,
            preview,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn can_add_output(&self) -> bool {
        self.output.is_none()
    }

    /// Attach the video data output. Returns `false` if one is already attached.
    pub fn add_output(&mut self, output: VideoDataOutput) -> bool {
        if !self.can_add_output() {
            return false;
        }
        self.output = Some(output);
        true
    }

    pub fn input_device(&self) -> Option<&CameraDeviceInfo> {
        self.input.as_ref().map(|i| i.device())
    }

    pub fn input_count(&self) -> usize {
        usize::from(self.input.is_some())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Receiver for the most recent frame, used by preview layers.
    pub fn subscribe_preview(&self) -> watch::Receiver<Option<PixelBuffer>> {
        self.preview.subscribe()
    }

    fn begin_configuration(&mut self) {
        self.in_configuration = true;
    }

    fn commit_configuration(&mut self) {
        self.in_configuration = false;
    }

    /// Replace the current input with one for `device`.
    ///
    /// The new input is constructed before the old one is touched, so a
    /// construction failure leaves the session on its previous device.
    pub fn set_device(
        &mut self,
        backend: &dyn CameraBackend,
        device: &CameraDeviceInfo,
    ) -> InputSwitch {
        let Some(output) = self.output else {
            return InputSwitch::Ignored(IgnoreReason::NoOutput);
        };

        let mut new_input = match backend.open_input(device, &output.settings) {
            Ok(input) => input,
            Err(e) => {
                log::warn!("Keeping current input, cannot open {}: {}", device.id, e);
                return InputSwitch::Ignored(IgnoreReason::InputUnavailable(e.to_string()));
            }
        };

        if self.running {
            if let Err(e) = new_input.start() {
                log::warn!("Keeping current input, {} failed to start: {}", device.id, e);
                return InputSwitch::Ignored(IgnoreReason::StartFailed(e.to_string()));
            }
        }

        self.begin_configuration();
        let previous = self.input.take().map(|mut old| {
            if self.running {
                if let Err(e) = old.stop() {
                    log::warn!("Failed to stop input {}: {}", old.device().id, e);
                }
            }
            old.device().clone()
        });
        self.input = Some(new_input);
        self.commit_configuration();

        log::info!(
            "Session {} switched input {} -> {}",
            self.id,
            previous.as_ref().map(|d| d.id.as_str()).unwrap_or("none"),
            device.id
        );

        InputSwitch::Switched {
            previous,
            current: device.clone(),
        }
    }

    /// Start delivering samples. Blocks while the input spins up.
    pub fn start_running(&mut self) -> Result<(), CameraError> {
        if self.running {
            return Ok(());
        }
        if self.in_configuration {
            return Err(CameraError::SessionError(
                "cannot start during configuration".to_string(),
            ));
        }
        let input = self
            .input
            .as_mut()
            .ok_or_else(|| CameraError::SessionError("session has no input".to_string()))?;
        if self.output.is_none() {
            return Err(CameraError::SessionError("session has no output".to_string()));
        }

        input.start()?;
        self.running = true;
        log::info!("Session {} running on {}", self.id, input.device().id);
        Ok(())
    }

    pub fn stop_running(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(input) = self.input.as_mut() {
            if let Err(e) = input.stop() {
                log::warn!("Failed to stop input {}: {}", input.device().id, e);
            }
        }
        log::info!("Session {} stopped", self.id);
    }

    /// Pull the next sample from the running input and publish its image to
    /// preview subscribers. `Ok(None)` means the input ended.
    pub fn next_sample(&mut self) -> Result<Option<SampleBuffer>, CameraError> {
        if !self.running {
            return Err(CameraError::SessionError("session is not running".to_string()));
        }
        let input = self
            .input
            .as_mut()
            .ok_or_else(|| CameraError::SessionError("session has no input".to_string()))?;

        let sample = input.next_sample()?;
        if let Some(image) = sample.as_ref().and_then(|s| s.image.clone()) {
            self.preview.send_replace(Some(image));
        }
        Ok(sample)
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}
