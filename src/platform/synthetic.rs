//! Synthetic camera backend
//!
//! Serves a configurable device list. Inputs either replay a fixed script of
//! samples and then end, or generate frames indefinitely at a fixed interval.
//! Individual devices can be marked so that opening an input on them fails.

use super::{CameraBackend, DeviceInput, OutputSettings};
use crate::errors::CameraError;
use crate::testing::{phone_camera_devices, synthetic_frame};
use crate::timing::{MediaTime, PTSClock};
use crate::types::{CameraDeviceInfo, PixelFormat, SampleBuffer};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One entry of a replay script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedSample {
    /// A frame with pixel data stamped with the given time.
    Frame(MediaTime),
    /// A sample the camera delivered without image data.
    MissingImage(MediaTime),
}

pub struct SyntheticBackend {
    devices: Vec<CameraDeviceInfo>,
    scripts: HashMap<String, Vec<ScriptedSample>>,
    failing: HashSet<String>,
    frame_interval: Duration,
    inputs_opened: AtomicUsize,
}

impl SyntheticBackend {
    pub fn new(devices: Vec<CameraDeviceInfo>) -> Self {
        Self {
            devices,
            scripts: HashMap::new(),
            failing: HashSet::new(),
            frame_interval: Duration::from_millis(33),
            inputs_opened: AtomicUsize::new(0),
        }
    }

    /// Backend exposing a phone-like camera cluster.
    pub fn phone() -> Self {
        Self::new(phone_camera_devices())
    }

    /// Replay `samples` on inputs opened for `device_id`, then end the stream.
    pub fn with_script(
        mut self,
        device_id: impl Into<String>,
        samples: Vec<ScriptedSample>,
    ) -> Self {
        self.scripts.insert(device_id.into(), samples);
        self
    }

    /// Make `open_input` fail for `device_id`.
    pub fn with_failing_input(mut self, device_id: impl Into<String>) -> Self {
        self.failing.insert(device_id.into());
        self
    }

    /// Pause between generated samples.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Number of inputs successfully constructed so far.
    pub fn inputs_opened(&self) -> usize {
        self.inputs_opened.load(Ordering::SeqCst)
    }
}

impl CameraBackend for SyntheticBackend {
    fn devices(&self) -> Result<Vec<CameraDeviceInfo>, CameraError> {
        Ok(self.devices.clone())
    }

    fn open_input(
        &self,
        device: &CameraDeviceInfo,
        settings: &OutputSettings,
    ) -> Result<Box<dyn DeviceInput>, CameraError> {
        if !self.devices.iter().any(|d| d.id == device.id) {
            return Err(CameraError::InputUnavailable(format!(
                "unknown device {}",
                device.id
            )));
        }
        if self.failing.contains(&device.id) {
            return Err(CameraError::InputUnavailable(format!(
                "device {} is busy",
                device.id
            )));
        }
        if settings.pixel_format == PixelFormat::Mjpeg {
            return Err(CameraError::InputUnavailable(
                "synthetic backend cannot produce compressed frames".to_string(),
            ));
        }

        self.inputs_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticInput {
            device: device.clone(),
            settings: *settings,
            script: self
                .scripts
                .get(&device.id)
                .map(|s| s.iter().copied().collect()),
            frame_interval: self.frame_interval,
            frame_number: 0,
            clock: PTSClock::new(),
            running: false,
        }))
    }
}

struct SyntheticInput {
    device: CameraDeviceInfo,
    settings: OutputSettings,
    script: Option<VecDeque<ScriptedSample>>,
    frame_interval: Duration,
    frame_number: u64,
    clock: PTSClock,
    running: bool,
}

impl SyntheticInput {
    fn frame(&mut self, time: MediaTime) -> Result<SampleBuffer, CameraError> {
        let buffer = synthetic_frame(
            self.frame_number,
            self.settings.width,
            self.settings.height,
            self.settings.pixel_format,
        )
        .ok_or_else(|| {
            CameraError::CaptureError(format!(
                "no synthetic data for {:?}",
                self.settings.pixel_format
            ))
        })?;
        self.frame_number += 1;
        Ok(SampleBuffer::with_image(buffer, time))
    }
}

impl DeviceInput for SyntheticInput {
    fn device(&self) -> &CameraDeviceInfo {
        &self.device
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.running = true;
        Ok(())
    }

    fn next_sample(&mut self) -> Result<Option<SampleBuffer>, CameraError> {
        if !self.running {
            return Err(CameraError::StreamError(format!(
                "input {} is not started",
                self.device.id
            )));
        }
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }

        let next = match self.script.as_mut() {
            Some(script) => script.pop_front(),
            None => Some(ScriptedSample::Frame(self.clock.now())),
        };

        match next {
            Some(ScriptedSample::Frame(time)) => self.frame(time).map(Some),
            Some(ScriptedSample::MissingImage(time)) => Ok(Some(SampleBuffer::empty(time))),
            None => Ok(None),
        }
    }

    fn stop(&mut self) -> Result<(), CameraError> {
        self.running = false;
        Ok(())
    }
}
