//! Capture session manager
//!
//! The session lives on a dedicated capture thread that owns it outright.
//! Everything else talks to it through `SessionCommand`s; samples leave the
//! thread only through the `SampleSink`.

use super::session::{CaptureSession, InputSwitch, VideoDataOutput};
use crate::bridge::{CaptureConnection, SampleSink};
use crate::config::CameraConfig;
use crate::errors::{CameraError, FeedError};
use crate::platform::{first_matching_device, CameraBackend, OutputSettings};
use crate::preview::{PreviewLayer, PreviewSurface};
use crate::stats::FeedStats;
use crate::types::{CameraDeviceInfo, CameraPosition, DeviceType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

/// Outcome of camera discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Found(CameraDeviceInfo),
    NotFound {
        preferred: Vec<DeviceType>,
        position: CameraPosition,
    },
}

/// Lifecycle of the session as observed from outside the capture thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Configured,
    Running { device: CameraDeviceInfo },
    /// The input ran out of samples.
    Ended,
    Failed(String),
    Stopped,
}

enum SessionCommand {
    SetDevice {
        device: CameraDeviceInfo,
        reply: Option<oneshot::Sender<InputSwitch>>,
    },
    Start,
    Shutdown,
}

/// Result of `CaptureManager::configure`.
pub enum CaptureSetup {
    Started(CaptureHandle),
    NoMatchingCamera {
        preferred: Vec<DeviceType>,
        position: CameraPosition,
    },
}

pub struct CaptureManager {
    backend: Arc<dyn CameraBackend>,
    config: CameraConfig,
}

impl CaptureManager {
    pub fn new(backend: Arc<dyn CameraBackend>, config: CameraConfig) -> Self {
        Self { backend, config }
    }

    /// First device of a preferred type at the configured position, in
    /// discovery order.
    pub fn discover(&self) -> Result<Discovery, CameraError> {
        let found = first_matching_device(
            self.backend.as_ref(),
            &self.config.preferred_device_types,
            self.config.position,
        )?;
        Ok(match found {
            Some(device) => Discovery::Found(device),
            None => Discovery::NotFound {
                preferred: self.config.preferred_device_types.clone(),
                position: self.config.position,
            },
        })
    }

    /// Discover a camera, build the session with its output and preview
    /// layer, and start capture on the capture thread.
    ///
    /// Returns without touching `surface` or spawning anything when no
    /// camera matches.
    pub fn configure(
        &self,
        sink: Arc<dyn SampleSink>,
        surface: &mut PreviewSurface,
        stats: Arc<FeedStats>,
    ) -> Result<CaptureSetup, CameraError> {
        let device = match self.discover()? {
            Discovery::Found(device) => device,
            Discovery::NotFound {
                preferred,
                position,
            } => {
                log::warn!(
                    "No camera of types {:?} at position {:?}",
                    preferred,
                    position
                );
                return Ok(CaptureSetup::NoMatchingCamera {
                    preferred,
                    position,
                });
            }
        };
        log::info!("Selected camera {}", device);

        let mut session = CaptureSession::new();
        let output = VideoDataOutput {
            settings: OutputSettings {
                pixel_format: self.config.pixel_format,
                width: self.config.width,
                height: self.config.height,
                fps: self.config.fps,
            },
        };
        if !session.add_output(output) {
            return Err(CameraError::SessionError(
                "failed to attach video output".to_string(),
            ));
        }

        let layer = PreviewLayer::new(session.id(), session.subscribe_preview());
        if let Some(evicted) = surface.insert_preview_layer(layer) {
            log::debug!("Replaced preview layer {}", evicted.id());
        }

        let handle = CaptureHandle::spawn(session, self.backend.clone(), sink, stats)?;
        handle.send(SessionCommand::SetDevice {
            device,
            reply: None,
        })?;
        handle.send(SessionCommand::Start)?;
        Ok(CaptureSetup::Started(handle))
    }
}

/// Handle to the capture thread.
pub struct CaptureHandle {
    session_id: Uuid,
    commands: mpsc::UnboundedSender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
    active: watch::Receiver<Option<CameraDeviceInfo>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CaptureHandle {
    fn spawn(
        session: CaptureSession,
        backend: Arc<dyn CameraBackend>,
        sink: Arc<dyn SampleSink>,
        stats: Arc<FeedStats>,
    ) -> Result<Self, CameraError> {
        let session_id = session.id();
        let (commands, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SessionStatus::Configured);
        let (active_tx, active) = watch::channel(None);
        let channels = LoopChannels {
            commands: receiver,
            status: status_tx,
            active: active_tx,
        };

        let thread = std::thread::Builder::new()
            .name("camfeed-capture".to_string())
            .spawn(move || capture_loop(session, backend, sink, channels, stats))
            .map_err(|e| CameraError::InitializationError(format!("spawn failed: {e}")))?;

        Ok(Self {
            session_id,
            commands,
            status,
            active,
            thread: Some(thread),
        })
    }

    fn send(&self, command: SessionCommand) -> Result<(), CameraError> {
        self.commands
            .send(command)
            .map_err(|_| CameraError::SessionError("capture thread has exited".to_string()))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Device of the session's current input.
    pub fn active_device(&self) -> Option<CameraDeviceInfo> {
        self.active.borrow().clone()
    }

    /// Wait until the session reaches a status matching `predicate`.
    pub async fn wait_for_status<F>(&self, predicate: F) -> Result<SessionStatus, CameraError>
    where
        F: FnMut(&SessionStatus) -> bool,
    {
        let mut status = self.status.clone();
        status
            .wait_for(predicate)
            .await
            .map(|s| s.clone())
            .map_err(|_| CameraError::SessionError("capture thread has exited".to_string()))
    }

    /// Switch the session to `device` on the capture thread.
    pub async fn set_device(&self, device: CameraDeviceInfo) -> Result<InputSwitch, CameraError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::SetDevice {
            device,
            reply: Some(reply),
        })?;
        response
            .await
            .map_err(|_| CameraError::SessionError("capture thread has exited".to_string()))
    }

    /// Stop the session and join the capture thread.
    pub async fn shutdown(mut self, join_timeout: Duration) -> Result<(), FeedError> {
        let _ = self.send(SessionCommand::Shutdown);
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        let join = tokio::task::spawn_blocking(move || thread.join());
        match tokio::time::timeout(join_timeout, join).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(_))) => Err(FeedError::Task("capture thread panicked".to_string())),
            Ok(Err(e)) => Err(FeedError::Task(e.to_string())),
            Err(_) => Err(FeedError::ShutdownTimeout(join_timeout)),
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            // thread exits on its own once it sees this or the closed channel
            let _ = self.commands.send(SessionCommand::Shutdown);
        }
    }
}

struct LoopChannels {
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    status: watch::Sender<SessionStatus>,
    active: watch::Sender<Option<CameraDeviceInfo>>,
}

fn capture_loop(
    mut session: CaptureSession,
    backend: Arc<dyn CameraBackend>,
    sink: Arc<dyn SampleSink>,
    channels: LoopChannels,
    stats: Arc<FeedStats>,
) {
    let LoopChannels {
        mut commands,
        status,
        active,
    } = channels;
    let mut connection: Option<CaptureConnection> = None;

    loop {
        let command = if session.is_running() {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match commands.blocking_recv() {
                Some(command) => Some(command),
                None => break,
            }
        };

        if let Some(command) = command {
            match command {
                SessionCommand::SetDevice { device, reply } => {
                    let result = session.set_device(backend.as_ref(), &device);
                    stats.record_switch(result.is_switched());
                    if let InputSwitch::Switched { current, .. } = &result {
                        connection = Some(CaptureConnection {
                            device_id: current.id.clone(),
                            position: current.position,
                        });
                        active.send_replace(Some(current.clone()));
                        if session.is_running() {
                            status.send_replace(SessionStatus::Running {
                                device: current.clone(),
                            });
                        }
                    }
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
                SessionCommand::Start => match session.start_running() {
                    Ok(()) => {
                        if let Some(device) = session.input_device() {
                            status.send_replace(SessionStatus::Running {
                                device: device.clone(),
                            });
                        }
                    }
                    Err(e) => {
                        log::error!("Failed to start capture session: {}", e);
                        status.send_replace(SessionStatus::Failed(e.to_string()));
                    }
                },
                SessionCommand::Shutdown => break,
            }
            continue;
        }

        match session.next_sample() {
            Ok(Some(sample)) => {
                if let Some(connection) = connection.as_ref() {
                    sink.on_sample(sample, connection);
                }
            }
            Ok(None) => {
                log::info!("Capture input reached end of stream");
                session.stop_running();
                status.send_replace(SessionStatus::Ended);
            }
            Err(e) => {
                log::error!("Capture failed: {}", e);
                session.stop_running();
                status.send_replace(SessionStatus::Failed(e.to_string()));
            }
        }
    }

    session.stop_running();
    status.send_replace(SessionStatus::Stopped);
    log::debug!("Capture thread for session {} exiting", session.id());
}
