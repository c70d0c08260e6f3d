//! Feed setup and lifecycle
//!
//! `CustomCameraApp::setup` wires the pipeline in a fixed order:
//!
//! 1. enable external video input on the engine
//! 2. discover a camera; stop here if none matches
//! 3. build the frame bridge and configure capture, binding the preview
//! 4. join the channel
//! 5. start the forwarder
//!
//! The resulting `RunningFeed` owns the capture thread and the forwarder
//! until `shutdown`.

use crate::bridge::{spawn_forwarder, Forwarder, FrameBridge};
use crate::capture::{CaptureHandle, CaptureManager, CaptureSetup, InputSwitch, SessionStatus};
use crate::config::AppConfig;
use crate::errors::{CameraError, FeedError};
use crate::orientation::{OrientationState, RotationPolicy};
use crate::platform::CameraBackend;
use crate::preview::PreviewSurface;
use crate::rtc::{ChannelMediaOptions, ExternalVideoSource, RtcEngine};
use crate::stats::{FeedStats, StatsSnapshot};
use crate::types::{CameraDeviceInfo, CameraPosition, DeviceOrientation, DeviceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub enum SetupOutcome {
    Ready(RunningFeed),
    /// No camera matched. Nothing was started; the engine is handed back.
    NoMatchingCamera {
        preferred: Vec<DeviceType>,
        position: CameraPosition,
        engine: Box<dyn RtcEngine>,
    },
}

pub struct CustomCameraApp;

impl CustomCameraApp {
    pub async fn setup(
        config: &AppConfig,
        backend: Arc<dyn CameraBackend>,
        mut engine: Box<dyn RtcEngine>,
        surface: &mut PreviewSurface,
    ) -> Result<SetupOutcome, FeedError> {
        config.validate()?;

        engine.set_external_video_source(ExternalVideoSource::pixel_buffers())?;

        let stats = Arc::new(FeedStats::new());
        let orientation = OrientationState::new(config.bridge.initial_orientation);
        let rotation = match config.bridge.rotation_override {
            Some(fixed) => RotationPolicy::Fixed(fixed),
            None => RotationPolicy::FromOrientation(orientation.clone()),
        };
        let (bridge, frames) =
            FrameBridge::channel(config.bridge.channel_capacity, rotation, stats.clone());

        let manager = CaptureManager::new(backend, config.camera.clone());
        let capture = match manager.configure(Arc::new(bridge), surface, stats.clone())? {
            CaptureSetup::Started(capture) => capture,
            CaptureSetup::NoMatchingCamera {
                preferred,
                position,
            } => {
                return Ok(SetupOutcome::NoMatchingCamera {
                    preferred,
                    position,
                    engine,
                });
            }
        };

        let rtc = &config.rtc;
        if let Err(e) = engine.join_channel(
            rtc.token(),
            &rtc.channel,
            rtc.uid,
            ChannelMediaOptions::for_role(rtc.role),
        ) {
            log::error!("Failed to join channel {}: {}", rtc.channel, e);
            // unblock a capture thread waiting on a full channel
            drop(frames);
            if let Err(stop) = capture.shutdown(SETUP_ABORT_TIMEOUT).await {
                log::warn!("Capture did not stop cleanly: {}", stop);
            }
            return Err(e.into());
        }

        let forwarder = spawn_forwarder(frames, engine, config.bridge.frame_format, stats.clone());

        log::info!(
            "Feed running: session {} -> channel {}",
            capture.session_id(),
            rtc.channel
        );

        Ok(SetupOutcome::Ready(RunningFeed {
            capture,
            forwarder,
            stats,
            orientation,
            started_at: Utc::now(),
        }))
    }
}

const SETUP_ABORT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RunningFeed {
    capture: CaptureHandle,
    forwarder: Forwarder,
    stats: Arc<FeedStats>,
    orientation: OrientationState,
    started_at: DateTime<Utc>,
}

impl RunningFeed {
    pub fn session_id(&self) -> Uuid {
        self.capture.session_id()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn stats_handle(&self) -> Arc<FeedStats> {
        self.stats.clone()
    }

    pub fn capture_status(&self) -> SessionStatus {
        self.capture.status()
    }

    pub async fn wait_for_status<F>(&self, predicate: F) -> Result<SessionStatus, CameraError>
    where
        F: FnMut(&SessionStatus) -> bool,
    {
        self.capture.wait_for_status(predicate).await
    }

    pub fn active_device(&self) -> Option<CameraDeviceInfo> {
        self.capture.active_device()
    }

    pub fn orientation(&self) -> DeviceOrientation {
        self.orientation.current()
    }

    /// Report a device orientation change. Flat and unknown readings are
    /// ignored and `false` is returned.
    pub fn set_device_orientation(&self, orientation: DeviceOrientation) -> bool {
        self.orientation.update(orientation)
    }

    pub async fn switch_device(
        &self,
        device: CameraDeviceInfo,
    ) -> Result<InputSwitch, CameraError> {
        self.capture.set_device(device).await
    }

    /// Stop capture, drain the forwarder and leave the channel.
    ///
    /// The channel is left even when the capture thread misses `timeout`;
    /// the capture error is returned after that.
    pub async fn shutdown(self, timeout: Duration) -> Result<FeedReport, FeedError> {
        let session_id = self.capture.session_id();
        log::info!("Shutting down feed for session {}", session_id);

        let mut forwarder = self.forwarder;
        let captured = self.capture.shutdown(timeout).await;
        if let Err(e) = &captured {
            // the capture thread may still hold the bridge
            log::warn!("Capture did not stop cleanly: {}", e);
            forwarder.stop();
        }

        // on a clean stop the capture thread dropped the bridge, so the
        // forwarder is draining
        let mut engine = forwarder.finish(timeout).await?;
        let left = engine.leave_channel();
        captured?;
        left?;

        let summary = FeedSummary {
            session_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            stats: self.stats.snapshot(),
        };
        log::info!(
            "Feed stopped: {} forwarded, {} dropped, {} push failures",
            summary.stats.frames_forwarded,
            summary.stats.dropped(),
            summary.stats.push_failures
        );

        Ok(FeedReport { summary, engine })
    }
}

/// What a finished feed did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: StatsSnapshot,
}

pub struct FeedReport {
    pub summary: FeedSummary,
    pub engine: Box<dyn RtcEngine>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientRole;
    use crate::errors::RtcError;
    use crate::platform::{ScriptedSample, SyntheticBackend};
    use crate::rtc::LoopbackEngine;
    use crate::testing::phone_camera_devices;
    use crate::timing::MediaTime;
    use crate::types::{Rect, Rotation};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.rtc.app_id = "test-app".to_string();
        config.camera.width = 8;
        config.camera.height = 8;
        config
    }

    fn engine() -> LoopbackEngine {
        LoopbackEngine::initialize("test-app").unwrap()
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_anything_starts() {
        let mut config = test_config();
        config.rtc.channel.clear();
        let backend = Arc::new(SyntheticBackend::phone());
        let mut surface = PreviewSurface::new(Rect::new(0, 0, 200, 200));

        let engine = Box::new(engine());
        let result = CustomCameraApp::setup(&config, backend.clone(), engine, &mut surface).await;
        assert!(matches!(result, Err(FeedError::Config(_))));
        assert_eq!(backend.inputs_opened(), 0);
    }

    #[tokio::test]
    async fn test_feed_runs_and_shuts_down() {
        let backend = SyntheticBackend::phone()
            .with_frame_interval(Duration::ZERO)
            .with_script(
                "back-ultra-wide",
                vec![
                    ScriptedSample::Frame(MediaTime::from_millis(0)),
                    ScriptedSample::Frame(MediaTime::from_millis(33)),
                ],
            );
        let engine = engine();
        let pushed = engine.frames_pushed();
        let mut surface = PreviewSurface::new(Rect::new(0, 0, 200, 200));

        let outcome = CustomCameraApp::setup(
            &test_config(),
            Arc::new(backend),
            Box::new(engine),
            &mut surface,
        )
        .await
        .unwrap();
        let SetupOutcome::Ready(feed) = outcome else {
            panic!("camera should be found");
        };
        assert_eq!(surface.layer().unwrap().session_id(), feed.session_id());

        feed.wait_for_status(|s| *s == SessionStatus::Ended)
            .await
            .unwrap();
        let report = feed.shutdown(Duration::from_secs(2)).await.unwrap();

        assert_eq!(report.summary.stats.frames_forwarded, 2);
        assert_eq!(pushed.load(Ordering::Relaxed), 2);
        assert!(report.summary.finished_at >= report.summary.started_at);
    }

    #[tokio::test]
    async fn test_orientation_changes_rotation() {
        let backend = SyntheticBackend::phone().with_frame_interval(Duration::from_millis(1));
        let engine = engine();
        let mut frames = engine.subscribe_frames();
        let mut surface = PreviewSurface::new(Rect::new(0, 0, 200, 200));

        let outcome = CustomCameraApp::setup(
            &test_config(),
            Arc::new(backend),
            Box::new(engine),
            &mut surface,
        )
        .await
        .unwrap();
        let SetupOutcome::Ready(feed) = outcome else {
            panic!("camera should be found");
        };

        async fn next_rotation(
            frames: &mut tokio::sync::broadcast::Receiver<crate::types::ExternalVideoFrame>,
        ) -> Rotation {
            loop {
                match frames.recv().await {
                    Ok(frame) => return frame.rotation,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("engine closed: {}", e),
                }
            }
        }

        assert_eq!(next_rotation(&mut frames).await, Rotation::Deg90);

        assert!(feed.set_device_orientation(DeviceOrientation::LandscapeLeft));
        assert!(!feed.set_device_orientation(DeviceOrientation::FaceUp));
        assert_eq!(feed.orientation(), DeviceOrientation::LandscapeLeft);

        // frames already queued still carry the old rotation
        let mut saw_landscape = false;
        for _ in 0..64 {
            if next_rotation(&mut frames).await == Rotation::Deg0 {
                saw_landscape = true;
                break;
            }
        }
        assert!(saw_landscape);

        feed.shutdown(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_switch_device_through_feed() {
        let backend = SyntheticBackend::phone().with_frame_interval(Duration::from_millis(1));
        let mut surface = PreviewSurface::new(Rect::new(0, 0, 200, 200));

        let outcome = CustomCameraApp::setup(
            &test_config(),
            Arc::new(backend),
            Box::new(engine()),
            &mut surface,
        )
        .await
        .unwrap();
        let SetupOutcome::Ready(feed) = outcome else {
            panic!("camera should be found");
        };
        feed.wait_for_status(|s| matches!(s, SessionStatus::Running { .. }))
            .await
            .unwrap();

        let back_wide = phone_camera_devices()
            .into_iter()
            .find(|d| d.id == "back-wide")
            .unwrap();
        assert!(feed.switch_device(back_wide).await.unwrap().is_switched());
        assert_eq!(feed.active_device().unwrap().id, "back-wide");

        let report = feed.shutdown(Duration::from_secs(2)).await.unwrap();
        assert_eq!(report.summary.stats.input_switches, 2);
    }

    struct RefusingEngine;

    impl RtcEngine for RefusingEngine {
        fn set_external_video_source(&mut self, _: ExternalVideoSource) -> Result<(), RtcError> {
            Ok(())
        }

        fn join_channel(
            &mut self,
            _: Option<&str>,
            channel: &str,
            _: u32,
            options: ChannelMediaOptions,
        ) -> Result<(), RtcError> {
            assert_eq!(options.client_role, ClientRole::Broadcaster);
            Err(RtcError::ChannelError(format!("{} is full", channel)))
        }

        fn push_external_video_frame(
            &mut self,
            _: crate::types::ExternalVideoFrame,
        ) -> Result<(), RtcError> {
            Ok(())
        }

        fn leave_channel(&mut self) -> Result<(), RtcError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_join_failure_stops_capture() {
        let backend = SyntheticBackend::phone().with_frame_interval(Duration::from_millis(1));
        let mut surface = PreviewSurface::new(Rect::new(0, 0, 200, 200));

        let result = CustomCameraApp::setup(
            &test_config(),
            Arc::new(backend),
            Box::new(RefusingEngine),
            &mut surface,
        )
        .await;
        assert!(matches!(
            result,
            Err(FeedError::Rtc(RtcError::ChannelError(_)))
        ));
    }

    /// Loopback engine that records whether the channel was left.
    struct LeaveTracker {
        inner: LoopbackEngine,
        left: Arc<AtomicBool>,
    }

    impl RtcEngine for LeaveTracker {
        fn set_external_video_source(
            &mut self,
            source: ExternalVideoSource,
        ) -> Result<(), RtcError> {
            self.inner.set_external_video_source(source)
        }

        fn join_channel(
            &mut self,
            token: Option<&str>,
            channel: &str,
            uid: u32,
            options: ChannelMediaOptions,
        ) -> Result<(), RtcError> {
            self.inner.join_channel(token, channel, uid, options)
        }

        fn push_external_video_frame(
            &mut self,
            frame: crate::types::ExternalVideoFrame,
        ) -> Result<(), RtcError> {
            self.inner.push_external_video_frame(frame)
        }

        fn leave_channel(&mut self) -> Result<(), RtcError> {
            self.left.store(true, Ordering::SeqCst);
            self.inner.leave_channel()
        }
    }

    #[tokio::test]
    async fn test_capture_timeout_still_leaves_channel() {
        // each sample blocks the capture thread far longer than the timeout
        let backend = SyntheticBackend::phone().with_frame_interval(Duration::from_millis(500));
        let left = Arc::new(AtomicBool::new(false));
        let engine = LeaveTracker {
            inner: engine(),
            left: left.clone(),
        };
        let mut surface = PreviewSurface::new(Rect::new(0, 0, 200, 200));

        let outcome = CustomCameraApp::setup(
            &test_config(),
            Arc::new(backend),
            Box::new(engine),
            &mut surface,
        )
        .await
        .unwrap();
        let SetupOutcome::Ready(feed) = outcome else {
            panic!("camera should be found");
        };
        feed.wait_for_status(|s| matches!(s, SessionStatus::Running { .. }))
            .await
            .unwrap();

        let result = feed.shutdown(Duration::from_millis(50)).await;
        assert!(matches!(result, Err(FeedError::ShutdownTimeout(_))));
        assert!(left.load(Ordering::SeqCst));
    }
}
