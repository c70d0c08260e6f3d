//! Frame bridge between the capture thread and the RTC engine
//!
//! `FrameBridge` runs on the capture thread once per sample. It pulls the
//! pixel buffer and timestamp out of the sample, derives the rotation and
//! sends a `CapturedFrame` over a bounded channel. That channel is the only
//! thread handoff in the pipeline: one producer, one consumer, FIFO, so
//! frames reach the engine in capture order. When the channel is full the
//! capture thread waits rather than dropping.
//!
//! The forwarder task on the other end turns each frame into an
//! `ExternalVideoFrame` and pushes it to the engine.

use crate::errors::FeedError;
use crate::orientation::RotationPolicy;
use crate::rtc::RtcEngine;
use crate::stats::FeedStats;
use crate::types::{
    CameraPosition, CapturedFrame, ExternalFrameFormat, ExternalVideoFrame, SampleBuffer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// The input a sample arrived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConnection {
    pub device_id: String,
    pub position: CameraPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The sample carried no pixel buffer.
    MissingImageData,
    /// The forwarder is gone; the pipeline is shutting down.
    ConsumerClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Dispatched,
    Dropped(DropReason),
}

/// Receiver of captured samples, called on the capture thread.
pub trait SampleSink: Send + Sync {
    fn on_sample(&self, sample: SampleBuffer, connection: &CaptureConnection) -> SampleOutcome;
}

pub struct FrameBridge {
    sender: mpsc::Sender<CapturedFrame>,
    rotation: RotationPolicy,
    stats: Arc<FeedStats>,
}

impl FrameBridge {
    /// Create a bridge and the receiving end for the forwarder.
    pub fn channel(
        capacity: usize,
        rotation: RotationPolicy,
        stats: Arc<FeedStats>,
    ) -> (Self, mpsc::Receiver<CapturedFrame>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                rotation,
                stats,
            },
            receiver,
        )
    }
}

impl SampleSink for FrameBridge {
    fn on_sample(&self, sample: SampleBuffer, connection: &CaptureConnection) -> SampleOutcome {
        self.stats.record_sample();

        let Some(buffer) = sample.image else {
            self.stats.record_missing_image();
            log::debug!(
                "Dropping sample at {:.3}s from {}: no image data",
                sample.presentation_time.as_secs_f64(),
                connection.device_id
            );
            return SampleOutcome::Dropped(DropReason::MissingImageData);
        };

        let frame = CapturedFrame {
            buffer,
            timestamp: sample.presentation_time,
            rotation: self.rotation.rotation(connection.position),
        };

        // capture thread is not a runtime thread, blocking here is backpressure
        match self.sender.blocking_send(frame) {
            Ok(()) => {
                self.stats.record_dispatched();
                SampleOutcome::Dispatched
            }
            Err(_) => {
                self.stats.record_consumer_closed();
                log::debug!("Forwarder closed, dropping frame from {}", connection.device_id);
                SampleOutcome::Dropped(DropReason::ConsumerClosed)
            }
        }
    }
}

/// Handle to the forwarder task.
pub struct Forwarder {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Box<dyn RtcEngine>>,
}

/// Spawn the forwarder task. It runs until every bridge sender is dropped
/// or `stop` is called, then hands the engine back.
pub fn spawn_forwarder(
    receiver: mpsc::Receiver<CapturedFrame>,
    engine: Box<dyn RtcEngine>,
    format: ExternalFrameFormat,
    stats: Arc<FeedStats>,
) -> Forwarder {
    let (stop, stopped) = oneshot::channel();
    Forwarder {
        stop: Some(stop),
        task: tokio::spawn(forward_frames(receiver, stopped, engine, format, stats)),
    }
}

impl Forwarder {
    /// Close the channel without waiting for the capture side. Frames already
    /// queued are still pushed; later sends fail with `ConsumerClosed`.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Wait for the task to hand the engine back.
    pub async fn finish(self, timeout: Duration) -> Result<Box<dyn RtcEngine>, FeedError> {
        let Self { stop: _stop, task } = self;
        let abort = task.abort_handle();
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(engine)) => Ok(engine),
            Ok(Err(e)) => Err(FeedError::Task(e.to_string())),
            Err(_) => {
                abort.abort();
                Err(FeedError::ShutdownTimeout(timeout))
            }
        }
    }
}

async fn forward_frames(
    mut receiver: mpsc::Receiver<CapturedFrame>,
    mut stopped: oneshot::Receiver<()>,
    mut engine: Box<dyn RtcEngine>,
    format: ExternalFrameFormat,
    stats: Arc<FeedStats>,
) -> Box<dyn RtcEngine> {
    log::info!("Forwarder started (format code {})", format.code());

    let mut stoppable = true;
    loop {
        tokio::select! {
            biased;
            result = &mut stopped, if stoppable => {
                if result.is_err() {
                    // handle dropped without stopping
                    stoppable = false;
                    continue;
                }
                log::debug!("Forwarder stopped early, draining queued frames");
                receiver.close();
                while let Some(frame) = receiver.recv().await {
                    push_frame(engine.as_mut(), frame, format, &stats);
                }
                break;
            }
            frame = receiver.recv() => match frame {
                Some(frame) => push_frame(engine.as_mut(), frame, format, &stats),
                None => break,
            },
        }
    }

    log::info!("Forwarder finished");
    engine
}

fn push_frame(
    engine: &mut dyn RtcEngine,
    frame: CapturedFrame,
    format: ExternalFrameFormat,
    stats: &FeedStats,
) {
    let external = ExternalVideoFrame::from_captured(frame, format);
    match engine.push_external_video_frame(external) {
        Ok(()) => stats.record_forwarded(),
        Err(e) => {
            stats.record_push_failure();
            log::warn!("Engine rejected frame: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RtcError;
    use crate::rtc::{ChannelMediaOptions, ExternalVideoSource};
    use crate::timing::MediaTime;
    use crate::types::{PixelBuffer, PixelFormat, Rotation};
    use std::sync::Mutex;

    fn connection(position: CameraPosition) -> CaptureConnection {
        CaptureConnection {
            device_id: "back-wide".to_string(),
            position,
        }
    }

    fn image() -> PixelBuffer {
        PixelBuffer::new(vec![7u8; 6], 2, 2, PixelFormat::Nv12FullRange)
    }

    #[test]
    fn test_missing_image_is_dropped() {
        let stats = Arc::new(FeedStats::new());
        let (bridge, mut rx) =
            FrameBridge::channel(4, RotationPolicy::Fixed(Rotation::Deg90), stats.clone());

        let outcome = bridge.on_sample(
            SampleBuffer::empty(MediaTime::from_millis(1)),
            &connection(CameraPosition::Back),
        );
        assert_eq!(outcome, SampleOutcome::Dropped(DropReason::MissingImageData));
        assert!(rx.try_recv().is_err());

        let snap = stats.snapshot();
        assert_eq!(snap.samples_received, 1);
        assert_eq!(snap.dropped_missing_image, 1);
        assert_eq!(snap.frames_dispatched, 0);
    }

    #[test]
    fn test_frame_carries_timestamp_and_rotation() {
        let stats = Arc::new(FeedStats::new());
        let (bridge, mut rx) =
            FrameBridge::channel(4, RotationPolicy::Fixed(Rotation::Deg180), stats);

        let outcome = bridge.on_sample(
            SampleBuffer::with_image(image(), MediaTime::from_millis(33)),
            &connection(CameraPosition::Back),
        );
        assert_eq!(outcome, SampleOutcome::Dispatched);

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.timestamp, MediaTime::from_millis(33));
        assert_eq!(frame.rotation, Rotation::Deg180);
        assert_eq!(frame.buffer, image());
    }

    #[test]
    fn test_closed_consumer_drops() {
        let stats = Arc::new(FeedStats::new());
        let (bridge, rx) =
            FrameBridge::channel(1, RotationPolicy::Fixed(Rotation::Deg0), stats.clone());
        drop(rx);

        let outcome = bridge.on_sample(
            SampleBuffer::with_image(image(), MediaTime::ZERO),
            &connection(CameraPosition::Front),
        );
        assert_eq!(outcome, SampleOutcome::Dropped(DropReason::ConsumerClosed));
        assert_eq!(stats.snapshot().dropped_consumer_closed, 1);
    }

    #[derive(Clone, Default)]
    struct RecordingEngine {
        pushed: Arc<Mutex<Vec<ExternalVideoFrame>>>,
        reject_every: Option<usize>,
    }

    impl RtcEngine for RecordingEngine {
        fn set_external_video_source(&mut self, _: ExternalVideoSource) -> Result<(), RtcError> {
            Ok(())
        }

        fn join_channel(
            &mut self,
            _: Option<&str>,
            _: &str,
            _: u32,
            _: ChannelMediaOptions,
        ) -> Result<(), RtcError> {
            Ok(())
        }

        fn push_external_video_frame(&mut self, frame: ExternalVideoFrame) -> Result<(), RtcError> {
            let mut pushed = self.pushed.lock().unwrap();
            if let Some(n) = self.reject_every {
                if (pushed.len() + 1) % n == 0 {
                    pushed.push(frame);
                    return Err(RtcError::FrameRejected("test".to_string()));
                }
            }
            pushed.push(frame);
            Ok(())
        }

        fn leave_channel(&mut self) -> Result<(), RtcError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_forwarder_preserves_order_and_format() {
        let stats = Arc::new(FeedStats::new());
        let engine = RecordingEngine::default();
        let pushed = engine.pushed.clone();
        let (tx, rx) = mpsc::channel(8);

        let forwarder = spawn_forwarder(
            rx,
            Box::new(engine),
            ExternalFrameFormat::PixelBuffer,
            stats.clone(),
        );

        for ms in [0, 33, 66] {
            tx.send(CapturedFrame {
                buffer: image(),
                timestamp: MediaTime::from_millis(ms),
                rotation: Rotation::Deg90,
            })
            .await
            .unwrap();
        }
        drop(tx);
        forwarder.finish(Duration::from_secs(1)).await.unwrap();

        let pushed = pushed.lock().unwrap();
        let times: Vec<i64> = pushed.iter().map(|f| f.time.as_millis()).collect();
        assert_eq!(times, vec![0, 33, 66]);
        assert!(pushed.iter().all(|f| f.format_code() == 12));
        assert!(pushed.iter().all(|f| f.rotation == Rotation::Deg90));
        assert_eq!(stats.frames_forwarded(), 3);
    }

    #[tokio::test]
    async fn test_push_failures_are_counted_not_retried() {
        let stats = Arc::new(FeedStats::new());
        let engine = RecordingEngine {
            reject_every: Some(2),
            ..Default::default()
        };
        let pushed = engine.pushed.clone();
        let (tx, rx) = mpsc::channel(8);
        let forwarder =
            spawn_forwarder(rx, Box::new(engine), ExternalFrameFormat::Nv12, stats.clone());

        for ms in 0..4 {
            tx.send(CapturedFrame {
                buffer: image(),
                timestamp: MediaTime::from_millis(ms),
                rotation: Rotation::Deg0,
            })
            .await
            .unwrap();
        }
        drop(tx);
        forwarder.finish(Duration::from_secs(1)).await.unwrap();

        assert_eq!(pushed.lock().unwrap().len(), 4);
        let snap = stats.snapshot();
        assert_eq!(snap.frames_forwarded, 2);
        assert_eq!(snap.push_failures, 2);
    }

    #[tokio::test]
    async fn test_stop_drains_queue_while_sender_lives() {
        let stats = Arc::new(FeedStats::new());
        let engine = RecordingEngine::default();
        let pushed = engine.pushed.clone();
        let (tx, rx) = mpsc::channel(4);

        for ms in [0, 33] {
            tx.send(CapturedFrame {
                buffer: image(),
                timestamp: MediaTime::from_millis(ms),
                rotation: Rotation::Deg0,
            })
            .await
            .unwrap();
        }

        let mut forwarder =
            spawn_forwarder(rx, Box::new(engine), ExternalFrameFormat::Nv12, stats.clone());
        forwarder.stop();
        forwarder.finish(Duration::from_secs(1)).await.unwrap();

        let times: Vec<i64> = pushed.lock().unwrap().iter().map(|f| f.time.as_millis()).collect();
        assert_eq!(times, vec![0, 33]);
        assert_eq!(stats.frames_forwarded(), 2);

        // sender is still alive, but nothing is listening any more
        assert!(tx.is_closed());
    }
}
