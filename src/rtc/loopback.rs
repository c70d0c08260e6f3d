//! In-process RTC engine
//!
//! Validates its credential, tracks channel membership and re-broadcasts
//! pushed frames to local subscribers instead of sending them anywhere.

use super::{ChannelMediaOptions, ExternalVideoSource, RtcEngine};
use crate::config::ClientRole;
use crate::errors::RtcError;
use crate::types::ExternalVideoFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Channel membership as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Joined {
        channel: String,
        uid: u32,
        role: ClientRole,
        token: Option<String>,
    },
    Left,
}

pub struct LoopbackEngine {
    app_id: String,
    external_source: Option<ExternalVideoSource>,
    state: ChannelState,
    frames_pushed: Arc<AtomicU64>,
    frame_sender: broadcast::Sender<ExternalVideoFrame>,
}

impl LoopbackEngine {
    /// Initialize the engine with an application credential.
    pub fn initialize(app_id: impl Into<String>) -> Result<Self, RtcError> {
        let app_id = app_id.into();
        if app_id.trim().is_empty() {
            return Err(RtcError::InvalidCredential(
                "app id must not be empty".to_string(),
            ));
        }
        let (frame_sender, _) = broadcast::channel(256);
        log::info!("Loopback engine initialized");
        Ok(Self {
            app_id,
            external_source: None,
            state: ChannelState::Idle,
            frames_pushed: Arc::new(AtomicU64::new(0)),
            frame_sender,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn external_source(&self) -> Option<ExternalVideoSource> {
        self.external_source
    }

    /// Subscribe to frames as they are pushed.
    pub fn subscribe_frames(&self) -> broadcast::Receiver<ExternalVideoFrame> {
        self.frame_sender.subscribe()
    }

    /// Shared counter of accepted frames, readable after the engine moved.
    pub fn frames_pushed(&self) -> Arc<AtomicU64> {
        self.frames_pushed.clone()
    }
}

impl RtcEngine for LoopbackEngine {
    fn set_external_video_source(&mut self, source: ExternalVideoSource) -> Result<(), RtcError> {
        log::info!(
            "External video source {} ({:?}, texture: {})",
            if source.enabled { "enabled" } else { "disabled" },
            source.source_type,
            source.use_texture
        );
        self.external_source = Some(source);
        Ok(())
    }

    fn join_channel(
        &mut self,
        token: Option<&str>,
        channel: &str,
        uid: u32,
        options: ChannelMediaOptions,
    ) -> Result<(), RtcError> {
        if channel.is_empty() {
            return Err(RtcError::ChannelError("channel name is empty".to_string()));
        }
        if let ChannelState::Joined { channel: current, .. } = &self.state {
            return Err(RtcError::ChannelError(format!(
                "already joined channel {}",
                current
            )));
        }
        log::info!(
            "Joined channel {} as {:?} (uid {})",
            channel,
            options.client_role,
            uid
        );
        self.state = ChannelState::Joined {
            channel: channel.to_string(),
            uid,
            role: options.client_role,
            token: token.map(str::to_string),
        };
        Ok(())
    }

    fn push_external_video_frame(&mut self, frame: ExternalVideoFrame) -> Result<(), RtcError> {
        if !self.external_source.is_some_and(|s| s.enabled) {
            return Err(RtcError::ExternalSourceDisabled);
        }
        if frame.buffer.is_empty() {
            return Err(RtcError::FrameRejected("empty pixel buffer".to_string()));
        }
        self.frames_pushed.fetch_add(1, Ordering::Relaxed);
        // no subscribers is fine
        let _ = self.frame_sender.send(frame);
        Ok(())
    }

    fn leave_channel(&mut self) -> Result<(), RtcError> {
        if let ChannelState::Joined { channel, .. } = &self.state {
            log::info!("Left channel {}", channel);
        }
        self.state = ChannelState::Left;
        Ok(())
    }
}
