//! RTC engine handle
//!
//! The engine is an external collaborator: it owns connection setup,
//! encoding and transport. The feed only enables external video input,
//! joins a channel and pushes frames one at a time in calling order.

pub mod loopback;

use crate::config::ClientRole;
use crate::errors::RtcError;
use crate::types::ExternalVideoFrame;

pub use loopback::{ChannelState, LoopbackEngine};

/// Kind of external frames the engine should expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalSourceType {
    /// Raw or platform pixel buffers, pushed one per frame.
    VideoFrame,
}

/// External video source configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalVideoSource {
    pub enabled: bool,
    pub use_texture: bool,
    pub source_type: ExternalSourceType,
}

impl ExternalVideoSource {
    /// Source mode used by the camera feed.
    pub fn pixel_buffers() -> Self {
        Self {
            enabled: true,
            use_texture: true,
            source_type: ExternalSourceType::VideoFrame,
        }
    }
}

/// Options applied when joining a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMediaOptions {
    pub client_role: ClientRole,
    pub publish_custom_video_track: bool,
}

impl ChannelMediaOptions {
    pub fn broadcaster() -> Self {
        Self::for_role(ClientRole::Broadcaster)
    }

    /// Only broadcasters publish the custom track.
    pub fn for_role(client_role: ClientRole) -> Self {
        Self {
            client_role,
            publish_custom_video_track: client_role == ClientRole::Broadcaster,
        }
    }
}

pub trait RtcEngine: Send {
    fn set_external_video_source(&mut self, source: ExternalVideoSource) -> Result<(), RtcError>;

    fn join_channel(
        &mut self,
        token: Option<&str>,
        channel: &str,
        uid: u32,
        options: ChannelMediaOptions,
    ) -> Result<(), RtcError>;

    /// Hand one externally produced frame to the engine.
    fn push_external_video_frame(&mut self, frame: ExternalVideoFrame) -> Result<(), RtcError>;

    fn leave_channel(&mut self) -> Result<(), RtcError>;
}
