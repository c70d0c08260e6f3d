//! camfeed: custom camera capture feeding an RTC engine
//!
//! Captures frames from a device camera, shows a live preview, and forwards
//! every frame to an RTC engine as an externally sourced video track.
//!
//! # Features
//! - Camera discovery by device type and position
//! - Capture session owned by a dedicated capture thread
//! - Ordered, backpressured hand-off of frames to the engine
//! - Rotation derived from device orientation
//! - Layered configuration (TOML + environment)
//! - Synthetic backend for running without hardware
//!
//! # Usage
//! ```rust,no_run
//! use camfeed::{
//!     AppConfig, CustomCameraApp, LoopbackEngine, PreviewSurface, Rect, SetupOutcome,
//!     SyntheticBackend,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None)?;
//! let engine = LoopbackEngine::initialize(config.rtc.app_id.clone())?;
//! let mut surface = PreviewSurface::new(Rect::new(0, 0, 200, 200));
//!
//! let backend = Arc::new(SyntheticBackend::phone());
//! match CustomCameraApp::setup(&config, backend, Box::new(engine), &mut surface).await? {
//!     SetupOutcome::Ready(feed) => {
//!         tokio::time::sleep(Duration::from_secs(1)).await;
//!         feed.shutdown(Duration::from_secs(2)).await?;
//!     }
//!     SetupOutcome::NoMatchingCamera { .. } => eprintln!("no camera"),
//! }
//! # Ok(())
//! # }
//! ```
pub mod app;
pub mod bridge;
pub mod capture;
pub mod config;
pub mod convert;
pub mod errors;
pub mod orientation;
pub mod platform;
pub mod preview;
pub mod rtc;
pub mod stats;
pub mod timing;
pub mod types;

// Testing utilities - synthetic data for offline testing
pub mod testing;

// Re-exports for convenience
pub use app::{CustomCameraApp, FeedReport, FeedSummary, RunningFeed, SetupOutcome};
pub use bridge::{DropReason, Forwarder, FrameBridge, SampleOutcome, SampleSink};
pub use capture::{CaptureHandle, CaptureManager, Discovery, IgnoreReason, InputSwitch};
pub use config::AppConfig;
pub use errors::{CameraError, ConfigError, FeedError, RtcError};
pub use platform::{CameraBackend, DeviceInput, SyntheticBackend};
pub use preview::{PreviewLayer, PreviewSurface};
pub use rtc::{LoopbackEngine, RtcEngine};
pub use stats::{FeedStats, StatsSnapshot};
pub use types::{
    CameraDeviceInfo, CameraPosition, DeviceOrientation, DeviceType, PixelBuffer, PixelFormat,
    Rect, Rotation,
};

#[cfg(feature = "native")]
pub use platform::NativeBackend;

/// Initialize logging for the feed
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "camfeed=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        native_backend: cfg!(feature = "native"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Whether real camera access was compiled in
    pub native_backend: bool,
}
