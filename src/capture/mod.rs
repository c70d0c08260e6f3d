//! Camera capture: session model and the capture-thread manager.

pub mod manager;
pub mod session;

pub use manager::{CaptureHandle, CaptureManager, CaptureSetup, Discovery, SessionStatus};
pub use session::{CaptureSession, IgnoreReason, InputSwitch, VideoDataOutput};
