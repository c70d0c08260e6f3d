//! Testing utilities for camfeed
//!
//! Synthetic frames and device lists for running the pipeline offline.

pub mod synthetic_data;

pub use synthetic_data::{phone_camera_devices, synthetic_frame};
