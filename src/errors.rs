use thiserror::Error;

/// Camera subsystem errors.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera initialization error: {0}")]
    InitializationError(String),
    #[error("Device input unavailable: {0}")]
    InputUnavailable(String),
    #[error("Capture error: {0}")]
    CaptureError(String),
    #[error("Session error: {0}")]
    SessionError(String),
    #[error("Stream error: {0}")]
    StreamError(String),
}

/// Errors raised by an RTC engine implementation.
#[derive(Debug, Error)]
pub enum RtcError {
    #[error("Invalid app credential: {0}")]
    InvalidCredential(String),
    #[error("Channel error: {0}")]
    ChannelError(String),
    #[error("External video source is not enabled")]
    ExternalSourceDisabled,
    #[error("Frame rejected: {0}")]
    FrameRejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Configuration IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error for the feed pipeline.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Rtc(#[from] RtcError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Shutdown timed out after {0:?}")]
    ShutdownTimeout(std::time::Duration),
    #[error("Pipeline task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_camera_error_display() {
        let error = CameraError::InitializationError("no backend".to_string());
        assert_eq!(error.to_string(), "Camera initialization error: no backend");

        let error = CameraError::InputUnavailable("back-wide".to_string());
        assert!(error.to_string().contains("back-wide"));
    }

    #[test]
    fn test_feed_error_is_transparent() {
        let error: FeedError = RtcError::ExternalSourceDisabled.into();
        assert_eq!(
            error.to_string(),
            "External video source is not enabled"
        );
        assert!(error.source().is_none());
    }

    #[test]
    fn test_config_error_wraps_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: ConfigError = io.into();
        assert!(error.to_string().contains("gone"));
        assert!(error.source().is_some());
    }
}
