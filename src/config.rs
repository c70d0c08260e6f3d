//! Configuration management for camfeed
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `CAMFEED__SECTION__KEY` environment variables. Credentials are always
//! configuration inputs, never compiled in.

use crate::errors::ConfigError;
use crate::types::{
    CameraPosition, DeviceOrientation, DeviceType, ExternalFrameFormat, PixelFormat, Rotation,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "CAMFEED";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rtc: RtcConfig,
    pub camera: CameraConfig,
    pub bridge: BridgeConfig,
}

/// Channel membership role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    Broadcaster,
    Audience,
}

/// RTC engine credentials and channel selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtcConfig {
    /// Application credential passed to the engine at initialization
    pub app_id: String,
    /// Channel token; empty means no token
    pub token: String,
    /// Channel to join
    pub channel: String,
    /// Local user id, 0 lets the engine assign one
    pub uid: u32,
    /// Membership role
    pub role: ClientRole,
}

impl RtcConfig {
    pub fn token(&self) -> Option<&str> {
        if self.token.is_empty() {
            None
        } else {
            Some(&self.token)
        }
    }
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            token: String::new(),
            channel: "test2".to_string(),
            uid: 0,
            role: ClientRole::Broadcaster,
        }
    }
}

/// Camera discovery and capture format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: CameraPosition,
    pub preferred_device_types: Vec<DeviceType>,
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: CameraPosition::Back,
            preferred_device_types: vec![
                DeviceType::BuiltInUltraWideCamera,
                DeviceType::BuiltInWideAngleCamera,
            ],
            pixel_format: PixelFormat::Nv12FullRange,
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

/// Frame bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Format code sent with every external frame
    pub frame_format: ExternalFrameFormat,
    /// Frames buffered between the capture thread and the forwarder
    pub channel_capacity: usize,
    /// Orientation assumed until the host reports one
    pub initial_orientation: DeviceOrientation,
    /// Fixed rotation for every frame instead of orientation tracking
    pub rotation_override: Option<Rotation>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            frame_format: ExternalFrameFormat::PixelBuffer,
            channel_capacity: 8,
            initial_orientation: DeviceOrientation::Portrait,
            rotation_override: None,
        }
    }
}

impl AppConfig {
    /// Load configuration, layering an optional TOML file and the environment
    /// over the defaults.
    ///
    /// Environment values stay strings until deserialization, so ids and
    /// channel names keep leading zeros while numeric fields still parse.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if path.exists() {
                log::info!("Loading configuration from {:?}", path);
            } else {
                log::info!("Config file not found at {:?}, using defaults", path);
            }
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let layered = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: AppConfig = layered.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("camfeed.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rtc.channel.is_empty() {
            return Err(ConfigError::Invalid("Channel name must not be empty".to_string()));
        }
        if self.camera.preferred_device_types.is_empty() {
            return Err(ConfigError::Invalid(
                "At least one preferred device type is required".to_string(),
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid("Invalid capture resolution".to_string()));
        }
        if self.camera.fps == 0 || self.camera.fps > 240 {
            return Err(ConfigError::Invalid("Invalid FPS (must be 1-240)".to_string()));
        }
        if self.bridge.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Bridge channel capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
