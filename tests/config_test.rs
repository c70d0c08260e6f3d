//! Configuration loading from files and the environment.

use camfeed::config::{AppConfig, ClientRole};
use camfeed::types::{CameraPosition, DeviceOrientation, ExternalFrameFormat, Rotation};
use camfeed::ConfigError;
use std::fs;
use std::sync::{Mutex, MutexGuard};
use tempfile::tempdir;

// `AppConfig::load` reads the process environment, so every test that loads
// holds this lock.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn test_file_and_environment_layering() {
    let _env = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("camfeed.toml");
    fs::write(
        &path,
        r#"
        [rtc]
        app_id = "from-file"
        channel = "studio"
        uid = 42

        [camera]
        position = "front"
        fps = 60

        [bridge]
        frame_format = "nv12"
        initial_orientation = "landscape_left"
        "#,
    )
    .unwrap();

    let config = AppConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(config.rtc.app_id, "from-file");
    assert_eq!(config.rtc.channel, "studio");
    assert_eq!(config.rtc.uid, 42);
    assert_eq!(config.rtc.role, ClientRole::Broadcaster);
    assert_eq!(config.camera.position, CameraPosition::Front);
    assert_eq!(config.camera.fps, 60);
    assert_eq!(config.camera.width, 1280);
    assert_eq!(config.bridge.frame_format, ExternalFrameFormat::Nv12);
    assert_eq!(config.bridge.initial_orientation, DeviceOrientation::LandscapeLeft);

    std::env::set_var("CAMFEED__RTC__CHANNEL", "from-env");
    std::env::set_var("CAMFEED__BRIDGE__CHANNEL_CAPACITY", "3");
    let config = AppConfig::load(Some(path.as_path()));
    std::env::remove_var("CAMFEED__RTC__CHANNEL");
    std::env::remove_var("CAMFEED__BRIDGE__CHANNEL_CAPACITY");

    let config = config.unwrap();
    assert_eq!(config.rtc.channel, "from-env");
    assert_eq!(config.rtc.app_id, "from-file");
    assert_eq!(config.bridge.channel_capacity, 3);

    std::env::set_var("CAMFEED__CAMERA__FPS", "0");
    let invalid = AppConfig::load(Some(path.as_path()));
    std::env::remove_var("CAMFEED__CAMERA__FPS");
    assert!(matches!(invalid, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_environment_strings_are_not_reparsed() {
    let _env = env_lock();
    std::env::set_var("CAMFEED__RTC__CHANNEL", "0042");
    std::env::set_var("CAMFEED__RTC__APP_ID", "00112233");
    std::env::set_var("CAMFEED__RTC__TOKEN", "007");
    std::env::set_var("CAMFEED__RTC__UID", "0099");
    std::env::set_var("CAMFEED__BRIDGE__ROTATION_OVERRIDE", "270");
    let config = AppConfig::load(None);
    for key in [
        "CAMFEED__RTC__CHANNEL",
        "CAMFEED__RTC__APP_ID",
        "CAMFEED__RTC__TOKEN",
        "CAMFEED__RTC__UID",
        "CAMFEED__BRIDGE__ROTATION_OVERRIDE",
    ] {
        std::env::remove_var(key);
    }

    let config = config.unwrap();
    assert_eq!(config.rtc.channel, "0042");
    assert_eq!(config.rtc.app_id, "00112233");
    assert_eq!(config.rtc.token(), Some("007"));
    assert_eq!(config.rtc.uid, 99);
    assert_eq!(config.bridge.rotation_override, Some(Rotation::Deg270));
}

#[test]
fn test_missing_file_uses_defaults() {
    let _env = env_lock();
    let dir = tempdir().unwrap();
    let config = AppConfig::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
    assert_eq!(config.rtc.channel, "test2");
    assert_eq!(config.bridge.frame_format.code(), 12);
}

#[test]
fn test_save_and_reload() {
    let _env = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("camfeed.toml");

    let mut config = AppConfig::default();
    config.rtc.app_id = "saved".to_string();
    config.rtc.token = "secret".to_string();
    config.bridge.rotation_override = Some(Rotation::Deg180);
    config.save_to_file(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("rotation_override = 180"));

    let loaded = AppConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(loaded.rtc.token(), Some("secret"));
    assert_eq!(loaded.bridge.rotation_override, Some(Rotation::Deg180));
}

#[test]
fn test_malformed_file_is_an_error() {
    let _env = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("camfeed.toml");
    fs::write(&path, "[camera]\nfps = \"fast\"\n").unwrap();
    assert!(matches!(
        AppConfig::load(Some(path.as_path())),
        Err(ConfigError::Load(_))
    ));
}
