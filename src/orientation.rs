//! Device orientation tracking and rotation derivation
//!
//! The rotation attached to each frame is computed when the sample callback
//! runs, from the most recent interface orientation and the position of the
//! camera that produced the sample. Camera sensors are mounted in landscape,
//! so a portrait device needs a 90 degree rotation.

use crate::types::{CameraPosition, DeviceOrientation, Rotation};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Rotation for a frame from a camera at `position` while the device is held
/// in `orientation`. Non-interface orientations yield `None`.
pub fn rotation_for(orientation: DeviceOrientation, position: CameraPosition) -> Option<Rotation> {
    let front = position == CameraPosition::Front;
    match orientation {
        DeviceOrientation::Portrait => Some(Rotation::Deg90),
        DeviceOrientation::PortraitUpsideDown => Some(Rotation::Deg270),
        DeviceOrientation::LandscapeLeft if front => Some(Rotation::Deg180),
        DeviceOrientation::LandscapeLeft => Some(Rotation::Deg0),
        DeviceOrientation::LandscapeRight if front => Some(Rotation::Deg0),
        DeviceOrientation::LandscapeRight => Some(Rotation::Deg180),
        DeviceOrientation::FaceUp | DeviceOrientation::FaceDown | DeviceOrientation::Unknown => {
            None
        }
    }
}

/// Last known interface orientation, shared between the host and the
/// capture thread.
///
/// Face-up, face-down and unknown readings are ignored so a phone laid flat
/// keeps streaming with the orientation it had before.
#[derive(Debug, Clone)]
pub struct OrientationState {
    current: Arc<AtomicU8>,
}

impl OrientationState {
    pub fn new(initial: DeviceOrientation) -> Self {
        let initial = if initial.is_interface_orientation() {
            initial
        } else {
            DeviceOrientation::Portrait
        };
        Self {
            current: Arc::new(AtomicU8::new(encode(initial))),
        }
    }

    /// Record a new orientation reading. Returns `true` if it was applied.
    pub fn update(&self, orientation: DeviceOrientation) -> bool {
        if !orientation.is_interface_orientation() {
            log::debug!("Ignoring non-interface orientation {:?}", orientation);
            return false;
        }
        self.current.store(encode(orientation), Ordering::Relaxed);
        true
    }

    pub fn current(&self) -> DeviceOrientation {
        decode(self.current.load(Ordering::Relaxed))
    }
}

impl Default for OrientationState {
    fn default() -> Self {
        Self::new(DeviceOrientation::Portrait)
    }
}

/// How the bridge picks the rotation for a frame.
#[derive(Debug, Clone)]
pub enum RotationPolicy {
    /// Same rotation for every frame.
    Fixed(Rotation),
    /// Derived from the tracked device orientation at callback time.
    FromOrientation(OrientationState),
}

impl RotationPolicy {
    pub fn rotation(&self, position: CameraPosition) -> Rotation {
        match self {
            RotationPolicy::Fixed(rotation) => *rotation,
            RotationPolicy::FromOrientation(state) => {
                // state only ever holds interface orientations
                rotation_for(state.current(), position).unwrap_or(Rotation::Deg90)
            }
        }
    }
}

fn encode(orientation: DeviceOrientation) -> u8 {
    match orientation {
        DeviceOrientation::Portrait => 0,
        DeviceOrientation::PortraitUpsideDown => 1,
        DeviceOrientation::LandscapeLeft => 2,
        DeviceOrientation::LandscapeRight => 3,
        DeviceOrientation::FaceUp => 4,
        DeviceOrientation::FaceDown => 5,
        DeviceOrientation::Unknown => 6,
    }
}

fn decode(value: u8) -> DeviceOrientation {
    match value {
        0 => DeviceOrientation::Portrait,
        1 => DeviceOrientation::PortraitUpsideDown,
        2 => DeviceOrientation::LandscapeLeft,
        3 => DeviceOrientation::LandscapeRight,
        4 => DeviceOrientation::FaceUp,
        5 => DeviceOrientation::FaceDown,
        _ => DeviceOrientation::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_camera_rotations() {
        let back = CameraPosition::Back;
        assert_eq!(rotation_for(DeviceOrientation::Portrait, back), Some(Rotation::Deg90));
        assert_eq!(
            rotation_for(DeviceOrientation::PortraitUpsideDown, back),
            Some(Rotation::Deg270)
        );
        assert_eq!(rotation_for(DeviceOrientation::LandscapeLeft, back), Some(Rotation::Deg0));
        assert_eq!(
            rotation_for(DeviceOrientation::LandscapeRight, back),
            Some(Rotation::Deg180)
        );
        assert_eq!(rotation_for(DeviceOrientation::FaceUp, back), None);
    }

    #[test]
    fn test_front_camera_swaps_landscape() {
        let front = CameraPosition::Front;
        assert_eq!(rotation_for(DeviceOrientation::Portrait, front), Some(Rotation::Deg90));
        assert_eq!(
            rotation_for(DeviceOrientation::LandscapeLeft, front),
            Some(Rotation::Deg180)
        );
        assert_eq!(
            rotation_for(DeviceOrientation::LandscapeRight, front),
            Some(Rotation::Deg0)
        );
    }

    #[test]
    fn test_state_ignores_flat_orientations() {
        let state = OrientationState::new(DeviceOrientation::LandscapeLeft);
        assert!(!state.update(DeviceOrientation::FaceUp));
        assert_eq!(state.current(), DeviceOrientation::LandscapeLeft);
        assert!(state.update(DeviceOrientation::PortraitUpsideDown));
        assert_eq!(state.current(), DeviceOrientation::PortraitUpsideDown);
    }

    #[test]
    fn test_state_rejects_non_interface_initial() {
        let state = OrientationState::new(DeviceOrientation::Unknown);
        assert_eq!(state.current(), DeviceOrientation::Portrait);
    }

    #[test]
    fn test_policy_follows_shared_state() {
        let state = OrientationState::default();
        let policy = RotationPolicy::FromOrientation(state.clone());
        assert_eq!(policy.rotation(CameraPosition::Back), Rotation::Deg90);

        state.update(DeviceOrientation::LandscapeRight);
        assert_eq!(policy.rotation(CameraPosition::Back), Rotation::Deg180);

        let fixed = RotationPolicy::Fixed(Rotation::Deg270);
        assert_eq!(fixed.rotation(CameraPosition::Front), Rotation::Deg270);
    }
}
