//! Presentation timestamps for captured samples
//!
//! `MediaTime` is a rational timestamp (`value / timescale` seconds), the
//! representation camera subsystems hand out and RTC engines accept.
//! `PTSClock` stamps samples from backends that do not supply their own time.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Nanosecond timescale used by the clock and by camera backends.
pub const NANOSECOND_TIMESCALE: i32 = 1_000_000_000;

/// Rational media timestamp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: NANOSECOND_TIMESCALE,
    };

    pub fn new(value: i64, timescale: i32) -> Self {
        Self {
            value,
            timescale: timescale.max(1),
        }
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self::new(
            i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX),
            NANOSECOND_TIMESCALE,
        )
    }

    pub fn from_millis(ms: i64) -> Self {
        Self::new(ms, 1_000)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    /// Timestamp in milliseconds, rounded toward zero.
    pub fn as_millis(&self) -> i64 {
        ((self.value as i128 * 1_000) / self.timescale as i128) as i64
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        // cross-multiply in i128 so mixed timescales compare exactly
        let lhs = self.value as i128 * other.timescale as i128;
        let rhs = other.value as i128 * self.timescale as i128;
        lhs.cmp(&rhs)
    }
}

/// Monotonic clock for presentation timestamps
///
/// All timestamps derive from this single source
/// to ensure monotonic ordering.
#[derive(Debug, Clone)]
pub struct PTSClock {
    start: Arc<Instant>,
}

impl PTSClock {
    /// Create a new PTS clock with the current instant as time zero
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Elapsed time since clock creation as a media timestamp.
    #[inline]
    pub fn now(&self) -> MediaTime {
        MediaTime::from_duration(self.start.elapsed())
    }

    /// Get the presentation timestamp in seconds
    #[inline]
    pub fn pts(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for PTSClock {
    fn default() -> Self {
        Self::new()
    }
}
