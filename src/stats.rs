//! Pipeline counters
//!
//! Written from the capture thread and the forwarder task, read by the host.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct FeedStats {
    samples_received: AtomicU64,
    frames_dispatched: AtomicU64,
    dropped_missing_image: AtomicU64,
    dropped_consumer_closed: AtomicU64,
    frames_forwarded: AtomicU64,
    push_failures: AtomicU64,
    input_switches: AtomicU64,
    ignored_switches: AtomicU64,
}

impl FeedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_sample(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.frames_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_missing_image(&self) {
        self.dropped_missing_image.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_consumer_closed(&self) {
        self.dropped_consumer_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self) {
        self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_push_failure(&self) {
        self.push_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_switch(&self, switched: bool) {
        if switched {
            self.input_switches.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ignored_switches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn frames_forwarded(&self) -> u64 {
        self.frames_forwarded.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            frames_dispatched: self.frames_dispatched.load(Ordering::Relaxed),
            dropped_missing_image: self.dropped_missing_image.load(Ordering::Relaxed),
            dropped_consumer_closed: self.dropped_consumer_closed.load(Ordering::Relaxed),
            frames_forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            push_failures: self.push_failures.load(Ordering::Relaxed),
            input_switches: self.input_switches.load(Ordering::Relaxed),
            ignored_switches: self.ignored_switches.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub samples_received: u64,
    pub frames_dispatched: u64,
    pub dropped_missing_image: u64,
    pub dropped_consumer_closed: u64,
    pub frames_forwarded: u64,
    pub push_failures: u64,
    pub input_switches: u64,
    pub ignored_switches: u64,
}

impl StatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.dropped_missing_image + self.dropped_consumer_closed
    }
}
