//! Read/decode counters and the frame-utilisation advisory.
//!
//! [`Stats`] is shared between the reader thread (which counts packets) and
//! the caller threads (which count frames actually delivered). The
//! [`EfficiencyMonitor`] compares the two and logs a rate-limited warning when
//! far more packets are decoded than frames are used, which usually means the
//! source videos have long key frame intervals.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::EfficiencyThresholds;

/// Process-wide loader counters.
#[derive(Debug, Default)]
pub struct Stats {
    bytes_read: AtomicU64,
    packets_read: AtomicU64,
    bytes_decoded: AtomicU64,
    packets_decoded: AtomicU64,
    frames_used: AtomicU64,
}

/// A point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Bytes of every packet read from any stream.
    pub bytes_read: u64,
    /// Packets read from any stream.
    pub packets_read: u64,
    /// Bytes forwarded towards the decoder.
    pub bytes_decoded: u64,
    /// Packets forwarded towards the decoder.
    pub packets_decoded: u64,
    /// Frames handed back to callers.
    pub frames_used: u64,
}

impl StatsSnapshot {
    /// Decoded packets per used frame, or `None` before any frame was used.
    pub fn decode_ratio(&self) -> Option<f64> {
        if self.frames_used == 0 {
            None
        } else {
            Some(self.packets_decoded as f64 / self.frames_used as f64)
        }
    }
}

impl Stats {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
        self.packets_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decoded(&self, bytes: usize) {
        self.bytes_decoded.fetch_add(bytes as u64, Ordering::Relaxed);
        self.packets_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_used(&self, frames: u64) {
        self.frames_used.fetch_add(frames, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            packets_read: self.packets_read.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            frames_used: self.frames_used.load(Ordering::Relaxed),
        }
    }
}

/// Rate-limits the low-utilisation warning.
///
/// The warning fires when the decoded/used ratio exceeds the configured ratio
/// and more than `minimum_frames` (before the first warning) or
/// `interval_frames` (afterwards) have been used since the last warning.
#[derive(Debug, Clone)]
pub struct EfficiencyMonitor {
    thresholds: EfficiencyThresholds,
    warned: bool,
    frames_since_warning: u64,
}

impl EfficiencyMonitor {
    /// Create a monitor that has not warned yet.
    pub fn new(thresholds: EfficiencyThresholds) -> Self {
        Self {
            thresholds,
            warned: false,
            frames_since_warning: 0,
        }
    }

    /// Account for `frames` newly used frames against the totals in
    /// `snapshot`. Returns the ratio when a warning fired.
    pub fn observe(&mut self, frames: u64, snapshot: &StatsSnapshot) -> Option<f64> {
        self.frames_since_warning += frames;
        let ratio = snapshot.decode_ratio()?;

        let threshold = if self.warned {
            self.thresholds.interval_frames
        } else {
            self.thresholds.minimum_frames
        };

        if ratio > self.thresholds.ratio && self.frames_since_warning > threshold {
            self.frames_since_warning = 0;
            self.warned = true;
            log::warn!(
                "The video loader is performing suboptimally due to reading {ratio:.2}x as many \
                 packets as frames being used. Consider reencoding the video with a smaller key \
                 frame interval (GOP length)."
            );
            return Some(ratio);
        }
        None
    }

    /// Whether a warning has fired at least once.
    pub fn has_warned(&self) -> bool {
        self.warned
    }

    /// Frames used since the last warning (or since creation).
    pub fn frames_since_warning(&self) -> u64 {
        self.frames_since_warning
    }
}
