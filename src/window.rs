//! Per-request packet classification.
//!
//! After a seek the reader walks packets forward and asks a [`WindowScanner`]
//! what to do with each video packet. The scanner tracks where the window
//! currently starts, how many frames remain, how many non-key frames have
//! been passed since the last key frame, and the backoff offset used when the
//! container lands on a key frame past the target.
//!
//! ```text
//! Seeking ──packet──▶ ScanningForStart ──reach start──▶ Delivering ──count hits 0──▶ Flushed
//!    ▲                       │                             │
//!    └─────── overshoot ─────┴──────── overshoot ──────────┘
//! ```
//!
//! The backoff offset only shrinks back to one frame once a key frame is
//! accepted at the window start or the window is closed as a runaway.
//! Packets before the start leave it alone, so repeated overshoots across a
//! gap in the timestamps keep doubling until the fallback seek to frame 0.
//! A flushed scanner forwards everything unchanged.

use crate::request::FrameRequest;

/// Where the scanner is within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// A seek was issued and no packet has been seen since.
    Seeking,
    /// Packets are still before the window start.
    ScanningForStart,
    /// The window start has been reached and frames remain.
    Delivering,
    /// Every frame of the window has been accounted for.
    Flushed,
}

/// What the reader must do with the packet it just classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Send the packet towards the decoder.
    Forward,
    /// Drop the packet and seek to this frame instead.
    Reseek(i64),
    /// The fallback seek to the start of the file overshot as well.
    Exhausted,
}

/// Classifies the packets of one request.
#[derive(Debug, Clone)]
pub struct WindowScanner {
    start: i64,
    remaining: i64,
    nonkey: i64,
    seek_offset: i64,
    final_try: bool,
    runaway_tolerance: i64,
    state: WindowState,
}

impl WindowScanner {
    /// Start scanning for `request`, right after seeking to its first frame.
    pub fn new(request: &FrameRequest, runaway_tolerance: i64) -> Self {
        let state = if request.count > 0 {
            WindowState::Seeking
        } else {
            WindowState::Flushed
        };
        Self {
            start: request.frame,
            remaining: request.count,
            nonkey: 0,
            seek_offset: 1,
            final_try: false,
            runaway_tolerance,
            state,
        }
    }

    /// Classify the video packet at `frame`.
    pub fn observe(&mut self, frame: i64, is_key: bool) -> Step {
        match self.state {
            WindowState::Flushed => Step::Forward,
            WindowState::Seeking | WindowState::ScanningForStart if frame < self.start => {
                self.state = WindowState::ScanningForStart;
                Step::Forward
            }
            WindowState::Delivering if frame < self.start => Step::Forward,
            _ if is_key => self.key_in_window(frame),
            _ => {
                self.nonkey_in_window(frame);
                Step::Forward
            }
        }
    }

    fn key_in_window(&mut self, frame: i64) -> Step {
        if frame > self.start + self.nonkey {
            return self.overshoot(frame);
        }
        self.start += self.nonkey + 1;
        self.remaining -= self.nonkey + 1;
        self.aligned();
        Step::Forward
    }

    fn nonkey_in_window(&mut self, frame: i64) {
        self.nonkey += 1;
        if frame > self.start + self.remaining + self.runaway_tolerance {
            log::debug!(
                "Frame {frame} ran past window end {}, closing the window",
                self.start + self.remaining
            );
            self.start += self.nonkey;
            self.remaining -= self.nonkey;
            self.aligned();
        } else {
            self.state = WindowState::Delivering;
        }
    }

    /// Window start confirmed: backoff restarts at one frame.
    fn aligned(&mut self) {
        self.nonkey = 0;
        self.seek_offset = 1;
        self.final_try = false;
        self.state = if self.remaining > 0 {
            WindowState::Delivering
        } else {
            WindowState::Flushed
        };
    }

    fn overshoot(&mut self, frame: i64) -> Step {
        log::debug!(
            "Overshot: key frame {frame} > {} + {}, backoff {}",
            self.start,
            self.nonkey,
            self.seek_offset
        );
        self.seek_offset *= 2;
        if self.final_try {
            return Step::Exhausted;
        }
        self.nonkey = 0;
        self.state = WindowState::Seeking;
        if self.start > self.seek_offset {
            Step::Reseek(self.start - self.seek_offset)
        } else {
            self.final_try = true;
            Step::Reseek(0)
        }
    }

    /// Current window start.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Frames of the window not yet accounted for.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Non-key frames passed since the last key frame at or after the start.
    pub fn nonkey_frames(&self) -> i64 {
        self.nonkey
    }

    /// Offset that will be doubled on the next overshoot.
    pub fn seek_offset(&self) -> i64 {
        self.seek_offset
    }

    /// Scanner state.
    pub fn state(&self) -> WindowState {
        self.state
    }

    /// Whether the window has been fully accounted for.
    pub fn is_done(&self) -> bool {
        self.remaining <= 0
    }
}
