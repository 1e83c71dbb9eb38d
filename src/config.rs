//! Loader configuration.
//!
//! [`LoaderConfig`] is a builder that carries sequence geometry (length,
//! stride, step between starts), sharding, and the empirical tuning constants
//! of the reader (runaway tolerance, efficiency thresholds, decoder startup
//! timeout) without polluting every constructor signature.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use framewindow::LoaderConfig;
//!
//! let config = LoaderConfig::new()
//!     .with_sequence_length(16)
//!     .with_stride(2)
//!     .with_shard(0, 4)
//!     .with_startup_timeout(Duration::from_secs(1));
//! assert_eq!(config.window_len(), 31);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::error::FrameWindowError;

const DEFAULT_RUNAWAY_TOLERANCE: i64 = 20;
const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_millis(500);

/// When to warn about decoding many more packets than frames used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficiencyThresholds {
    /// Decoded packets per used frame above which the loader is inefficient.
    pub ratio: f64,
    /// Frames that must be used before the first warning.
    pub minimum_frames: u64,
    /// Frames that must be used between subsequent warnings.
    pub interval_frames: u64,
}

impl Default for EfficiencyThresholds {
    fn default() -> Self {
        Self {
            ratio: 3.0,
            minimum_frames: 1000,
            interval_frames: 10_000,
        }
    }
}

/// Configuration for a [`VideoLoader`](crate::VideoLoader).
///
/// All fields have defaults: sequences of one frame, stride 1, every frame a
/// sequence start, a single shard.
#[derive(Clone)]
pub struct LoaderConfig {
    pub(crate) sequence_length: usize,
    pub(crate) stride: usize,
    pub(crate) step: Option<usize>,
    pub(crate) shard_id: usize,
    pub(crate) num_shards: usize,
    pub(crate) runaway_tolerance: i64,
    pub(crate) efficiency: EfficiencyThresholds,
    pub(crate) startup_timeout: Duration,
}

impl Debug for LoaderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("LoaderConfig")
            .field("sequence_length", &self.sequence_length)
            .field("stride", &self.stride)
            .field("step", &self.step())
            .field("shard", &format_args!("{}/{}", self.shard_id, self.num_shards))
            .field("runaway_tolerance", &self.runaway_tolerance)
            .field("startup_timeout", &self.startup_timeout)
            .finish()
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            sequence_length: 1,
            stride: 1,
            step: None,
            shard_id: 0,
            num_shards: 1,
            runaway_tolerance: DEFAULT_RUNAWAY_TOLERANCE,
            efficiency: EfficiencyThresholds::default(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Number of frames delivered per sequence.
    #[must_use]
    pub fn with_sequence_length(mut self, count: usize) -> Self {
        self.sequence_length = count;
        self
    }

    /// Distance between consecutive delivered frames.
    #[must_use]
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Distance between consecutive sequence starts. Defaults to the
    /// sequence length.
    #[must_use]
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }

    /// Read only shard `shard_id` out of `num_shards`.
    #[must_use]
    pub fn with_shard(mut self, shard_id: usize, num_shards: usize) -> Self {
        self.shard_id = shard_id;
        self.num_shards = num_shards;
        self
    }

    /// How far (in frames) past the window end non-key frames may run before
    /// the window is forcibly closed.
    #[must_use]
    pub fn with_runaway_tolerance(mut self, frames: i64) -> Self {
        self.runaway_tolerance = frames;
        self
    }

    /// Thresholds of the low-utilisation warning.
    #[must_use]
    pub fn with_efficiency_thresholds(mut self, thresholds: EfficiencyThresholds) -> Self {
        self.efficiency = thresholds;
        self
    }

    /// How long a caller waits for the decoder to appear before failing.
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Frames delivered per sequence.
    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Stride between delivered frames.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Step between sequence starts.
    pub fn step(&self) -> usize {
        self.step.unwrap_or(self.sequence_length).max(1)
    }

    /// Number of source frames a sequence spans: `1 + (count - 1) * stride`.
    pub fn window_len(&self) -> usize {
        window_len(self.sequence_length, self.stride)
    }

    /// Runaway tolerance in frames.
    pub fn runaway_tolerance(&self) -> i64 {
        self.runaway_tolerance
    }

    /// Efficiency warning thresholds.
    pub fn efficiency_thresholds(&self) -> EfficiencyThresholds {
        self.efficiency
    }

    /// Decoder startup timeout.
    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    /// Reject unusable settings.
    pub fn validate(&self) -> Result<(), FrameWindowError> {
        if self.sequence_length == 0 {
            return Err(FrameWindowError::InvalidConfig(
                "sequence length must be greater than zero".to_string(),
            ));
        }
        if self.stride == 0 {
            return Err(FrameWindowError::InvalidConfig(
                "stride must be greater than zero".to_string(),
            ));
        }
        if self.num_shards == 0 || self.shard_id >= self.num_shards {
            return Err(FrameWindowError::InvalidConfig(format!(
                "shard {} is outside 0..{}",
                self.shard_id, self.num_shards
            )));
        }
        if self.runaway_tolerance < 0 {
            return Err(FrameWindowError::InvalidConfig(
                "runaway tolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Source frames spanned by `count` frames taken every `stride` frames.
pub fn window_len(count: usize, stride: usize) -> usize {
    if count == 0 {
        0
    } else {
        1 + (count - 1) * stride
    }
}
