//! FFmpeg console verbosity.
//!
//! libav* libraries print to stderr through their own logger, independent of
//! the `log` facade used by this crate. A loader decoding thousands of short
//! windows can make FFmpeg very chatty (every flushed decoder reports), so
//! applications usually lower its level once at startup.
//!
//! ```no_run
//! use framewindow::FfmpegLogLevel;
//!
//! framewindow::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! let level: FfmpegLogLevel = "warning".parse().unwrap();
//! framewindow::set_ffmpeg_log_level(level);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ffmpeg_next::util::log::Level;

/// FFmpeg internal log verbosity, most quiet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Conditions that abort the process.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Tracing output.
    Trace,
}

impl FfmpegLogLevel {
    const ALL: [(FfmpegLogLevel, Level, &'static str); 9] = [
        (FfmpegLogLevel::Quiet, Level::Quiet, "quiet"),
        (FfmpegLogLevel::Panic, Level::Panic, "panic"),
        (FfmpegLogLevel::Fatal, Level::Fatal, "fatal"),
        (FfmpegLogLevel::Error, Level::Error, "error"),
        (FfmpegLogLevel::Warning, Level::Warning, "warning"),
        (FfmpegLogLevel::Info, Level::Info, "info"),
        (FfmpegLogLevel::Verbose, Level::Verbose, "verbose"),
        (FfmpegLogLevel::Debug, Level::Debug, "debug"),
        (FfmpegLogLevel::Trace, Level::Trace, "trace"),
    ];

    fn to_ffmpeg_level(self) -> Level {
        Self::ALL
            .iter()
            .find(|(ours, _, _)| *ours == self)
            .map_or(Level::Warning, |(_, ffmpeg, _)| *ffmpeg)
    }

    fn from_ffmpeg_level(level: Level) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(_, ffmpeg, _)| *ffmpeg == level)
            .map(|(ours, _, _)| *ours)
    }

    /// Lower-case name accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(ours, _, _)| *ours == self)
            .map_or("unknown", |(_, _, name)| name)
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.to_ascii_lowercase();
        let lowered = if lowered == "warn" { "warning" } else { lowered.as_str() };
        Self::ALL
            .iter()
            .find(|(_, _, name)| *name == lowered)
            .map(|(ours, _, _)| *ours)
            .ok_or_else(|| format!("unsupported FFmpeg log level: {value}"))
    }
}

/// Set FFmpeg's own stderr verbosity.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Current FFmpeg verbosity, or `None` for a level outside the known set.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .and_then(FfmpegLogLevel::from_ffmpeg_level)
}
