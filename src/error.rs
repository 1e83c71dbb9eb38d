//! Error types for the `framewindow` crate.
//!
//! This module defines [`FrameWindowError`], the unified error type returned by
//! all fallible operations in the crate. Every variant is fatal for the loader
//! that produced it: advisory conditions (extra streams in a container, poor
//! frame utilisation) are logged and never surface here.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `framewindow` operations.
///
/// Variants carry enough context (paths, frame numbers, codec names) to
/// diagnose the problem without additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameWindowError {
    /// A catalog root or one of its class directories could not be read.
    #[error("Directory {path} could not be opened: {reason}")]
    DirectoryOpen {
        /// The directory that failed to open.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// A file list could not be parsed.
    #[error("Wrong format of file list {path} at line {line}: {content:?}")]
    FileListFormat {
        /// The list file.
        path: PathBuf,
        /// One-based line number of the offending content.
        line: usize,
        /// The offending text.
        content: String,
    },

    /// The catalog produced no files.
    #[error("Could not read any files")]
    EmptyCatalog,

    /// A media file could not be opened.
    #[error("Could not open file {path}: {reason}")]
    FileOpen {
        /// Path of the media file.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// Stream information could not be probed.
    #[error("Could not find stream information in {path}: {reason}")]
    StreamInfo {
        /// Path of the media file.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("Could not find video stream in {path}")]
    NoVideoStream {
        /// Path of the media file.
        path: PathBuf,
    },

    /// A file does not share the resolution and codec of the first file.
    #[error(
        "File {path} is not the same size and codec as previous files \
         ({width}x{height} {codec} instead of {expected_width}x{expected_height} {expected_codec})"
    )]
    FormatMismatch {
        /// Path of the mismatching file.
        path: PathBuf,
        /// Width of the mismatching file.
        width: u32,
        /// Height of the mismatching file.
        height: u32,
        /// Codec of the mismatching file.
        codec: String,
        /// Width of the first opened file.
        expected_width: u32,
        /// Height of the first opened file.
        expected_height: u32,
        /// Codec of the first opened file.
        expected_codec: String,
    },

    /// The measured frame duration disagrees with the declared frame rate.
    #[error("Variable frame rate videos are unsupported. Check failed for file: {path}")]
    VariableFrameRate {
        /// Path of the media file.
        path: PathBuf,
    },

    /// No video packet could be read while probing frame timing.
    #[error("Unable to read frame from file {path}")]
    ProbeRead {
        /// Path of the media file.
        path: PathBuf,
    },

    /// The stream codec is not one the decoder boundary accepts.
    #[error("Unhandled codec {codec} in {path}")]
    UnsupportedCodec {
        /// Path of the media file.
        path: PathBuf,
        /// Codec name.
        codec: String,
    },

    /// The bitstream filter could not be constructed or failed while running.
    #[error("Bitstream filter error: {0}")]
    BitstreamFilter(String),

    /// Every backoff seek (including the fallback to the start) overshot.
    #[error("Failed to seek to frame {frame} in {path}")]
    SeekExhausted {
        /// Path of the media file.
        path: PathBuf,
        /// The window start that could not be reached.
        frame: i64,
    },

    /// The decoder boundary did not appear within the startup timeout.
    #[error("Timeout waiting for a valid decoder after {0:?}")]
    DecoderStartupTimeout(Duration),

    /// A decoded sequence did not contain the requested number of frames.
    #[error("Decoded sequence holds {received} frames, expected {expected}")]
    IncompleteSequence {
        /// Frames requested.
        expected: usize,
        /// Frames actually decoded.
        received: usize,
    },

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    Decode(String),

    /// Loader configuration is unusable.
    #[error("Invalid loader configuration: {0}")]
    InvalidConfig(String),

    /// The reader thread is gone, so no request can be served.
    #[error("Reader stopped: {0}")]
    ReaderStopped(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while reading catalog or output files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// An error from the `image` crate while exporting frames.
    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),
}

impl From<FfmpegError> for FrameWindowError {
    fn from(error: FfmpegError) -> Self {
        FrameWindowError::Ffmpeg(error.to_string())
    }
}
