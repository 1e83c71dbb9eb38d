//! Demuxer seams.
//!
//! The loader never talks to libavformat directly: it drives a [`Container`]
//! obtained from a [`ContainerOpener`]. [`crate::demuxer::FfmpegOpener`] is
//! the production implementation; tests script their own containers to
//! reproduce imprecise seeks and malformed streams.

use std::path::Path;

use ffmpeg_next::{Packet, Rational, codec::Id as CodecId, codec::Parameters};

use crate::error::FrameWindowError;

/// Facts about the selected video stream of a container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamProperties {
    /// Index of the stream inside its container.
    pub index: usize,
    /// Codec of the stream.
    pub codec: CodecId,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Native timestamp unit of the stream.
    pub time_base: Rational,
    /// Declared average frame rate.
    pub average_frame_rate: Rational,
    /// Stream duration in `time_base` units; zero or negative when unknown.
    pub duration: i64,
}

/// Converts in-container packets to a self-contained (annex-B) bitstream.
pub trait BitstreamNormalizer {
    /// Feed one packet into the filter.
    fn send(&mut self, packet: Packet) -> Result<(), FrameWindowError>;

    /// Pull the next filtered packet, or `None` when the filter needs more
    /// input.
    fn receive(&mut self) -> Result<Option<Packet>, FrameWindowError>;
}

/// An opened media container.
pub trait Container {
    /// Total number of streams of any kind.
    fn stream_count(&self) -> usize;

    /// The best video stream, if the container has one.
    fn best_video_stream(&self) -> Option<StreamProperties>;

    /// Read the next packet in container order. `None` marks end of stream.
    fn read_packet(&mut self) -> Result<Option<Packet>, FrameWindowError>;

    /// Seek `stream_index` backwards to a key frame at or before `timestamp`
    /// (in the stream's time base). The landing position is best effort.
    fn seek(&mut self, stream_index: usize, timestamp: i64) -> Result<(), FrameWindowError>;

    /// Build the named bitstream filter for `stream_index` and propagate its
    /// output parameters onto the stream.
    fn open_bitstream_filter(
        &mut self,
        stream_index: usize,
        filter_name: &str,
    ) -> Result<Box<dyn BitstreamNormalizer>, FrameWindowError>;

    /// Codec parameters for building a real decoder, when the container can
    /// provide them.
    fn decoder_parameters(&self, _stream_index: usize) -> Option<Parameters> {
        None
    }
}

/// Opens containers by path.
pub trait ContainerOpener: Send + Sync {
    /// Open and probe `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn Container>, FrameWindowError>;
}
