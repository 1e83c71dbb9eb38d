//! # framewindow
//!
//! Exact frame windows from compressed video, for batched training
//! pipelines.
//!
//! Callers ask for "N frames starting at frame F, every S frames" from a named
//! file. A single background reader locates that window inside the
//! container, seeks to a key frame at or before it (backing off when the
//! container's seek lands too late), walks the packets forward, converts
//! H.264/HEVC to annex-B and feeds a decoder boundary. Decoded sequences come
//! back in request order.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framewindow::{
//!     FfmpegOpener, FileCatalog, LoaderConfig, SoftwareDecoderFactory, VideoLoader,
//! };
//!
//! // One class per sub-directory: labels follow the sorted directory names.
//! let catalog = FileCatalog::from_directory("dataset/").unwrap();
//! let config = LoaderConfig::new().with_sequence_length(16).with_stride(2);
//!
//! let mut loader = VideoLoader::start(
//!     config,
//!     catalog,
//!     Arc::new(FfmpegOpener::new()),
//!     Box::new(SoftwareDecoderFactory::new()),
//! )
//! .unwrap();
//!
//! let mut sequence = loader.prepare_empty();
//! for _ in 0..loader.len() {
//!     loader.read_sample(&mut sequence).unwrap();
//!     sequence.save_frame(0, "first.png").unwrap();
//! }
//! println!("{:?}", loader.stats());
//! ```
//!
//! ## Pieces
//!
//! - [`FileCatalog`] builds the `(path, label)` table from a directory tree, a
//!   list file or plain filenames.
//! - [`OpenFileRegistry`] opens and probes files lazily and enforces one
//!   resolution and codec per catalog; variable frame rate streams are
//!   rejected.
//! - [`WindowScanner`] classifies packets of one request (key or not, seek
//!   overshoot, runaway windows).
//! - [`ReaderLoop`] is the background thread; [`RequestQueue`] feeds it.
//! - [`Container`], [`FrameDecoder`] and [`FrameDelivery`] are the seams to
//!   the demuxer and the decoder. [`FfmpegOpener`] and
//!   [`SoftwareDecoderFactory`] implement them on top of FFmpeg.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod bitstream;
pub mod cancellation;
pub mod catalog;
pub mod config;
pub mod container;
pub mod decoder;
pub mod demuxer;
pub mod error;
pub mod ffmpeg;
pub mod loader;
pub mod rational;
pub mod reader;
pub mod registry;
pub mod request;
pub mod seek;
pub mod sequence;
pub mod software_decoder;
pub mod stats;
mod utilities;
pub mod window;

pub use bitstream::{AnnexBFilter, annexb_filter_name};
pub use cancellation::CancellationToken;
pub use catalog::{CatalogEntry, FileCatalog};
pub use config::{EfficiencyThresholds, LoaderConfig};
pub use container::{BitstreamNormalizer, Container, ContainerOpener, StreamProperties};
pub use decoder::{
    DecoderBoundary, DecoderFactory, FrameDecoder, FrameDelivery, SequenceResult, StartupBarrier,
    StreamTiming,
};
pub use demuxer::{FfmpegContainer, FfmpegOpener};
pub use error::FrameWindowError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use loader::{VideoLoader, probe_dimensions};
pub use rational::{almost_equal, rescale};
pub use reader::ReaderLoop;
pub use registry::{DeliverySlot, FileEntry, OpenFileRegistry, OpenedFile};
pub use request::{FrameRequest, RequestQueue};
pub use sequence::{SequenceIndex, SequenceStart, ShardRange};
pub use software_decoder::{SoftwareDecoderFactory, SoftwareDelivery, SoftwareFrameDecoder};
pub use stats::{EfficiencyMonitor, Stats, StatsSnapshot};
pub use window::{Step, WindowScanner, WindowState};
