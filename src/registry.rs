//! Lazily opened, indefinitely cached per-file stream state.
//!
//! The first file opened fixes the catalog-wide resolution and codec and
//! creates the decoder boundary; every later file must match it.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use ffmpeg_next::{Rational, codec::Id as CodecId};

use crate::bitstream::annexb_filter_name;
use crate::container::{BitstreamNormalizer, Container, ContainerOpener, StreamProperties};
use crate::decoder::{DecoderFactory, FrameDecoder, FrameDelivery, StartupBarrier, StreamTiming};
use crate::error::FrameWindowError;
use crate::rational::{almost_equal, frame_base, rescale, to_f64};

/// Tolerance, in units in the last place, of the constant frame rate check.
const FRAME_DURATION_ULP: u64 = 2;

/// Shared slot through which caller threads obtain the decoder's delivery
/// half once the first file has been opened.
pub type DeliverySlot = StartupBarrier<Arc<dyn FrameDelivery>>;

/// Cached state of one opened file.
pub struct FileEntry {
    /// Path the file was opened from.
    pub path: PathBuf,
    /// Open demuxer.
    pub container: Box<dyn Container>,
    /// Index of the selected video stream.
    pub stream_index: usize,
    /// Codec of the video stream.
    pub codec: CodecId,
    /// Native timestamp unit of the video stream.
    pub stream_base: Rational,
    /// Duration of one frame.
    pub frame_base: Rational,
    /// Total frames in the stream.
    pub frame_count: i64,
    /// Annex-B converter, present for H.264 and HEVC.
    pub normalizer: Option<Box<dyn BitstreamNormalizer>>,
    /// Frame index of the last video packet read.
    pub last_frame: i64,
}

impl FileEntry {
    /// Time bases of the video stream.
    pub fn timing(&self) -> StreamTiming {
        StreamTiming {
            stream_base: self.stream_base,
            frame_base: self.frame_base,
        }
    }
}

/// Borrowed view of an opened file together with the decoder it feeds.
pub struct OpenedFile<'a> {
    /// The file's cached state.
    pub entry: &'a mut FileEntry,
    /// Reader side of the decoder boundary.
    pub decoder: &'a mut dyn FrameDecoder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Baseline {
    width: u32,
    height: u32,
    codec: CodecId,
}

/// Owns every opened file of one loader.
pub struct OpenFileRegistry {
    files: HashMap<PathBuf, FileEntry>,
    opener: Arc<dyn ContainerOpener>,
    factory: Box<dyn DecoderFactory>,
    baseline: Option<Baseline>,
    decoder: Option<Box<dyn FrameDecoder>>,
    delivery: Arc<DeliverySlot>,
}

impl OpenFileRegistry {
    /// Create an empty registry. The decoder boundary is built from
    /// `factory` when the first file opens and published through `delivery`.
    pub fn new(
        opener: Arc<dyn ContainerOpener>,
        factory: Box<dyn DecoderFactory>,
        delivery: Arc<DeliverySlot>,
    ) -> Self {
        Self {
            files: HashMap::new(),
            opener,
            factory,
            baseline: None,
            decoder: None,
            delivery,
        }
    }

    /// Number of files opened so far.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no file has been opened.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Cached state of `path`, if it has been opened.
    pub fn get(&self, path: &Path) -> Option<&FileEntry> {
        self.files.get(path)
    }

    /// Reader side of the decoder boundary, once the first file is open.
    pub fn decoder(&mut self) -> Option<&mut (dyn FrameDecoder + 'static)> {
        self.decoder.as_deref_mut()
    }

    /// Return the cached entry for `path`, opening and probing it first if
    /// needed.
    pub fn get_or_open(&mut self, path: &Path) -> Result<OpenedFile<'_>, FrameWindowError> {
        if !self.files.contains_key(path) {
            let entry = self.open(path)?;
            self.files.insert(path.to_path_buf(), entry);
        }
        let entry = self
            .files
            .get_mut(path)
            .ok_or_else(|| FrameWindowError::FileOpen {
                path: path.to_path_buf(),
                reason: "file vanished from the registry".to_string(),
            })?;
        let decoder = self
            .decoder
            .as_deref_mut()
            .ok_or_else(|| FrameWindowError::ReaderStopped("no decoder was created".to_string()))?;
        Ok(OpenedFile { entry, decoder })
    }

    fn open(&mut self, path: &Path) -> Result<FileEntry, FrameWindowError> {
        log::info!("Opening file {}", path.display());
        let mut container = self.opener.open(path)?;

        let stream_count = container.stream_count();
        if stream_count > 1 {
            log::info!(
                "There are {stream_count} streams in {} which will degrade performance. \
                 Consider removing all but the main video stream.",
                path.display()
            );
        }

        let stream = container
            .best_video_stream()
            .ok_or_else(|| FrameWindowError::NoVideoStream {
                path: path.to_path_buf(),
            })?;
        if stream.average_frame_rate.numerator() <= 0 || stream.average_frame_rate.denominator() <= 0
        {
            return Err(FrameWindowError::StreamInfo {
                path: path.to_path_buf(),
                reason: format!("unusable average frame rate {}", stream.average_frame_rate),
            });
        }

        self.check_baseline(path, &stream)?;

        let frame_base = frame_base(stream.average_frame_rate);
        check_constant_frame_rate(path, container.as_mut(), &stream, frame_base)?;
        let frame_count = declared_frame_count(&stream);
        if frame_count == 0 {
            log::warn!("{} does not declare a stream duration", path.display());
        }

        let filter_name =
            annexb_filter_name(stream.codec).ok_or_else(|| FrameWindowError::UnsupportedCodec {
                path: path.to_path_buf(),
                codec: format!("{:?}", stream.codec),
            })?;
        let normalizer = container.open_bitstream_filter(stream.index, filter_name)?;

        if self.decoder.is_none() {
            log::info!("Opened the first file, creating a video decoder");
            let boundary = self
                .factory
                .create(&stream, container.decoder_parameters(stream.index))?;
            self.decoder = Some(boundary.decoder);
            self.delivery.publish(boundary.delivery);
        }

        log::debug!(
            "{}: stream {} {:?} {}x{}, {frame_count} frames",
            path.display(),
            stream.index,
            stream.codec,
            stream.width,
            stream.height
        );

        Ok(FileEntry {
            path: path.to_path_buf(),
            container,
            stream_index: stream.index,
            codec: stream.codec,
            stream_base: stream.time_base,
            frame_base,
            frame_count,
            normalizer: Some(normalizer),
            last_frame: -1,
        })
    }

    fn check_baseline(
        &mut self,
        path: &Path,
        stream: &StreamProperties,
    ) -> Result<(), FrameWindowError> {
        let candidate = Baseline {
            width: stream.width,
            height: stream.height,
            codec: stream.codec,
        };
        match self.baseline {
            None => {
                self.baseline = Some(candidate);
                Ok(())
            }
            Some(baseline) if baseline == candidate => Ok(()),
            Some(baseline) => Err(FrameWindowError::FormatMismatch {
                path: path.to_path_buf(),
                width: candidate.width,
                height: candidate.height,
                codec: format!("{:?}", candidate.codec),
                expected_width: baseline.width,
                expected_height: baseline.height,
                expected_codec: format!("{:?}", baseline.codec),
            }),
        }
    }
}

/// Compare the duration of the first video packet with the declared frame
/// rate.
fn check_constant_frame_rate(
    path: &Path,
    container: &mut dyn Container,
    stream: &StreamProperties,
    frame_base: Rational,
) -> Result<(), FrameWindowError> {
    let packet = loop {
        match container.read_packet()? {
            Some(packet) if packet.stream() == stream.index => break packet,
            Some(_) => continue,
            None => {
                return Err(FrameWindowError::ProbeRead {
                    path: path.to_path_buf(),
                });
            }
        }
    };

    let declared = to_f64(frame_base);
    let measured = packet.duration() as f64 * to_f64(stream.time_base);
    if !almost_equal(declared, measured, FRAME_DURATION_ULP) {
        return Err(FrameWindowError::VariableFrameRate {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Frames in `stream` according to its declared duration and frame rate.
pub fn declared_frame_count(stream: &StreamProperties) -> i64 {
    if stream.duration <= 0
        || stream.average_frame_rate.numerator() <= 0
        || stream.average_frame_rate.denominator() <= 0
    {
        return 0;
    }
    rescale(
        stream.duration,
        stream.time_base,
        frame_base(stream.average_frame_rate),
    )
}
