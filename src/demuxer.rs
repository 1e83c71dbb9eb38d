//! libavformat-backed [`Container`] implementation.

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet, codec::Parameters, format::context::Input, media::Type,
};
use ffmpeg_sys_next::{AVSEEK_FLAG_BACKWARD, av_seek_frame, avcodec_parameters_copy};

use crate::bitstream::AnnexBFilter;
use crate::container::{BitstreamNormalizer, Container, ContainerOpener, StreamProperties};
use crate::error::FrameWindowError;

/// Opens files with `ffmpeg_next::format::input`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegOpener;

impl FfmpegOpener {
    /// Create an opener.
    pub fn new() -> Self {
        Self
    }
}

impl ContainerOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>, FrameWindowError> {
        Ok(Box::new(FfmpegContainer::open(path)?))
    }
}

/// An opened libavformat input context.
pub struct FfmpegContainer {
    input: Input,
    path: PathBuf,
}

impl FfmpegContainer {
    /// Open and probe `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameWindowError::FileOpen`] if FFmpeg cannot open the file
    /// or find its stream information.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FrameWindowError> {
        let path = path.as_ref().to_path_buf();

        ffmpeg_next::init().map_err(|error| FrameWindowError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| FrameWindowError::FileOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        log::debug!("File open {} (format={})", path.display(), input.format().name());

        Ok(Self { input, path })
    }
}

impl Container for FfmpegContainer {
    fn stream_count(&self) -> usize {
        self.input.nb_streams() as usize
    }

    fn best_video_stream(&self) -> Option<StreamProperties> {
        let stream = self.input.streams().best(Type::Video)?;
        let parameters = stream.parameters();
        let (width, height) = unsafe {
            let raw = *parameters.as_ptr();
            (raw.width.max(0) as u32, raw.height.max(0) as u32)
        };

        Some(StreamProperties {
            index: stream.index(),
            codec: parameters.id(),
            width,
            height,
            time_base: stream.time_base(),
            average_frame_rate: stream.avg_frame_rate(),
            duration: stream.duration(),
        })
    }

    fn read_packet(&mut self) -> Result<Option<Packet>, FrameWindowError> {
        let mut packet = Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(packet)),
            Err(FfmpegError::Eof) => Ok(None),
            Err(error) => Err(FrameWindowError::from(error)),
        }
    }

    fn seek(&mut self, stream_index: usize, timestamp: i64) -> Result<(), FrameWindowError> {
        let ret = unsafe {
            av_seek_frame(
                self.input.as_mut_ptr(),
                stream_index as i32,
                timestamp,
                AVSEEK_FLAG_BACKWARD as i32,
            )
        };
        if ret < 0 {
            return Err(FrameWindowError::from(FfmpegError::from(ret)));
        }
        Ok(())
    }

    fn open_bitstream_filter(
        &mut self,
        stream_index: usize,
        filter_name: &str,
    ) -> Result<Box<dyn BitstreamNormalizer>, FrameWindowError> {
        let stream = self
            .input
            .stream(stream_index)
            .ok_or_else(|| FrameWindowError::NoVideoStream {
                path: self.path.clone(),
            })?;
        let time_base = stream.time_base();
        let parameters = stream.parameters();

        let filter = unsafe { AnnexBFilter::new(filter_name, parameters.as_ptr(), time_base)? };

        // The decoder must see the filtered stream's parameters (extradata in
        // particular), not the container's.
        let ret = unsafe {
            let stream = *(*self.input.as_mut_ptr()).streams.add(stream_index);
            avcodec_parameters_copy((*stream).codecpar, filter.output_parameters())
        };
        if ret < 0 {
            return Err(FrameWindowError::BitstreamFilter(format!(
                "Error copying BSF output parameters: {}",
                FfmpegError::from(ret)
            )));
        }

        Ok(Box::new(filter))
    }

    fn decoder_parameters(&self, stream_index: usize) -> Option<Parameters> {
        self.input
            .stream(stream_index)
            .map(|stream| stream.parameters().clone())
    }
}
