//! Annex-B bitstream normalisation through the libavcodec BSF API.
//!
//! MP4 and MKV store H.264/HEVC with length-prefixed NAL units and out-of-band
//! parameter sets. Hardware decoders want the self-contained annex-B form, so
//! every packet of such a stream goes through `h264_mp4toannexb` or
//! `hevc_mp4toannexb` before decoding. `ffmpeg-next` does not wrap the BSF
//! API, so this module calls `ffmpeg-sys-next` directly.

use std::{ffi::CString, ptr};

use ffmpeg_next::{Error as FfmpegError, Packet, Rational, codec::Id as CodecId};
use ffmpeg_sys_next::{
    AVBSFContext, AVCodecParameters, AVERROR, AVERROR_EOF, EAGAIN, av_bsf_alloc, av_bsf_free,
    av_bsf_get_by_name, av_bsf_init, av_bsf_receive_packet, av_bsf_send_packet,
    avcodec_parameters_copy,
};

use crate::container::BitstreamNormalizer;
use crate::error::FrameWindowError;

/// Name of the annex-B filter for `codec`, or `None` if the codec is not
/// accepted by the decoder boundary.
pub fn annexb_filter_name(codec: CodecId) -> Option<&'static str> {
    match codec {
        CodecId::H264 => Some("h264_mp4toannexb"),
        CodecId::HEVC => Some("hevc_mp4toannexb"),
        _ => None,
    }
}

/// An initialised bitstream filter context.
pub struct AnnexBFilter {
    context: *mut AVBSFContext,
}

impl AnnexBFilter {
    /// Allocate and initialise `filter_name` for a stream described by
    /// `parameters`.
    ///
    /// # Safety
    ///
    /// `parameters` must point to valid codec parameters for the duration of
    /// the call.
    pub(crate) unsafe fn new(
        filter_name: &str,
        parameters: *const AVCodecParameters,
        time_base: Rational,
    ) -> Result<Self, FrameWindowError> {
        let name = CString::new(filter_name).map_err(|_| {
            FrameWindowError::BitstreamFilter(format!("invalid filter name {filter_name:?}"))
        })?;

        unsafe {
            let filter = av_bsf_get_by_name(name.as_ptr());
            if filter.is_null() {
                return Err(FrameWindowError::BitstreamFilter(format!(
                    "Error finding bit stream filter {filter_name}"
                )));
            }

            let mut context: *mut AVBSFContext = ptr::null_mut();
            if av_bsf_alloc(filter, &mut context) < 0 {
                return Err(FrameWindowError::BitstreamFilter(
                    "Error allocating bit stream filter context".to_string(),
                ));
            }
            // From here on `Drop` releases the context on every early return.
            let filter = Self { context };

            if avcodec_parameters_copy((*context).par_in, parameters) < 0 {
                return Err(FrameWindowError::BitstreamFilter(
                    "Error setting BSF parameters".to_string(),
                ));
            }
            (*context).time_base_in = time_base.into();

            let ret = av_bsf_init(context);
            if ret < 0 {
                return Err(FrameWindowError::BitstreamFilter(format!(
                    "Error initializing BSF: {}",
                    FfmpegError::from(ret)
                )));
            }

            Ok(filter)
        }
    }

    /// Codec parameters describing the filter output.
    pub(crate) fn output_parameters(&self) -> *const AVCodecParameters {
        unsafe { (*self.context).par_out }
    }
}

impl BitstreamNormalizer for AnnexBFilter {
    fn send(&mut self, mut packet: Packet) -> Result<(), FrameWindowError> {
        let ret = unsafe { av_bsf_send_packet(self.context, packet.as_mut_ptr()) };
        if ret < 0 {
            return Err(FrameWindowError::BitstreamFilter(format!(
                "BSF send packet failed: {}",
                FfmpegError::from(ret)
            )));
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Packet>, FrameWindowError> {
        let mut filtered = Packet::empty();
        let ret = unsafe { av_bsf_receive_packet(self.context, filtered.as_mut_ptr()) };
        if ret == 0 {
            Ok(Some(filtered))
        } else if ret == AVERROR(EAGAIN) || ret == AVERROR_EOF {
            Ok(None)
        } else {
            Err(FrameWindowError::BitstreamFilter(format!(
                "BSF receive packet failed: {}",
                FfmpegError::from(ret)
            )))
        }
    }
}

impl Drop for AnnexBFilter {
    fn drop(&mut self) {
        unsafe { av_bsf_free(&mut self.context) };
    }
}
