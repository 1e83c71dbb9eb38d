//! CPU implementation of the decoder boundary.
//!
//! Packets are decoded with libavcodec and converted to packed RGB24 at the
//! catalog resolution with swscale. For every announced window the decoder
//! keeps the frames `start, start + stride, ...` by presentation index; the
//! flush sentinel drains the codec, resets it for the next window and hands
//! the finished sequence to the caller side over a channel.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use ffmpeg_next::{
    Packet,
    codec::{Parameters, context::Context as CodecContext, decoder::Video as VideoDecoder},
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::container::StreamProperties;
use crate::decoder::{
    DecoderBoundary, DecoderFactory, FrameDecoder, FrameDelivery, SequenceResult, StreamTiming,
};
use crate::error::FrameWindowError;
use crate::request::FrameRequest;
use crate::utilities::{frame_to_buffer, timestamp_to_frame};

const RGB_BYTES_PER_PIXEL: usize = 3;

/// Builds [`SoftwareFrameDecoder`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareDecoderFactory;

impl SoftwareDecoderFactory {
    /// Create a factory.
    pub fn new() -> Self {
        Self
    }
}

impl DecoderFactory for SoftwareDecoderFactory {
    fn create(
        &self,
        stream: &StreamProperties,
        parameters: Option<Parameters>,
    ) -> Result<DecoderBoundary, FrameWindowError> {
        let parameters = parameters.ok_or_else(|| {
            FrameWindowError::Decode("container did not provide codec parameters".to_string())
        })?;
        let decoder_context = CodecContext::from_parameters(parameters)?;
        let decoder = decoder_context.decoder().video()?;

        let (sequences, finished) = crossbeam_channel::unbounded();
        let frame_decoder = SoftwareFrameDecoder {
            decoder,
            scaler: None,
            width: stream.width,
            height: stream.height,
            window: None,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            sequences,
        };
        Ok(DecoderBoundary {
            decoder: Box::new(frame_decoder),
            delivery: Arc::new(SoftwareDelivery { finished }),
        })
    }
}

/// A finished window on its way to a caller.
#[derive(Debug)]
struct DecodedSequence {
    first_frame: i64,
    expected: usize,
    frames: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct PendingWindow {
    start: i64,
    stride: i64,
    timing: StreamTiming,
    slots: Vec<Option<Vec<u8>>>,
}

impl PendingWindow {
    fn new(request: &FrameRequest, timing: StreamTiming) -> Self {
        Self {
            start: request.frame,
            stride: request.stride.max(1),
            timing,
            slots: vec![None; request.delivered_frames()],
        }
    }

    /// Slot of the frame at `frame`, if the window keeps it.
    fn slot_for(&self, frame: i64) -> Option<usize> {
        let offset = frame - self.start;
        if offset < 0 || offset % self.stride != 0 {
            return None;
        }
        let slot = (offset / self.stride) as usize;
        (slot < self.slots.len()).then_some(slot)
    }

    fn finish(self) -> DecodedSequence {
        let expected = self.slots.len();
        DecodedSequence {
            first_frame: self.start,
            expected,
            frames: self.slots.into_iter().map_while(|slot| slot).collect(),
        }
    }
}

/// Reader-side half: decodes packets and collects the requested frames.
pub struct SoftwareFrameDecoder {
    decoder: VideoDecoder,
    scaler: Option<ScalingContext>,
    width: u32,
    height: u32,
    window: Option<PendingWindow>,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    sequences: Sender<DecodedSequence>,
}

impl SoftwareFrameDecoder {
    fn drain(&mut self) -> Result<(), FrameWindowError> {
        while self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
            let Some(window) = self.window.as_mut() else {
                continue;
            };
            let Some(timestamp) = self.decoded_frame.timestamp().or(self.decoded_frame.pts()) else {
                log::debug!("Dropping decoded frame without a timestamp");
                continue;
            };
            let frame = timestamp_to_frame(timestamp, window.timing);
            let Some(slot) = window.slot_for(frame) else {
                continue;
            };

            if self.scaler.is_none() {
                self.scaler = Some(ScalingContext::get(
                    self.decoded_frame.format(),
                    self.decoded_frame.width(),
                    self.decoded_frame.height(),
                    Pixel::RGB24,
                    self.width,
                    self.height,
                    ScalingFlags::BILINEAR,
                )?);
            }
            if let Some(scaler) = self.scaler.as_mut() {
                scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
            }

            let mut pixels = Vec::new();
            frame_to_buffer(
                &self.rgb_frame,
                self.width,
                self.height,
                RGB_BYTES_PER_PIXEL,
                &mut pixels,
            );
            window.slots[slot] = Some(pixels);
        }
        Ok(())
    }
}

impl FrameDecoder for SoftwareFrameDecoder {
    fn notify(
        &mut self,
        request: &FrameRequest,
        timing: StreamTiming,
    ) -> Result<(), FrameWindowError> {
        self.window = Some(PendingWindow::new(request, timing));
        Ok(())
    }

    fn submit(&mut self, packet: Option<&Packet>) -> Result<(), FrameWindowError> {
        match packet {
            Some(packet) => {
                self.decoder.send_packet(packet)?;
                self.drain()
            }
            None => {
                self.decoder.send_eof()?;
                self.drain()?;
                self.decoder.flush();
                if let Some(window) = self.window.take() {
                    self.sequences.send(window.finish()).map_err(|_| {
                        FrameWindowError::ReaderStopped("frame receiver dropped".to_string())
                    })?;
                }
                Ok(())
            }
        }
    }
}

/// Caller-side half: hands finished sequences out in window order.
pub struct SoftwareDelivery {
    finished: Receiver<DecodedSequence>,
}

impl FrameDelivery for SoftwareDelivery {
    fn deliver(&self, sequence: &mut SequenceResult) -> Result<(), FrameWindowError> {
        let decoded = self.finished.recv().map_err(|_| {
            FrameWindowError::ReaderStopped("decoder stopped before the sequence was ready".to_string())
        })?;
        if decoded.frames.len() != decoded.expected || decoded.expected != sequence.count() {
            return Err(FrameWindowError::IncompleteSequence {
                expected: sequence.count(),
                received: decoded.frames.len(),
            });
        }

        sequence.reset();
        for pixels in &decoded.frames {
            sequence.push_frame(pixels)?;
        }
        sequence.first_frame = decoded.first_frame;
        Ok(())
    }
}
