//! The decoder boundary.
//!
//! The reader thread drives a [`FrameDecoder`]: it announces each window with
//! [`notify`](FrameDecoder::notify), feeds normalised packets with
//! [`submit`](FrameDecoder::submit) and closes the window with a `None`
//! flush sentinel. Caller threads block in
//! [`FrameDelivery::deliver`] until the decoded frames have been written into
//! their own [`SequenceResult`].
//!
//! Both halves come from a [`DecoderFactory`], which the registry invokes once
//! the first file has fixed the catalog-wide resolution and codec.

use std::{
    path::Path,
    sync::{Arc, Condvar, Mutex},
    time::{Duration, Instant},
};

use ffmpeg_next::{Packet, Rational, codec::Parameters};
use image::RgbImage;

use crate::container::StreamProperties;
use crate::error::FrameWindowError;
use crate::request::FrameRequest;

/// Time bases needed to turn packet timestamps into frame indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamTiming {
    /// Native timestamp unit of the stream.
    pub stream_base: Rational,
    /// Duration of one frame.
    pub frame_base: Rational,
}

/// Reader-side half of the decoder boundary.
pub trait FrameDecoder {
    /// Announce the next window before any of its packets arrive.
    fn notify(&mut self, request: &FrameRequest, timing: StreamTiming)
    -> Result<(), FrameWindowError>;

    /// Feed one packet, or `None` to flush the current window.
    fn submit(&mut self, packet: Option<&Packet>) -> Result<(), FrameWindowError>;
}

/// Caller-side half of the decoder boundary.
pub trait FrameDelivery: Send + Sync {
    /// Block until the next window is decoded and write it into `sequence`.
    fn deliver(&self, sequence: &mut SequenceResult) -> Result<(), FrameWindowError>;
}

/// Both halves of a decoder boundary.
pub struct DecoderBoundary {
    /// Driven by the reader thread.
    pub decoder: Box<dyn FrameDecoder>,
    /// Shared with caller threads.
    pub delivery: Arc<dyn FrameDelivery>,
}

/// Builds the decoder boundary for the catalog baseline.
pub trait DecoderFactory: Send {
    /// `stream` is the first opened file's video stream; `parameters` are its
    /// (already normalised) codec parameters when the container provides them.
    fn create(
        &self,
        stream: &StreamProperties,
        parameters: Option<Parameters>,
    ) -> Result<DecoderBoundary, FrameWindowError>;
}

/// A caller-owned destination for one decoded sequence.
///
/// Frames are stored back to back as packed RGB24 rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceResult {
    buffer: Vec<u8>,
    count: usize,
    height: u32,
    width: u32,
    filled: usize,
    /// Class label of the file the sequence came from.
    pub label: i32,
    /// First frame index of the sequence in its file.
    pub first_frame: i64,
}

impl SequenceResult {
    /// Channels per pixel.
    pub const CHANNELS: usize = 3;

    /// Allocate room for `count` frames of `width` x `height`.
    pub fn new(count: usize, height: u32, width: u32) -> Self {
        Self {
            buffer: vec![0; count * frame_bytes(height, width)],
            count,
            height,
            width,
            filled: 0,
            label: 0,
            first_frame: 0,
        }
    }

    /// Frames this sequence holds when complete.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frames written so far.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Whether every frame has been written.
    pub fn is_complete(&self) -> bool {
        self.filled == self.count
    }

    /// Forget previously written frames.
    pub fn reset(&mut self) {
        self.filled = 0;
    }

    /// Bytes of one frame.
    pub fn frame_len(&self) -> usize {
        frame_bytes(self.height, self.width)
    }

    /// Append one packed RGB24 frame.
    pub fn push_frame(&mut self, pixels: &[u8]) -> Result<(), FrameWindowError> {
        let frame_len = self.frame_len();
        if self.filled >= self.count {
            return Err(FrameWindowError::Decode(format!(
                "sequence already holds {} frames",
                self.count
            )));
        }
        if pixels.len() != frame_len {
            return Err(FrameWindowError::Decode(format!(
                "frame has {} bytes, expected {frame_len}",
                pixels.len()
            )));
        }
        let offset = self.filled * frame_len;
        self.buffer[offset..offset + frame_len].copy_from_slice(pixels);
        self.filled += 1;
        Ok(())
    }

    /// Pixels of frame `index`, if it has been written.
    pub fn frame(&self, index: usize) -> Option<&[u8]> {
        if index >= self.filled {
            return None;
        }
        let frame_len = self.frame_len();
        Some(&self.buffer[index * frame_len..(index + 1) * frame_len])
    }

    /// Frame `index` as an image.
    pub fn frame_image(&self, index: usize) -> Option<RgbImage> {
        let pixels = self.frame(index)?;
        RgbImage::from_raw(self.width, self.height, pixels.to_vec())
    }

    /// Save frame `index`; the format follows the file extension.
    pub fn save_frame<P: AsRef<Path>>(&self, index: usize, path: P) -> Result<(), FrameWindowError> {
        let image = self.frame_image(index).ok_or(FrameWindowError::IncompleteSequence {
            expected: index + 1,
            received: self.filled,
        })?;
        image.save(path)?;
        Ok(())
    }

    /// The whole backing buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

fn frame_bytes(height: u32, width: u32) -> usize {
    height as usize * width as usize * SequenceResult::CHANNELS
}

fn barrier_poisoned() -> FrameWindowError {
    FrameWindowError::ReaderStopped("startup barrier poisoned".to_string())
}

enum BarrierState<T> {
    Pending,
    Ready(T),
    Failed(String),
}

/// Hands a value produced on one thread to any number of waiting threads.
///
/// Waiters give up after a bounded timeout; a producer that fails instead
/// releases every waiter with its error message.
pub struct StartupBarrier<T> {
    state: Mutex<BarrierState<T>>,
    ready: Condvar,
}

impl<T: Clone> Default for StartupBarrier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> StartupBarrier<T> {
    /// A barrier with nothing published yet.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BarrierState::Pending),
            ready: Condvar::new(),
        }
    }

    /// Publish `value` and wake all waiters. Later calls are ignored.
    pub fn publish(&self, value: T) {
        if let Ok(mut state) = self.state.lock() {
            if matches!(*state, BarrierState::Pending) {
                *state = BarrierState::Ready(value);
            }
        }
        self.ready.notify_all();
    }

    /// Release all waiters with an error.
    pub fn fail(&self, reason: String) {
        if let Ok(mut state) = self.state.lock() {
            if matches!(*state, BarrierState::Pending) {
                *state = BarrierState::Failed(reason);
            }
        }
        self.ready.notify_all();
    }

    /// The published value, if any, without waiting.
    pub fn get(&self) -> Option<T> {
        match &*self.state.lock().ok()? {
            BarrierState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Wait up to `timeout` for the value.
    pub fn wait(&self, timeout: Duration) -> Result<T, FrameWindowError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().map_err(|_| barrier_poisoned())?;
        loop {
            match &*state {
                BarrierState::Ready(value) => return Ok(value.clone()),
                BarrierState::Failed(reason) => {
                    return Err(FrameWindowError::ReaderStopped(reason.clone()));
                }
                BarrierState::Pending => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(FrameWindowError::DecoderStartupTimeout(timeout));
            }
            state = self
                .ready
                .wait_timeout(state, deadline - now)
                .map_err(|_| barrier_poisoned())?
                .0;
        }
    }
}
