//! Frame-window requests and the queue feeding the reader thread.
//!
//! Any number of caller threads push [`FrameRequest`]s; exactly one reader
//! pops them. Requests are served strictly in submission order regardless of
//! which file they name.

use std::{path::PathBuf, sync::Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::config::window_len;

/// A request for `count` source frames starting at `frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRequest {
    /// File to read from.
    pub filename: PathBuf,
    /// First frame of the window.
    pub frame: i64,
    /// Source frames spanned, already expanded by stride.
    pub count: i64,
    /// Distance between frames that are kept.
    pub stride: i64,
}

impl FrameRequest {
    /// Build a request for `frames` frames taken every `stride` frames.
    pub fn strided<P: Into<PathBuf>>(filename: P, frame: i64, frames: usize, stride: usize) -> Self {
        Self {
            filename: filename.into(),
            frame,
            count: window_len(frames, stride) as i64,
            stride: stride as i64,
        }
    }

    /// Number of frames the caller will receive.
    pub fn delivered_frames(&self) -> usize {
        if self.count <= 0 {
            0
        } else {
            ((self.count - 1) / self.stride.max(1) + 1) as usize
        }
    }
}

/// Unbounded FIFO with a blocking pop that wakes on [`close`](Self::close).
///
/// Back-pressure is the caller's responsibility; pushing never blocks.
#[derive(Debug)]
pub struct RequestQueue {
    requests: Sender<FrameRequest>,
    pending: Receiver<FrameRequest>,
    shutdown: Mutex<Option<Sender<()>>>,
    closed: Receiver<()>,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestQueue {
    /// Create an open, empty queue.
    pub fn new() -> Self {
        let (requests, pending) = crossbeam_channel::unbounded();
        let (shutdown, closed) = crossbeam_channel::bounded(0);
        Self {
            requests,
            pending,
            shutdown: Mutex::new(Some(shutdown)),
            closed,
        }
    }

    /// Enqueue a request.
    pub fn push(&self, request: FrameRequest) {
        // Both channel ends live in `self`, so the send cannot fail.
        let _ = self.requests.send(request);
    }

    /// Block until a request is available or the queue is closed.
    ///
    /// Returns `None` once closed, even if requests are still pending.
    pub fn pop(&self) -> Option<FrameRequest> {
        if self.is_closed() {
            return None;
        }
        crossbeam_channel::select! {
            recv(self.pending) -> request => request.ok(),
            recv(self.closed) -> _ => None,
        }
    }

    /// Wake every blocked [`pop`](Self::pop) and make future pops return
    /// `None`.
    pub fn close(&self) {
        if let Ok(mut shutdown) = self.shutdown.lock() {
            shutdown.take();
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shutdown
            .lock()
            .map(|shutdown| shutdown.is_none())
            .unwrap_or(true)
    }

    /// Requests waiting to be popped.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no request is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
