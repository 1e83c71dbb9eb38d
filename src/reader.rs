//! The background reader loop.
//!
//! One thread per loader pops requests in submission order, seeks the
//! requested file, walks its packets through a [`WindowScanner`] and forwards
//! them (annex-B normalised when needed) to the decoder boundary. Each
//! request ends with a flush sentinel, and one more is sent when the loop
//! stops.

use std::sync::Arc;

use ffmpeg_next::Packet;

use crate::cancellation::CancellationToken;
use crate::container::BitstreamNormalizer;
use crate::decoder::FrameDecoder;
use crate::error::FrameWindowError;
use crate::registry::{OpenFileRegistry, OpenedFile};
use crate::request::{FrameRequest, RequestQueue};
use crate::seek::seek_to_frame;
use crate::stats::Stats;
use crate::utilities::{packet_timestamp, timestamp_to_frame};
use crate::window::{Step, WindowScanner};

/// State owned by the reader thread.
pub struct ReaderLoop {
    queue: Arc<RequestQueue>,
    registry: OpenFileRegistry,
    stats: Arc<Stats>,
    stop: CancellationToken,
    runaway_tolerance: i64,
}

impl ReaderLoop {
    /// Assemble a reader. Nothing runs until [`run`](Self::run).
    pub fn new(
        queue: Arc<RequestQueue>,
        registry: OpenFileRegistry,
        stats: Arc<Stats>,
        stop: CancellationToken,
        runaway_tolerance: i64,
    ) -> Self {
        Self {
            queue,
            registry,
            stats,
            stop,
            runaway_tolerance,
        }
    }

    /// Serve requests until the stop signal is raised or the queue closes,
    /// then flush the decoder one last time.
    pub fn run(mut self) -> Result<(), FrameWindowError> {
        let served = self.serve();
        let flushed = match self.registry.decoder() {
            Some(decoder) => decoder.submit(None),
            None => Ok(()),
        };
        log::debug!("Leaving the reader loop");
        served.and(flushed)
    }

    fn serve(&mut self) -> Result<(), FrameWindowError> {
        while !self.stop.is_cancelled() {
            let Some(request) = self.queue.pop() else {
                break;
            };
            if self.stop.is_cancelled() {
                break;
            }
            log::debug!(
                "Got a request for {} frame {} count {}, {} queued",
                request.filename.display(),
                request.frame,
                request.count,
                self.queue.len()
            );
            self.serve_request(&request)?;
        }
        Ok(())
    }

    /// Deliver one window to the decoder, ending with a flush.
    pub fn serve_request(&mut self, request: &FrameRequest) -> Result<(), FrameWindowError> {
        let OpenedFile { entry, decoder } = self.registry.get_or_open(&request.filename)?;
        decoder.notify(request, entry.timing())?;

        // The decoder was flushed after the previous window, so a fresh key
        // frame is needed even when the file position is already right.
        seek_to_frame(entry, request.frame);
        if self.stop.is_cancelled() {
            return Ok(());
        }

        let timing = entry.timing();
        let mut scanner = WindowScanner::new(request, self.runaway_tolerance);
        while !scanner.is_done() {
            let Some(packet) = entry.container.read_packet()? else {
                log::debug!("{} ended inside the window", entry.path.display());
                break;
            };
            self.stats.record_read(packet.size());
            if packet.stream() != entry.stream_index {
                continue;
            }

            let frame = match packet_timestamp(&packet) {
                Some(timestamp) => timestamp_to_frame(timestamp, timing),
                None => entry.last_frame + 1,
            };
            entry.last_frame = frame;

            match scanner.observe(frame, packet.is_key()) {
                Step::Forward => {}
                Step::Reseek(target) => {
                    seek_to_frame(entry, target);
                    if self.stop.is_cancelled() {
                        return Ok(());
                    }
                    continue;
                }
                Step::Exhausted => {
                    return Err(FrameWindowError::SeekExhausted {
                        path: entry.path.clone(),
                        frame: scanner.start(),
                    });
                }
            }

            log::trace!(
                "Sending {} frame {frame}, size {}, window start {} remaining {}",
                if packet.is_key() { "key" } else { "nonkey" },
                packet.size(),
                scanner.start(),
                scanner.remaining()
            );
            self.stats.record_decoded(packet.size());
            forward(&mut entry.normalizer, decoder, packet)?;
        }

        decoder.submit(None)
    }
}

/// Pass `packet` through the normaliser, when there is one, and on to the
/// decoder.
fn forward(
    normalizer: &mut Option<Box<dyn BitstreamNormalizer>>,
    decoder: &mut dyn FrameDecoder,
    packet: Packet,
) -> Result<(), FrameWindowError> {
    match normalizer.as_mut() {
        Some(normalizer) if packet.size() > 0 => {
            normalizer.send(packet)?;
            while let Some(filtered) = normalizer.receive()? {
                decoder.submit(Some(&filtered))?;
            }
            Ok(())
        }
        _ => decoder.submit(Some(&packet)),
    }
}
