//! The public loader.
//!
//! [`VideoLoader`] ties the pieces together: it indexes the sequence starts
//! of a catalog, runs a [`ReaderLoop`] on a dedicated thread and hands decoded
//! sequences back to callers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framewindow::{
//!     FfmpegOpener, FileCatalog, LoaderConfig, SoftwareDecoderFactory, VideoLoader,
//! };
//!
//! let catalog = FileCatalog::from_directory("videos/").unwrap();
//! let config = LoaderConfig::new().with_sequence_length(8).with_stride(2);
//! let mut loader = VideoLoader::start(
//!     config,
//!     catalog,
//!     Arc::new(FfmpegOpener::new()),
//!     Box::new(SoftwareDecoderFactory::new()),
//! )
//! .unwrap();
//!
//! let mut sequence = loader.prepare_empty();
//! loader.read_sample(&mut sequence).unwrap();
//! println!("label {} from frame {}", sequence.label, sequence.first_frame);
//! loader.shutdown().unwrap();
//! ```

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
};

use crate::cancellation::CancellationToken;
use crate::catalog::FileCatalog;
use crate::config::LoaderConfig;
use crate::container::ContainerOpener;
use crate::decoder::{DecoderFactory, SequenceResult};
use crate::error::FrameWindowError;
use crate::reader::ReaderLoop;
use crate::registry::{DeliverySlot, OpenFileRegistry};
use crate::request::{FrameRequest, RequestQueue};
use crate::sequence::{SequenceIndex, SequenceStart, ShardRange};
use crate::stats::{EfficiencyMonitor, Stats, StatsSnapshot};

const READER_THREAD_NAME: &str = "framewindow-reader";

/// Reads fixed-length frame sequences from a catalog of videos.
pub struct VideoLoader {
    config: LoaderConfig,
    catalog: FileCatalog,
    index: SequenceIndex,
    shard: ShardRange,
    cursor: usize,
    width: u32,
    height: u32,
    queue: Arc<RequestQueue>,
    stats: Arc<Stats>,
    delivery: Arc<DeliverySlot>,
    monitor: Mutex<EfficiencyMonitor>,
    stop: CancellationToken,
    reader: Option<JoinHandle<Result<(), FrameWindowError>>>,
}

impl VideoLoader {
    /// Index `catalog` and start the reader thread.
    ///
    /// Containers are opened through `opener`. The decoder boundary is built
    /// by `factory` on the reader thread once the first requested file is
    /// open.
    ///
    /// # Errors
    ///
    /// Returns [`FrameWindowError::InvalidConfig`] for unusable settings,
    /// [`FrameWindowError::EmptyCatalog`] when there is nothing to read, and
    /// any error from probing the catalog files.
    pub fn start(
        config: LoaderConfig,
        catalog: FileCatalog,
        opener: Arc<dyn ContainerOpener>,
        factory: Box<dyn DecoderFactory>,
    ) -> Result<Self, FrameWindowError> {
        config.validate()?;
        let first = catalog.get(0).ok_or(FrameWindowError::EmptyCatalog)?;
        let (width, height) = probe_dimensions(&first.path, opener.as_ref())?;

        let index = SequenceIndex::build(&catalog, opener.as_ref(), &config)?;
        let shard = ShardRange::new(index.len(), config.shard_id, config.num_shards);
        log::info!(
            "Shard {}/{} holds sequences {}..{} of {}",
            config.shard_id,
            config.num_shards,
            shard.start,
            shard.end,
            index.len()
        );

        let queue = Arc::new(RequestQueue::new());
        let stats = Arc::new(Stats::new());
        let delivery = Arc::new(DeliverySlot::new());
        let stop = CancellationToken::new();

        let reader = {
            let queue = Arc::clone(&queue);
            let stats = Arc::clone(&stats);
            let delivery = Arc::clone(&delivery);
            let stop = stop.clone();
            let runaway_tolerance = config.runaway_tolerance();
            thread::Builder::new()
                .name(READER_THREAD_NAME.to_string())
                .spawn(move || {
                    let registry = OpenFileRegistry::new(opener, factory, Arc::clone(&delivery));
                    let reader = ReaderLoop::new(queue, registry, stats, stop, runaway_tolerance);
                    let result = reader.run();
                    if let Err(error) = &result {
                        log::error!("Reader stopped: {error}");
                        delivery.fail(error.to_string());
                    }
                    result
                })?
        };

        Ok(Self {
            monitor: Mutex::new(EfficiencyMonitor::new(config.efficiency_thresholds())),
            config,
            catalog,
            index,
            cursor: shard.start,
            shard,
            width,
            height,
            queue,
            stats,
            delivery,
            stop,
            reader: Some(reader),
        })
    }

    /// Queue `count` frames (every `stride` frames per the configuration) of
    /// `filename`, starting at `frame`.
    pub fn push_sequence_to_read<P: Into<PathBuf>>(&self, filename: P, frame: i64, count: usize) {
        self.queue.push(FrameRequest::strided(
            filename,
            frame,
            count,
            self.config.stride(),
        ));
    }

    /// Block until the oldest outstanding sequence is decoded into
    /// `sequence`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameWindowError::DecoderStartupTimeout`] when no decoder
    /// appears within the configured timeout, or the reader's error if it
    /// stopped.
    pub fn receive_frames(&self, sequence: &mut SequenceResult) -> Result<(), FrameWindowError> {
        let delivery = self.delivery.wait(self.config.startup_timeout())?;
        delivery.deliver(sequence)?;

        let frames = sequence.count() as u64;
        self.stats.record_used(frames);
        if let Ok(mut monitor) = self.monitor.lock() {
            monitor.observe(frames, &self.stats.snapshot());
        }
        Ok(())
    }

    /// Read the next sequence of this shard into `sequence`, wrapping to the
    /// first one after the last.
    pub fn read_sample(&mut self, sequence: &mut SequenceResult) -> Result<(), FrameWindowError> {
        let start = self.next_start()?;
        let path = self
            .catalog
            .get(start.file_index)
            .map(|entry| entry.path.clone())
            .ok_or(FrameWindowError::EmptyCatalog)?;

        self.push_sequence_to_read(path, start.frame, self.config.sequence_length());
        self.receive_frames(sequence)?;
        sequence.label = start.label;
        self.cursor = self.shard.advance(self.cursor);
        Ok(())
    }

    fn next_start(&self) -> Result<SequenceStart, FrameWindowError> {
        if self.shard.is_empty() {
            return Err(FrameWindowError::InvalidConfig(format!(
                "shard {} of {} holds no sequences",
                self.config.shard_id, self.config.num_shards
            )));
        }
        self.index
            .get(self.cursor)
            .copied()
            .ok_or(FrameWindowError::EmptyCatalog)
    }

    /// An empty sequence sized for this loader.
    pub fn prepare_empty(&self) -> SequenceResult {
        SequenceResult::new(self.config.sequence_length(), self.height, self.width)
    }

    /// Sequences in this shard.
    pub fn len(&self) -> usize {
        self.shard.len()
    }

    /// Whether this shard holds no sequence.
    pub fn is_empty(&self) -> bool {
        self.shard.is_empty()
    }

    /// Width and height of every frame, taken from the first catalog file.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The catalog being read.
    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    /// Every indexed sequence start, across all shards.
    pub fn sequence_index(&self) -> &SequenceIndex {
        &self.index
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the reader and wait for it, returning its error if it failed.
    pub fn shutdown(mut self) -> Result<(), FrameWindowError> {
        self.join_reader()
    }

    fn join_reader(&mut self) -> Result<(), FrameWindowError> {
        self.stop.cancel();
        self.queue.close();
        match self.reader.take() {
            Some(handle) => handle.join().map_err(|_| {
                FrameWindowError::ReaderStopped("reader thread panicked".to_string())
            })?,
            None => Ok(()),
        }
    }
}

impl Drop for VideoLoader {
    fn drop(&mut self) {
        if let Err(error) = self.join_reader() {
            log::debug!("Reader finished with an error: {error}");
        }
    }
}

/// Width and height of the best video stream of `path`.
pub fn probe_dimensions(
    path: &Path,
    opener: &dyn ContainerOpener,
) -> Result<(u32, u32), FrameWindowError> {
    let container = opener.open(path)?;
    let stream = container
        .best_video_stream()
        .ok_or_else(|| FrameWindowError::NoVideoStream {
            path: path.to_path_buf(),
        })?;
    Ok((stream.width, stream.height))
}
