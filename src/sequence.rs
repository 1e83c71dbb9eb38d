//! Enumeration of sequence starts across a catalog, and shard slicing.

use crate::catalog::FileCatalog;
use crate::config::LoaderConfig;
use crate::container::ContainerOpener;
use crate::error::FrameWindowError;
use crate::registry::declared_frame_count;

/// One sequence a loader can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceStart {
    /// Index of the file in the catalog.
    pub file_index: usize,
    /// First frame of the sequence.
    pub frame: i64,
    /// Label of the file.
    pub label: i32,
}

/// Every sequence start of a catalog, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct SequenceIndex {
    starts: Vec<SequenceStart>,
}

impl SequenceIndex {
    /// Probe every catalog file for its frame count and enumerate starts
    /// `0, step, 2 * step, ...` whose whole window fits in the file.
    ///
    /// Files are opened only long enough to read their stream properties.
    pub fn build(
        catalog: &FileCatalog,
        opener: &dyn ContainerOpener,
        config: &LoaderConfig,
    ) -> Result<Self, FrameWindowError> {
        let mut frame_counts = Vec::with_capacity(catalog.len());
        for entry in catalog.entries() {
            let container = opener.open(&entry.path)?;
            let stream =
                container
                    .best_video_stream()
                    .ok_or_else(|| FrameWindowError::NoVideoStream {
                        path: entry.path.clone(),
                    })?;
            frame_counts.push(declared_frame_count(&stream));
        }
        let index = Self::from_frame_counts(catalog, &frame_counts, config);
        log::info!(
            "Indexed {} sequences of {} frames across {} files",
            index.len(),
            config.sequence_length(),
            catalog.len()
        );
        Ok(index)
    }

    /// Enumerate starts from already known frame counts, one per catalog
    /// entry.
    pub fn from_frame_counts(
        catalog: &FileCatalog,
        frame_counts: &[i64],
        config: &LoaderConfig,
    ) -> Self {
        let window = config.window_len() as i64;
        let step = config.step() as i64;
        let mut starts = Vec::new();
        for (file_index, (entry, &frame_count)) in
            catalog.entries().iter().zip(frame_counts).enumerate()
        {
            let mut frame = 0;
            while frame + window <= frame_count {
                starts.push(SequenceStart {
                    file_index,
                    frame,
                    label: entry.label,
                });
                frame += step;
            }
        }
        Self { starts }
    }

    /// All starts.
    pub fn starts(&self) -> &[SequenceStart] {
        &self.starts
    }

    /// Number of starts.
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Whether there is no start at all.
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Start at `index`.
    pub fn get(&self, index: usize) -> Option<&SequenceStart> {
        self.starts.get(index)
    }
}

/// The contiguous slice of `len` items owned by one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRange {
    /// First index of the shard.
    pub start: usize,
    /// One past the last index of the shard.
    pub end: usize,
}

impl ShardRange {
    /// `[shard_id * len / num_shards, (shard_id + 1) * len / num_shards)`.
    pub fn new(len: usize, shard_id: usize, num_shards: usize) -> Self {
        let num_shards = num_shards.max(1);
        Self {
            start: shard_id * len / num_shards,
            end: (shard_id + 1) * len / num_shards,
        }
    }

    /// Items in the shard.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the shard owns nothing.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// The index after `index`, wrapping back to the shard start.
    pub fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next >= self.end { self.start } else { next }
    }
}
