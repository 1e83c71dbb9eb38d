//! In-memory containers and decoders for driving the loader without media
//! files.
//!
//! Clips use a 1/90000 stream time base at 30 fps, so frame `n` has
//! timestamp `n * 3000`. Packets are stored in presentation order.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    ops::Range,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crossbeam_channel::{Receiver, Sender};
use ffmpeg_next::{Packet, Rational, codec::Id as CodecId, packet::Flags};
use framewindow::{
    BitstreamNormalizer, Container, ContainerOpener, DecoderBoundary, DecoderFactory,
    FrameDecoder, FrameDelivery, FrameRequest, FrameWindowError, SequenceResult,
    StreamProperties, StreamTiming, rescale,
};

pub const TICKS_PER_FRAME: i64 = 3000;

pub fn stream_base() -> Rational {
    Rational::new(1, 90_000)
}

/// Description of a scripted clip.
#[derive(Debug, Clone)]
pub struct ClipLayout {
    pub frames: i64,
    pub keyframes: Vec<i64>,
    pub width: u32,
    pub height: u32,
    pub codec: CodecId,
    pub frame_rate: Rational,
    pub packet_duration: i64,
    pub extra_streams: usize,
    pub has_video: bool,
    /// Target frame of a seek mapped to the key frame it lands on instead.
    pub seek_overrides: HashMap<i64, i64>,
    /// Frames with no packet at all, leaving a gap in the timestamps.
    pub missing_frames: Vec<i64>,
    /// Frames whose video packet carries no payload.
    pub empty_packets: Vec<i64>,
    pub splitting_normalizer: bool,
}

impl ClipLayout {
    /// `frames` frames with a key frame every `gop` frames.
    pub fn new(frames: i64, gop: i64) -> Self {
        Self {
            frames,
            keyframes: (0..frames).step_by(gop.max(1) as usize).collect(),
            width: 64,
            height: 48,
            codec: CodecId::H264,
            frame_rate: Rational::new(30, 1),
            packet_duration: TICKS_PER_FRAME,
            extra_streams: 0,
            has_video: true,
            seek_overrides: HashMap::new(),
            missing_frames: Vec::new(),
            empty_packets: Vec::new(),
            splitting_normalizer: false,
        }
    }

    pub fn with_keyframes(mut self, keyframes: &[i64]) -> Self {
        self.keyframes = keyframes.to_vec();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_codec(mut self, codec: CodecId) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_packet_duration(mut self, ticks: i64) -> Self {
        self.packet_duration = ticks;
        self
    }

    pub fn with_extra_streams(mut self, count: usize) -> Self {
        self.extra_streams = count;
        self
    }

    pub fn without_video(mut self) -> Self {
        self.has_video = false;
        self
    }

    pub fn with_seek_override(mut self, target: i64, landing: i64) -> Self {
        self.seek_overrides.insert(target, landing);
        self
    }

    pub fn with_missing_frames(mut self, frames: Range<i64>) -> Self {
        self.missing_frames.extend(frames);
        self
    }

    pub fn with_empty_packets(mut self, frames: &[i64]) -> Self {
        self.empty_packets.extend_from_slice(frames);
        self
    }

    /// Normalise through a [`Splitter`] instead of a [`Passthrough`].
    pub fn with_splitting_normalizer(mut self) -> Self {
        self.splitting_normalizer = true;
        self
    }

    fn is_key(&self, frame: i64) -> bool {
        self.keyframes.contains(&frame)
    }
}

/// One seek issued against a scripted container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekRecord {
    pub path: PathBuf,
    pub target: i64,
    pub landed: i64,
}

/// Hands out [`ScriptedContainer`]s and records what happens to them.
#[derive(Debug, Default, Clone)]
pub struct ScriptedOpener {
    clips: HashMap<PathBuf, ClipLayout>,
    pub seeks: Arc<Mutex<Vec<SeekRecord>>>,
    pub opens: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clip<P: Into<PathBuf>>(mut self, path: P, clip: ClipLayout) -> Self {
        self.clips.insert(path.into(), clip);
        self
    }

    pub fn seek_targets(&self) -> Vec<i64> {
        self.seeks.lock().unwrap().iter().map(|seek| seek.target).collect()
    }

    pub fn open_count(&self, path: &str) -> usize {
        self.opens
            .lock()
            .unwrap()
            .iter()
            .filter(|opened| opened.as_path() == Path::new(path))
            .count()
    }
}

impl ContainerOpener for ScriptedOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>, FrameWindowError> {
        let clip = self
            .clips
            .get(path)
            .cloned()
            .ok_or_else(|| FrameWindowError::FileOpen {
                path: path.to_path_buf(),
                reason: "no such scripted clip".to_string(),
            })?;
        self.opens.lock().unwrap().push(path.to_path_buf());
        Ok(Box::new(ScriptedContainer::new(
            path.to_path_buf(),
            clip,
            Arc::clone(&self.seeks),
        )))
    }
}

/// Stream index of the video stream (extra streams come after it).
pub const VIDEO_STREAM: usize = 0;

/// Container over a [`ClipLayout`]; after every video packet it emits one
/// packet per extra stream.
pub struct ScriptedContainer {
    path: PathBuf,
    clip: ClipLayout,
    layout: Vec<(usize, i64)>,
    position: usize,
    seeks: Arc<Mutex<Vec<SeekRecord>>>,
}

impl ScriptedContainer {
    pub fn new(path: PathBuf, clip: ClipLayout, seeks: Arc<Mutex<Vec<SeekRecord>>>) -> Self {
        let mut layout = Vec::new();
        for frame in 0..clip.frames {
            if clip.missing_frames.contains(&frame) {
                continue;
            }
            if clip.has_video {
                layout.push((VIDEO_STREAM, frame));
            }
            for extra in 0..clip.extra_streams {
                layout.push((VIDEO_STREAM + 1 + extra, frame));
            }
        }
        Self {
            path,
            clip,
            layout,
            position: 0,
            seeks,
        }
    }
}

impl Container for ScriptedContainer {
    fn stream_count(&self) -> usize {
        usize::from(self.clip.has_video) + self.clip.extra_streams
    }

    fn best_video_stream(&self) -> Option<StreamProperties> {
        self.clip.has_video.then(|| StreamProperties {
            index: VIDEO_STREAM,
            codec: self.clip.codec,
            width: self.clip.width,
            height: self.clip.height,
            time_base: stream_base(),
            average_frame_rate: self.clip.frame_rate,
            duration: self.clip.frames * TICKS_PER_FRAME,
        })
    }

    fn read_packet(&mut self) -> Result<Option<Packet>, FrameWindowError> {
        let Some(&(stream, frame)) = self.layout.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let empty = stream == VIDEO_STREAM && self.clip.empty_packets.contains(&frame);
        let mut packet = if empty {
            Packet::empty()
        } else {
            Packet::copy(&[0, 0, 0, 1, frame as u8])
        };
        packet.set_stream(stream);
        packet.set_pts(Some(frame * TICKS_PER_FRAME));
        packet.set_dts(Some(frame * TICKS_PER_FRAME));
        packet.set_duration(self.clip.packet_duration);
        if stream == VIDEO_STREAM && self.clip.is_key(frame) {
            packet.set_flags(Flags::KEY);
        }
        Ok(Some(packet))
    }

    fn seek(&mut self, _stream_index: usize, timestamp: i64) -> Result<(), FrameWindowError> {
        let target = timestamp / TICKS_PER_FRAME;
        let landed = self.clip.seek_overrides.get(&target).copied().unwrap_or_else(|| {
            self.clip
                .keyframes
                .iter()
                .copied()
                .filter(|&key| key <= target)
                .max()
                .unwrap_or(0)
        });
        self.seeks.lock().unwrap().push(SeekRecord {
            path: self.path.clone(),
            target,
            landed,
        });
        self.position = self
            .layout
            .iter()
            .position(|&(stream, frame)| stream == VIDEO_STREAM && frame == landed)
            .unwrap_or(self.layout.len());
        Ok(())
    }

    fn open_bitstream_filter(
        &mut self,
        _stream_index: usize,
        _filter_name: &str,
    ) -> Result<Box<dyn BitstreamNormalizer>, FrameWindowError> {
        if self.clip.splitting_normalizer {
            Ok(Box::new(Splitter::default()))
        } else {
            Ok(Box::new(Passthrough::default()))
        }
    }
}

/// Normaliser that returns packets unchanged.
#[derive(Default)]
pub struct Passthrough {
    queued: VecDeque<Packet>,
}

impl BitstreamNormalizer for Passthrough {
    fn send(&mut self, packet: Packet) -> Result<(), FrameWindowError> {
        self.queued.push_back(packet);
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Packet>, FrameWindowError> {
        Ok(self.queued.pop_front())
    }
}

/// Normaliser that cuts every packet's payload in two, the way a filter
/// emits one packet per NAL unit.
#[derive(Default)]
pub struct Splitter {
    queued: VecDeque<Packet>,
}

impl BitstreamNormalizer for Splitter {
    fn send(&mut self, packet: Packet) -> Result<(), FrameWindowError> {
        let data = packet.data().unwrap_or(&[]);
        let (head, tail) = data.split_at(data.len() / 2);
        for part in [head, tail] {
            let mut piece = Packet::copy(part);
            piece.set_stream(packet.stream());
            piece.set_pts(packet.pts());
            piece.set_dts(packet.dts());
            piece.set_duration(packet.duration());
            piece.set_flags(packet.flags());
            self.queued.push_back(piece);
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Packet>, FrameWindowError> {
        Ok(self.queued.pop_front())
    }
}

/// What a [`RecordingDecoder`] saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    Notify { filename: PathBuf, frame: i64, count: i64 },
    Packet { frame: i64, key: bool, size: usize },
    Flush,
}

/// Factory for [`RecordingDecoder`]s sharing one event log.
#[derive(Debug, Default, Clone)]
pub struct RecordingFactory {
    pub events: Arc<Mutex<Vec<DecoderEvent>>>,
    pub creations: Arc<AtomicUsize>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DecoderEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn notified_files(&self) -> Vec<PathBuf> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DecoderEvent::Notify { filename, .. } => Some(filename),
                _ => None,
            })
            .collect()
    }

    pub fn packet_frames(&self) -> Vec<i64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DecoderEvent::Packet { frame, .. } => Some(frame),
                _ => None,
            })
            .collect()
    }

    /// Frame and payload size of every submitted packet.
    pub fn packet_sizes(&self) -> Vec<(i64, usize)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DecoderEvent::Packet { frame, size, .. } => Some((frame, size)),
                _ => None,
            })
            .collect()
    }

    pub fn creation_count(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

impl DecoderFactory for RecordingFactory {
    fn create(
        &self,
        _stream: &StreamProperties,
        _parameters: Option<ffmpeg_next::codec::Parameters>,
    ) -> Result<DecoderBoundary, FrameWindowError> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        let (finished, delivered) = crossbeam_channel::unbounded();
        Ok(DecoderBoundary {
            decoder: Box::new(RecordingDecoder {
                events: Arc::clone(&self.events),
                timing: None,
                window: None,
                finished,
            }),
            delivery: Arc::new(RecordingDelivery { delivered }),
        })
    }
}

/// Logs every call and reports each window as fully decoded on flush.
pub struct RecordingDecoder {
    events: Arc<Mutex<Vec<DecoderEvent>>>,
    timing: Option<StreamTiming>,
    window: Option<(i64, usize)>,
    finished: Sender<(i64, usize)>,
}

impl FrameDecoder for RecordingDecoder {
    fn notify(
        &mut self,
        request: &FrameRequest,
        timing: StreamTiming,
    ) -> Result<(), FrameWindowError> {
        self.timing = Some(timing);
        self.window = Some((request.frame, request.delivered_frames()));
        self.events.lock().unwrap().push(DecoderEvent::Notify {
            filename: request.filename.clone(),
            frame: request.frame,
            count: request.count,
        });
        Ok(())
    }

    fn submit(&mut self, packet: Option<&Packet>) -> Result<(), FrameWindowError> {
        match packet {
            Some(packet) => {
                let timing = self.timing.unwrap();
                let frame = rescale(packet.pts().unwrap(), timing.stream_base, timing.frame_base);
                self.events.lock().unwrap().push(DecoderEvent::Packet {
                    frame,
                    key: packet.is_key(),
                    size: packet.size(),
                });
            }
            None => {
                self.events.lock().unwrap().push(DecoderEvent::Flush);
                if let Some(window) = self.window.take() {
                    let _ = self.finished.send(window);
                }
            }
        }
        Ok(())
    }
}

pub struct RecordingDelivery {
    delivered: Receiver<(i64, usize)>,
}

impl FrameDelivery for RecordingDelivery {
    fn deliver(&self, sequence: &mut SequenceResult) -> Result<(), FrameWindowError> {
        let (first_frame, frames) = self
            .delivered
            .recv()
            .map_err(|_| FrameWindowError::ReaderStopped("recording decoder dropped".to_string()))?;
        if frames != sequence.count() {
            return Err(FrameWindowError::IncompleteSequence {
                expected: sequence.count(),
                received: frames,
            });
        }
        sequence.reset();
        let blank = vec![first_frame as u8; sequence.frame_len()];
        for _ in 0..frames {
            sequence.push_frame(&blank)?;
        }
        sequence.first_frame = first_frame;
        Ok(())
    }
}
