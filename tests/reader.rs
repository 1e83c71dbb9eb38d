//! Packet forwarding and accounting of the reader loop.

mod common;

use std::sync::Arc;

use common::{ClipLayout, DecoderEvent, RecordingFactory, ScriptedOpener};
use framewindow::{
    CancellationToken, DeliverySlot, FrameRequest, OpenFileRegistry, ReaderLoop, RequestQueue,
    Stats, StatsSnapshot,
};

fn reader(
    opener: &ScriptedOpener,
    factory: &RecordingFactory,
    stats: &Arc<Stats>,
) -> ReaderLoop {
    let registry = OpenFileRegistry::new(
        Arc::new(opener.clone()),
        Box::new(factory.clone()),
        Arc::new(DeliverySlot::new()),
    );
    ReaderLoop::new(
        Arc::new(RequestQueue::new()),
        registry,
        Arc::clone(stats),
        CancellationToken::new(),
        20,
    )
}

#[test]
fn every_normalised_piece_reaches_the_decoder() {
    let clip = ClipLayout::new(20, 10)
        .with_empty_packets(&[3])
        .with_splitting_normalizer();
    let opener = ScriptedOpener::new().with_clip("clip.mp4", clip);
    let factory = RecordingFactory::new();
    let stats = Arc::new(Stats::new());
    let mut reader = reader(&opener, &factory, &stats);

    reader
        .serve_request(&FrameRequest::strided("clip.mp4", 2, 4, 1))
        .unwrap();

    // Five-byte payloads arrive as a 2 and a 3 byte piece. The empty packet
    // at frame 3 bypasses the normaliser and is submitted once.
    let expected: Vec<(i64, usize)> = (0..=10)
        .flat_map(|frame| {
            if frame == 3 {
                vec![(3, 0)]
            } else {
                vec![(frame, 2), (frame, 3)]
            }
        })
        .collect();
    assert_eq!(factory.packet_sizes(), expected);
    assert_eq!(factory.events().last(), Some(&DecoderEvent::Flush));

    // Stats count packets as read, before normalisation.
    assert_eq!(
        stats.snapshot(),
        StatsSnapshot {
            bytes_read: 50,
            packets_read: 11,
            bytes_decoded: 50,
            packets_decoded: 11,
            frames_used: 0,
        }
    );
}

#[test]
fn read_counts_include_other_streams_and_dropped_packets() {
    let clip = ClipLayout::new(60, 12)
        .with_keyframes(&[0, 8, 12, 24, 36, 48])
        .with_seek_override(10, 12)
        .with_extra_streams(1);
    let opener = ScriptedOpener::new().with_clip("clip.mp4", clip);
    let factory = RecordingFactory::new();
    let stats = Arc::new(Stats::new());
    let mut reader = reader(&opener, &factory, &stats);

    reader
        .serve_request(&FrameRequest::strided("clip.mp4", 10, 4, 1))
        .unwrap();

    // Video 8..=24 is forwarded. The overshooting key frame 12 is read and
    // dropped, and one audio packet follows each of video 8..=23 before the
    // window closes.
    assert_eq!(factory.packet_frames(), (8..=24).collect::<Vec<_>>());
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.packets_decoded, 17);
    assert_eq!(snapshot.packets_read, 17 + 16 + 1);
    assert_eq!(snapshot.bytes_decoded, 17 * 5);
    assert_eq!(snapshot.bytes_read, 34 * 5);
}
