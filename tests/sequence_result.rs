//! Caller-owned sequence buffers and the decoder startup barrier.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use framewindow::{FrameWindowError, SequenceResult, StartupBarrier};

#[test]
fn frames_are_packed_back_to_back() {
    let mut sequence = SequenceResult::new(2, 2, 3);
    assert_eq!(sequence.frame_len(), 18);
    assert_eq!(sequence.as_bytes().len(), 36);

    sequence.push_frame(&[1; 18]).unwrap();
    sequence.push_frame(&[2; 18]).unwrap();

    assert!(sequence.is_complete());
    assert_eq!(sequence.frame(1), Some(&[2_u8; 18][..]));
    assert_eq!(sequence.as_bytes()[17], 1);
    assert_eq!(sequence.as_bytes()[18], 2);
}

#[test]
fn wrong_sized_or_extra_frames_are_rejected() {
    let mut sequence = SequenceResult::new(1, 2, 2);
    assert!(matches!(
        sequence.push_frame(&[0; 5]),
        Err(FrameWindowError::Decode(_))
    ));
    sequence.push_frame(&[0; 12]).unwrap();
    assert!(sequence.push_frame(&[0; 12]).is_err());
}

#[test]
fn reset_allows_reuse() {
    let mut sequence = SequenceResult::new(1, 1, 1);
    sequence.push_frame(&[9, 9, 9]).unwrap();
    sequence.reset();
    assert_eq!(sequence.filled(), 0);
    assert!(sequence.frame(0).is_none());
    sequence.push_frame(&[1, 2, 3]).unwrap();
    assert_eq!(sequence.frame(0), Some(&[1, 2, 3][..]));
}

#[test]
fn frame_image_has_sequence_dimensions() {
    let mut sequence = SequenceResult::new(1, 2, 4);
    sequence.push_frame(&[128; 24]).unwrap();
    let image = sequence.frame_image(0).unwrap();
    assert_eq!(image.dimensions(), (4, 2));
    assert_eq!(image.get_pixel(3, 1).0, [128, 128, 128]);
}

#[test]
fn save_frame_writes_an_image() {
    let dir = tempfile::tempdir().unwrap();
    let mut sequence = SequenceResult::new(1, 2, 2);
    sequence.push_frame(&[10; 12]).unwrap();

    let path = dir.path().join("frame.png");
    sequence.save_frame(0, &path).unwrap();
    assert!(path.exists());
    assert!(sequence.save_frame(1, dir.path().join("missing.png")).is_err());
}

#[test]
fn barrier_times_out_when_nothing_is_published() {
    let barrier: StartupBarrier<u32> = StartupBarrier::new();
    let started = Instant::now();
    match barrier.wait(Duration::from_millis(30)) {
        Err(FrameWindowError::DecoderStartupTimeout(timeout)) => {
            assert_eq!(timeout, Duration::from_millis(30));
        }
        other => panic!("Expected DecoderStartupTimeout, got: {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[test]
fn barrier_wakes_waiters_on_publish() {
    let barrier = Arc::new(StartupBarrier::new());
    let waiter = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || barrier.wait(Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(20));
    barrier.publish(42_u32);

    assert_eq!(waiter.join().unwrap().unwrap(), 42);
    assert_eq!(barrier.get(), Some(42));
}

#[test]
fn barrier_failure_releases_waiters() {
    let barrier: Arc<StartupBarrier<u32>> = Arc::new(StartupBarrier::new());
    let waiter = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || barrier.wait(Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(20));
    barrier.fail("first file is unreadable".to_string());

    match waiter.join().unwrap() {
        Err(FrameWindowError::ReaderStopped(reason)) => {
            assert_eq!(reason, "first file is unreadable");
        }
        other => panic!("Expected ReaderStopped, got: {other:?}"),
    }
}

#[test]
fn first_publish_wins() {
    let barrier = StartupBarrier::new();
    barrier.publish(1_u32);
    barrier.publish(2);
    barrier.fail("late".to_string());
    assert_eq!(barrier.wait(Duration::ZERO).unwrap(), 1);
}
