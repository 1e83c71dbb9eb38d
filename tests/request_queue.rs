//! Frame requests and the reader's queue.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use framewindow::{FrameRequest, RequestQueue};

#[test]
fn strided_request_spans_expanded_window() {
    let request = FrameRequest::strided("a.mp4", 12, 4, 3);
    assert_eq!(request.frame, 12);
    assert_eq!(request.count, 10);
    assert_eq!(request.stride, 3);
    assert_eq!(request.delivered_frames(), 4);
}

#[test]
fn unit_stride_is_contiguous() {
    let request = FrameRequest::strided("a.mp4", 0, 16, 1);
    assert_eq!(request.count, 16);
    assert_eq!(request.delivered_frames(), 16);
}

#[test]
fn pops_in_submission_order() {
    let queue = RequestQueue::new();
    queue.push(FrameRequest::strided("a.mp4", 0, 1, 1));
    queue.push(FrameRequest::strided("b.mp4", 5, 1, 1));
    queue.push(FrameRequest::strided("a.mp4", 9, 1, 1));
    assert_eq!(queue.len(), 3);

    let order: Vec<_> = (0..3)
        .map(|_| {
            let request = queue.pop().unwrap();
            (request.filename.display().to_string(), request.frame)
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("a.mp4".to_string(), 0),
            ("b.mp4".to_string(), 5),
            ("a.mp4".to_string(), 9),
        ]
    );
    assert!(queue.is_empty());
}

#[test]
fn pop_blocks_until_a_push() {
    let queue = Arc::new(RequestQueue::new());
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(Duration::from_millis(20));
    queue.push(FrameRequest::strided("late.mp4", 1, 1, 1));

    let request = consumer.join().unwrap().unwrap();
    assert_eq!(request.frame, 1);
}

#[test]
fn close_wakes_a_blocked_pop() {
    let queue = Arc::new(RequestQueue::new());
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(Duration::from_millis(20));
    queue.close();

    assert!(consumer.join().unwrap().is_none());
    assert!(queue.is_closed());
}

#[test]
fn closed_queue_returns_none_even_with_pending_requests() {
    let queue = RequestQueue::new();
    queue.push(FrameRequest::strided("a.mp4", 0, 1, 1));
    queue.close();
    assert!(queue.pop().is_none());
}

#[test]
fn concurrent_producers_lose_nothing() {
    let queue = Arc::new(RequestQueue::new());
    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for frame in 0..25 {
                    queue.push(FrameRequest::strided(format!("{producer}.mp4"), frame, 1, 1));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    assert_eq!(queue.len(), 100);
}
