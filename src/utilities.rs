//! Internal utility functions.

use ffmpeg_next::{Packet, frame::Video as VideoFrame};

use crate::decoder::StreamTiming;
use crate::rational::rescale;

/// Copy the first plane of a packed video frame into `buffer`, dropping row
/// padding.
///
/// `bytes_per_pixel` is the number of bytes per pixel of the frame's format
/// (3 for RGB24).
pub fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
    buffer: &mut Vec<u8>,
) {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    buffer.clear();
    if stride == expected_stride {
        buffer.extend_from_slice(&data[..expected_stride * (height as usize)]);
    } else {
        buffer.reserve(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
    }
}

/// Frame index of a timestamp in the stream time base.
pub fn timestamp_to_frame(timestamp: i64, timing: StreamTiming) -> i64 {
    rescale(timestamp, timing.stream_base, timing.frame_base)
}

/// Best available timestamp of a packet: presentation, else decoding.
pub fn packet_timestamp(packet: &Packet) -> Option<i64> {
    packet.pts().or_else(|| packet.dts())
}
