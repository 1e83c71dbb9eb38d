//! Frame-indexed seeking.

use crate::rational::rescale;
use crate::registry::FileEntry;

/// Seek `file` backwards to a key frame at or before `frame`.
///
/// The frame index is converted to the stream time base first. Containers
/// may still land after the target; the reader detects that from the packets
/// that follow and retries with a larger offset. A failing seek is only
/// logged, since the packet walk that follows reveals where reading resumed.
pub fn seek_to_frame(file: &mut FileEntry, frame: i64) {
    let timestamp = rescale(frame, file.frame_base, file.stream_base);
    log::debug!(
        "Seeking {} to frame {frame} (timestamp {timestamp})",
        file.path.display()
    );
    if let Err(error) = file.container.seek(file.stream_index, timestamp) {
        log::warn!(
            "Unable to seek {} to timestamp {timestamp}: {error}",
            file.path.display()
        );
    }
}
