use crate::matching::types::{FrameRange, MatchEvent};

/// Collapse ordered match events into contiguous frame ranges
///
/// An event extends the open range only when its frame index is exactly one
/// past the range's end. Output order follows input order.
pub fn group_matches(matches: &[MatchEvent]) -> Vec<FrameRange> {
    let Some(first) = matches.first() else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    let mut open = FrameRange {
        start_frame: first.frame_index,
        end_frame: first.frame_index,
        start_time: first.timestamp,
        end_time: first.timestamp,
    };

    for event in &matches[1..] {
        if open.end_frame.checked_add(1) == Some(event.frame_index) {
            open.end_frame = event.frame_index;
            open.end_time = event.timestamp;
        } else {
            ranges.push(open);
            open = FrameRange {
                start_frame: event.frame_index,
                end_frame: event.frame_index,
                start_time: event.timestamp,
                end_time: event.timestamp,
            };
        }
    }

    ranges.push(open);
    ranges
}
