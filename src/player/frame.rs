//! Presentable frame value produced by the decode worker

use crate::graphics::EncodedFrame;

/// One decoded, encoded, timestamped frame.
///
/// Immutable once constructed; ownership moves from the decode worker into
/// the queue and out again when the scheduler paints it.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// Terminal-ready escape text plus its cell footprint
    pub rendered: EncodedFrame,
    /// Smoothed presentation time in milliseconds of media time
    pub pts_ms: i64,
}

impl FrameRecord {
    pub fn new(rendered: EncodedFrame, pts_ms: i64) -> Self {
        FrameRecord { rendered, pts_ms }
    }
}
