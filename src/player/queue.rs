//! Bounded frame queue with drop-oldest backpressure

use super::frame::FrameRecord;
use std::collections::VecDeque;

/// FIFO of frames in presentation order, bounded by capacity.
///
/// A push onto a full queue evicts the oldest entry instead of blocking, so
/// the producer can always make progress and memory stays bounded no matter
/// how far the consumer falls behind.
#[derive(Debug)]
pub struct FrameQueue {
    frames: VecDeque<FrameRecord>,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        FrameQueue {
            frames: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Append a frame, evicting the oldest entry when at capacity.
    /// Returns the evicted frame, if any.
    pub fn push(&mut self, frame: FrameRecord) -> Option<FrameRecord> {
        let evicted = if self.frames.len() >= self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    /// Remove and return the oldest frame
    pub fn pop(&mut self) -> Option<FrameRecord> {
        self.frames.pop_front()
    }

    /// Presentation time of the oldest frame without removing it
    pub fn head_pts(&self) -> Option<i64> {
        self.frames.front().map(|f| f.pts_ms)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::EncodedFrame;

    fn frame(pts_ms: i64) -> FrameRecord {
        FrameRecord::new(
            EncodedFrame {
                text: String::new(),
                cols: 1,
                rows: 1,
            },
            pts_ms,
        )
    }

    #[test]
    fn test_push_bounded_evicts_oldest() {
        let mut q = FrameQueue::new(2);
        assert!(q.push(frame(0)).is_none());
        assert!(q.push(frame(100)).is_none());

        let evicted = q.push(frame(9999));
        assert_eq!(evicted.map(|f| f.pts_ms), Some(0));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().map(|f| f.pts_ms), Some(100));
        assert_eq!(q.pop().map(|f| f.pts_ms), Some(9999));
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut q = FrameQueue::new(4);
        for pts in 0..100 {
            q.push(frame(pts * 33));
            assert!(q.len() <= 4);
        }
        // Oldest surviving entry is the 97th push
        assert_eq!(q.head_pts(), Some(96 * 33));
    }

    #[test]
    fn test_clear_and_empty() {
        let mut q = FrameQueue::new(2);
        q.push(frame(0));
        assert!(!q.is_empty());
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.head_pts(), None);
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let mut q = FrameQueue::new(0);
        q.push(frame(1));
        q.push(frame(2));
        assert_eq!(q.len(), 1);
        assert_eq!(q.head_pts(), Some(2));
    }
}
