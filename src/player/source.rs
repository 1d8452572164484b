//! Media source abstraction consumed by the decode worker

use anyhow::Result;

/// One decoded, color-converted picture ready for terminal encoding
#[derive(Debug, Clone)]
pub struct Picture {
    /// Packed or padded pixel rows
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Row pitch in bytes (≥ width * channels)
    pub stride: usize,
    /// 3 (RGB) or 4 (RGBA)
    pub channels: u8,
    /// Native presentation time rescaled to milliseconds, if the container
    /// carried one
    pub pts_ms: Option<i64>,
}

/// A decodable video stream.
///
/// Implementations own all demux/decode/color-convert state and are driven
/// from exactly one thread at a time; the worker moves the boxed source in
/// on start and hands it back on join.
pub trait MediaSource {
    /// Decode the next picture.
    ///
    /// Sources loop at end-of-stream (drain the codec, rewind, continue), so
    /// `Ok(None)` means "nothing right now, try again" rather than a final
    /// end. Errors are session-level; per-frame decode hiccups are absorbed
    /// internally.
    fn next_picture(&mut self) -> Result<Option<Picture>>;

    /// Seek back to the start of the stream
    fn rewind(&mut self) -> Result<()>;

    /// Nominal per-frame delay in milliseconds derived from the stream's
    /// frame rate
    fn nominal_delay_ms(&self) -> i64;

    /// Source pixel dimensions
    fn dimensions(&self) -> (u32, u32);
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Scripted source yielding a fixed set of uniform-color pictures at a
    /// fixed frame interval, looping like a real stream
    pub struct SyntheticSource {
        frames: Vec<Picture>,
        next: usize,
        nominal_ms: i64,
        pub looping: bool,
    }

    impl SyntheticSource {
        pub fn new(frame_count: usize, nominal_ms: i64) -> Self {
            let frames = (0..frame_count)
                .map(|i| Picture {
                    data: vec![(i * 16) as u8; 4 * 4 * 4],
                    width: 4,
                    height: 4,
                    stride: 16,
                    channels: 4,
                    pts_ms: Some(i as i64 * nominal_ms),
                })
                .collect();
            SyntheticSource {
                frames,
                next: 0,
                nominal_ms,
                looping: false,
            }
        }

        /// Same frames, but as a container that carries no timestamps
        pub fn without_timestamps(mut self) -> Self {
            for frame in &mut self.frames {
                frame.pts_ms = None;
            }
            self
        }
    }

    impl MediaSource for SyntheticSource {
        fn next_picture(&mut self) -> Result<Option<Picture>> {
            if self.next >= self.frames.len() {
                if !self.looping {
                    return Ok(None);
                }
                self.next = 0;
            }
            let pic = self.frames[self.next].clone();
            self.next += 1;
            Ok(Some(pic))
        }

        fn rewind(&mut self) -> Result<()> {
            self.next = 0;
            Ok(())
        }

        fn nominal_delay_ms(&self) -> i64 {
            self.nominal_ms
        }

        fn dimensions(&self) -> (u32, u32) {
            (4, 4)
        }
    }
}
