//! Decode worker thread - the producer half of the playback pipeline

use super::clock::PtsSmoother;
use super::frame::FrameRecord;
use super::source::MediaSource;
use super::Shared;
use log::{debug, trace};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A frame already late by more than this many nominal delays is discarded
/// before encoding; the scheduler catches up by skipping, never by rushing
pub(super) const LATE_DROP_FACTOR: i64 = 3;

/// Worker backoff when the source has nothing to hand out yet
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Start the decode worker.
///
/// The worker owns the source exclusively until it observes the stop flag,
/// then hands it back through the join handle. The stop flag is polled once
/// per iteration, so a join blocks for at most one decode+encode step.
pub(super) fn spawn(
    source: Box<dyn MediaSource + Send>,
    shared: Arc<Shared>,
    nominal_ms: i64,
) -> io::Result<JoinHandle<Box<dyn MediaSource + Send>>> {
    thread::Builder::new()
        .name("video-decode".into())
        .spawn(move || run(source, shared, nominal_ms))
}

fn run(
    mut source: Box<dyn MediaSource + Send>,
    shared: Arc<Shared>,
    nominal_ms: i64,
) -> Box<dyn MediaSource + Send> {
    let mut smoother = PtsSmoother::new(nominal_ms);
    let mut fallback_pts_ms = 0i64;

    loop {
        if shared.queue.lock().stop {
            break;
        }

        let picture = match source.next_picture() {
            Ok(Some(p)) => p,
            Ok(None) => {
                thread::sleep(IDLE_SLEEP);
                continue;
            }
            Err(e) => {
                // Best-effort: a bad packet or frame never stops playback
                trace!("decode step skipped: {}", e);
                thread::sleep(IDLE_SLEEP);
                continue;
            }
        };

        let raw_ms = match picture.pts_ms {
            Some(ms) => {
                fallback_pts_ms = ms;
                ms
            }
            None => {
                fallback_pts_ms += nominal_ms;
                fallback_pts_ms
            }
        };
        let pts_ms = smoother.smooth(raw_ms);

        let (target_ms, max_px) = {
            let st = shared.state.lock();
            let max = if st.layout.valid {
                Some((st.layout.max_px_w, st.layout.max_px_h))
            } else {
                None
            };
            (st.clock.target_ms(Instant::now()), max)
        };

        // Already hopelessly late and the consumer has something newer
        // coming: skip before paying for the encode
        if let Some(target) = target_ms {
            let queued = shared.queue.lock().queue.len();
            if queued > 1 && target - pts_ms > LATE_DROP_FACTOR * nominal_ms {
                trace!("dropping late frame pts={} target={}", pts_ms, target);
                continue;
            }
        }

        let (max_w, max_h) = max_px.unwrap_or((picture.width, picture.height));
        let encoded = {
            let mut encoder = shared.render.lock();
            match encoder.encode(
                &picture.data,
                picture.width,
                picture.height,
                picture.stride,
                picture.channels,
                max_w,
                max_h,
            ) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("frame encode skipped: {}", e);
                    continue;
                }
            }
        };

        shared
            .queue
            .lock()
            .queue
            .push(FrameRecord::new(encoded, pts_ms));
    }

    source
}

#[cfg(test)]
mod tests {
    use super::super::source::testing::SyntheticSource;
    use super::super::RenderLayout;
    use super::*;
    use crate::graphics::{EncodedFrame, FrameEncoder, GraphicsBackend};
    use crate::terminal::TerminalGeometry;

    fn test_shared() -> Arc<Shared> {
        let geom = TerminalGeometry::with_cell_size(80, 24, 10, 20);
        let encoder = FrameEncoder::new(GraphicsBackend::Blocks, &geom, false);
        let shared = Arc::new(Shared::new(encoder, 8));
        shared.state.lock().layout = RenderLayout {
            term_w: 80,
            term_h: 24,
            area_top_row: 1,
            area_height: 22,
            max_px_w: 800,
            max_px_h: 440,
            valid: true,
            ..RenderLayout::default()
        };
        shared
    }

    fn sentinel(pts_ms: i64) -> FrameRecord {
        FrameRecord::new(
            EncodedFrame {
                text: String::from("s"),
                cols: 1,
                rows: 1,
            },
            pts_ms,
        )
    }

    fn stop_and_join(shared: &Shared, handle: JoinHandle<Box<dyn MediaSource + Send>>) {
        shared.queue.lock().stop = true;
        handle.join().unwrap();
    }

    fn wait_for_queue_len(shared: &Shared, len: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while shared.queue.lock().queue.len() < len && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_worker_drops_stale_frames_before_encoding() {
        let shared = test_shared();
        {
            let mut q = shared.queue.lock();
            q.queue.push(sentinel(9_000));
            q.queue.push(sentinel(9_100));
        }
        // Anchoring far in the past makes every decoded frame more than
        // 3 nominal delays behind the target
        shared
            .state
            .lock()
            .clock
            .anchor(0, Instant::now() - Duration::from_secs(10));

        let handle = spawn(
            Box::new(SyntheticSource::new(3, 100)),
            Arc::clone(&shared),
            100,
        )
        .unwrap();
        thread::sleep(Duration::from_millis(50));
        stop_and_join(&shared, handle);

        // With newer frames already queued, none of the stale decodes
        // reached the queue
        let mut q = shared.queue.lock();
        assert_eq!(q.queue.len(), 2);
        assert_eq!(q.queue.pop().map(|f| f.pts_ms), Some(9_000));
        assert_eq!(q.queue.pop().map(|f| f.pts_ms), Some(9_100));
    }

    #[test]
    fn test_worker_keeps_late_frame_when_queue_is_nearly_empty() {
        let shared = test_shared();
        shared
            .state
            .lock()
            .clock
            .anchor(0, Instant::now() - Duration::from_secs(10));

        // Same staleness, but an empty queue: the frame is the best the
        // consumer will get, so it is encoded anyway
        let handle = spawn(
            Box::new(SyntheticSource::new(1, 100)),
            Arc::clone(&shared),
            100,
        )
        .unwrap();
        wait_for_queue_len(&shared, 1);
        stop_and_join(&shared, handle);

        assert_eq!(shared.queue.lock().queue.len(), 1);
    }

    #[test]
    fn test_worker_synthesizes_monotonic_timestamps() {
        let shared = test_shared();
        let source = SyntheticSource::new(3, 100).without_timestamps();

        let handle = spawn(Box::new(source), Arc::clone(&shared), 100).unwrap();
        wait_for_queue_len(&shared, 3);
        stop_and_join(&shared, handle);

        let mut pts = Vec::new();
        {
            let mut q = shared.queue.lock();
            while let Some(frame) = q.queue.pop() {
                pts.push(frame.pts_ms);
            }
        }
        // Timestampless frames advance by exactly one nominal delay each
        assert_eq!(pts, vec![100, 200, 300]);
    }
}
