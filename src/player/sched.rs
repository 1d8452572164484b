//! Presentation scheduler - the consumer half of the playback pipeline
//!
//! Runs as discrete ticks on the main thread. Each tick decides which
//! queued frame is "now" against the playback clock, paints it, and
//! computes the delay until the next tick. The caller feeds that delay
//! into its event-loop timeout, which is what re-arms the scheduler.

use super::frame::FrameRecord;
use super::{RenderLayout, Shared};
use crate::render::TermSink;
use anyhow::Result;
use log::trace;
use std::time::{Duration, Instant};

/// Frames later than this many nominal delays past the target are painted
/// anyway (freshest wins) but flagged as beyond tolerance
pub(super) const CATCHUP_TOLERANCE_FACTOR: i64 = 2;

/// Lower clamp for the catch-up tolerance window
pub(super) const MIN_CATCHUP_TOLERANCE_MS: i64 = 20;

/// Minimum re-arm delay when the next frame's deadline is known
const MIN_HEAD_DELAY_MS: u64 = 1;

/// Minimum re-arm delay when the queue is empty
const MIN_FALLBACK_DELAY_MS: u64 = 5;

/// Result of one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct TickOutcome {
    /// Presentation time of the frame painted this tick, if any
    pub painted_pts_ms: Option<i64>,
    /// Delay until the next tick should fire
    pub next_delay: Duration,
}

/// Run one scheduler tick at wall-clock `now`.
///
/// Never blocks: either paints the best due frame or no-ops, and always
/// produces a re-arm delay.
pub(super) fn tick(
    shared: &Shared,
    sink: &mut dyn TermSink,
    now: Instant,
    nominal_ms: i64,
) -> Result<TickOutcome> {
    let anchored = shared.state.lock().clock.is_anchored();

    let (candidate, target_ms) = if anchored {
        // The target is a pure function of the anchor; reading it twice in
        // one tick yields the same value
        let target = match shared.state.lock().clock.target_ms(now) {
            Some(t) => t,
            None => return Ok(idle_outcome(nominal_ms)),
        };

        // Pop every frame that is already due, keeping only the freshest;
        // the head that is not yet due stays put
        let mut best: Option<FrameRecord> = None;
        {
            let mut q = shared.queue.lock();
            while q.queue.head_pts().is_some_and(|pts| pts <= target) {
                best = q.queue.pop();
            }
        }
        (best, target)
    } else {
        // First frame anchors the clock: its presentation time becomes the
        // media time of "now"
        let first = shared.queue.lock().queue.pop();
        match first {
            Some(frame) => {
                let mut st = shared.state.lock();
                st.clock.anchor(frame.pts_ms, now);
                let pts = frame.pts_ms;
                (Some(frame), pts)
            }
            None => return Ok(idle_outcome(nominal_ms)),
        }
    };

    let frame = match candidate {
        Some(f) => f,
        None => {
            // Head (if any) is not due yet; wake when it is
            let delay = next_delay(shared, target_ms, nominal_ms);
            return Ok(TickOutcome {
                painted_pts_ms: None,
                next_delay: delay,
            });
        }
    };

    let tolerance = (nominal_ms * CATCHUP_TOLERANCE_FACTOR).max(MIN_CATCHUP_TOLERANCE_MS);
    if target_ms - frame.pts_ms > tolerance {
        trace!(
            "painting frame {}ms beyond tolerance",
            target_ms - frame.pts_ms - tolerance
        );
    }

    // Paint against a copy of the layout so no lock is held across sink
    // I/O; only the painter-derived fields are written back
    let mut layout = shared.state.lock().layout;
    paint(sink, &mut layout, &frame)?;
    shared.state.lock().layout.adopt_derived(&layout);

    let delay = next_delay(shared, target_ms, nominal_ms);
    Ok(TickOutcome {
        painted_pts_ms: Some(frame.pts_ms),
        next_delay: delay,
    })
}

fn idle_outcome(nominal_ms: i64) -> TickOutcome {
    TickOutcome {
        painted_pts_ms: None,
        next_delay: fallback_delay(nominal_ms),
    }
}

fn fallback_delay(nominal_ms: i64) -> Duration {
    Duration::from_millis((nominal_ms.max(0) as u64).max(MIN_FALLBACK_DELAY_MS))
}

/// Delay until the queue head is due, or the nominal delay if the queue is
/// empty
fn next_delay(shared: &Shared, target_ms: i64, nominal_ms: i64) -> Duration {
    match shared.queue.lock().queue.head_pts() {
        Some(head) => {
            let until = (head - target_ms).max(MIN_HEAD_DELAY_MS as i64);
            Duration::from_millis(until as u64)
        }
        None => fallback_delay(nominal_ms),
    }
}

/// Paint one frame into the render area.
///
/// Horizontal placement centers the frame in the terminal; vertical
/// placement is locked to the first frame's row so frames of slightly
/// different decoded heights do not jitter. Rows painted last time that the
/// new frame no longer covers are cleared explicitly, which avoids
/// full-screen clears on every tick.
pub(super) fn paint(
    sink: &mut dyn TermSink,
    layout: &mut RenderLayout,
    frame: &FrameRecord,
) -> Result<()> {
    let cols = frame.rendered.cols;
    let rows = frame.rendered.rows;

    let col = layout.term_w.saturating_sub(cols) / 2;
    if !layout.fixed_valid {
        layout.fixed_top_row =
            layout.area_top_row + layout.area_height.saturating_sub(rows) / 2;
        layout.fixed_valid = true;
    }
    let top = layout.fixed_top_row;

    if layout.last_height > 0 {
        let stale_end = layout.last_top_row.saturating_add(layout.last_height);
        for row in layout.last_top_row..stale_end {
            if row < top || row >= top.saturating_add(rows) {
                sink.move_cursor(0, row)?;
                sink.clear_line()?;
            }
        }
    }

    if frame.rendered.text.contains('\n') {
        // Row-per-line backend (half blocks): position each row
        for (i, line) in frame.rendered.text.split('\n').enumerate() {
            sink.move_cursor(col, top.saturating_add(i as u16))?;
            sink.write_text(line)?;
        }
    } else {
        // Single-blob backend (kitty/sixel): the terminal places the image
        // from the top-left cell
        sink.move_cursor(col, top)?;
        sink.write_text(&frame.rendered.text)?;
    }

    layout.last_top_row = top;
    layout.last_height = rows;
    sink.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::EncodedFrame;
    use crate::render::testing::{RecordingSink, SinkOp};

    fn frame(pts_ms: i64, cols: u16, rows: u16) -> FrameRecord {
        FrameRecord::new(
            EncodedFrame {
                text: vec!["x"; rows as usize].join("\n"),
                cols,
                rows,
            },
            pts_ms,
        )
    }

    fn layout() -> RenderLayout {
        RenderLayout {
            term_w: 80,
            term_h: 24,
            area_top_row: 2,
            area_height: 20,
            max_px_w: 800,
            max_px_h: 400,
            valid: true,
            last_top_row: 0,
            last_height: 0,
            fixed_top_row: 0,
            fixed_valid: false,
        }
    }

    #[test]
    fn test_paint_centers_and_locks_top_row() {
        let mut sink = RecordingSink::default();
        let mut lay = layout();

        paint(&mut sink, &mut lay, &frame(0, 40, 10)).unwrap();
        // Centered: col (80-40)/2 = 20, top 2 + (20-10)/2 = 7
        assert_eq!(sink.ops[0], SinkOp::MoveCursor(20, 7));
        assert!(lay.fixed_valid);

        // A slightly shorter frame keeps the same top row
        let mut sink = RecordingSink::default();
        paint(&mut sink, &mut lay, &frame(40, 40, 9)).unwrap();
        assert!(sink.ops.contains(&SinkOp::MoveCursor(20, 7)));
        assert_eq!(lay.fixed_top_row, 7);
    }

    #[test]
    fn test_paint_clears_stale_rows() {
        let mut sink = RecordingSink::default();
        let mut lay = layout();
        paint(&mut sink, &mut lay, &frame(0, 40, 10)).unwrap();

        // Next frame is two rows shorter: rows 15 and 16 become stale
        let mut sink = RecordingSink::default();
        paint(&mut sink, &mut lay, &frame(40, 40, 8)).unwrap();
        let clears = sink
            .ops
            .iter()
            .filter(|op| **op == SinkOp::ClearLine)
            .count();
        assert_eq!(clears, 2);
        assert_eq!(lay.last_height, 8);
    }

    #[test]
    fn test_paint_flushes_once() {
        let mut sink = RecordingSink::default();
        let mut lay = layout();
        paint(&mut sink, &mut lay, &frame(0, 10, 4)).unwrap();
        let flushes = sink.ops.iter().filter(|op| **op == SinkOp::Flush).count();
        assert_eq!(flushes, 1);
        assert_eq!(sink.ops.last(), Some(&SinkOp::Flush));
    }
}
