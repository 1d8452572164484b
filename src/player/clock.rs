//! Playback clock and timestamp smoothing

use std::time::Instant;

/// Wall-clock-to-media-time anchor.
///
/// The clock starts unanchored; the scheduler anchors it to the first
/// frame's presentation time, which makes that frame time zero of the play
/// session. The anchor is immutable until the next `reset()`.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    anchor: Option<(Instant, i64)>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        PlaybackClock { anchor: None }
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    /// Anchor media time `pts_ms` to the wall-clock instant `now`
    pub fn anchor(&mut self, pts_ms: i64, now: Instant) {
        if self.anchor.is_none() {
            self.anchor = Some((now, pts_ms));
        }
    }

    /// Media time corresponding to wall-clock `now`, or None if unanchored.
    ///
    /// Pure function of the anchor: calling it repeatedly with the same
    /// `now` always yields the same target.
    pub fn target_ms(&self, now: Instant) -> Option<i64> {
        self.anchor.map(|(wall, media)| {
            media + now.saturating_duration_since(wall).as_millis() as i64
        })
    }

    /// Forget the anchor; the next frame re-establishes time zero
    pub fn reset(&mut self) {
        self.anchor = None;
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamps frame-to-frame timestamp deltas to suppress decoder jitter.
///
/// Each raw delta is limited to `[nominal/2, nominal*2]` before being added
/// to the running smoothed timestamp. Out-of-order raw timestamps therefore
/// still advance the smoothed clock, just slowly.
#[derive(Debug, Clone, Copy)]
pub struct PtsSmoother {
    nominal_ms: i64,
    last_raw_ms: i64,
    smoothed_ms: i64,
    valid: bool,
}

impl PtsSmoother {
    pub fn new(nominal_ms: i64) -> Self {
        PtsSmoother {
            nominal_ms: nominal_ms.max(1),
            last_raw_ms: 0,
            smoothed_ms: 0,
            valid: false,
        }
    }

    /// Feed one raw timestamp and get the smoothed presentation time
    pub fn smooth(&mut self, raw_ms: i64) -> i64 {
        if !self.valid {
            self.last_raw_ms = raw_ms;
            self.smoothed_ms = raw_ms;
            self.valid = true;
            return raw_ms;
        }

        let delta = (raw_ms - self.last_raw_ms).clamp(self.nominal_ms / 2, self.nominal_ms * 2);
        self.last_raw_ms = raw_ms;
        self.smoothed_ms += delta;
        self.smoothed_ms
    }

    pub fn reset(&mut self) {
        self.valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_unanchored_has_no_target() {
        let clock = PlaybackClock::new();
        assert_eq!(clock.target_ms(Instant::now()), None);
    }

    #[test]
    fn test_clock_anchor_establishes_time_zero() {
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        clock.anchor(500, t0);
        assert_eq!(clock.target_ms(t0), Some(500));
        assert_eq!(clock.target_ms(t0 + Duration::from_millis(250)), Some(750));
    }

    #[test]
    fn test_clock_anchor_is_sticky_until_reset() {
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        clock.anchor(0, t0);
        clock.anchor(1000, t0 + Duration::from_secs(5));
        assert_eq!(clock.target_ms(t0), Some(0));

        clock.reset();
        assert!(!clock.is_anchored());
        clock.anchor(1000, t0);
        assert_eq!(clock.target_ms(t0), Some(1000));
    }

    #[test]
    fn test_target_is_idempotent_for_same_instant() {
        let mut clock = PlaybackClock::new();
        let t0 = Instant::now();
        clock.anchor(42, t0);
        let later = t0 + Duration::from_millis(333);
        assert_eq!(clock.target_ms(later), clock.target_ms(later));
    }

    #[test]
    fn test_smoother_passes_first_timestamp_through() {
        let mut s = PtsSmoother::new(40);
        assert_eq!(s.smooth(1234), 1234);
    }

    #[test]
    fn test_smoother_clamps_deltas_both_ways() {
        let mut s = PtsSmoother::new(100);
        assert_eq!(s.smooth(0), 0);
        // Huge forward jump clamped to nominal*2
        assert_eq!(s.smooth(100_000), 200);
        // Backwards jump clamped to nominal/2
        assert_eq!(s.smooth(0), 250);
        // Exact nominal step passes through
        assert_eq!(s.smooth(100), 350);
    }

    #[test]
    fn test_smoothed_delta_always_within_bounds() {
        let mut s = PtsSmoother::new(40);
        let mut prev = s.smooth(0);
        for raw in [-500i64, 7, 7, 100_000, 3, -3, 40, 80] {
            let out = s.smooth(raw);
            let delta = out - prev;
            assert!((20..=80).contains(&delta), "delta {} out of bounds", delta);
            prev = out;
        }
    }

    #[test]
    fn test_smoother_reset_reseeds() {
        let mut s = PtsSmoother::new(40);
        s.smooth(0);
        s.smooth(40);
        s.reset();
        assert_eq!(s.smooth(9000), 9000);
    }
}
