//! Scroll speed, adaptive acceleration, and momentum
//!
//! Scrolling has two phases. While the gesture is held, fingertip
//! spread sets the speed and an adaptive multiplier rewards sustained
//! scrolling. When the gesture ends, the last emission keeps coasting
//! as momentum that shrinks a little each tick, with faster flicks
//! coasting longer.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::interp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollTuning {
    /// Fingertip spread in pixels mapped to the slowest speed.
    pub min_span_px: f32,
    /// Fingertip spread in pixels mapped to the fastest speed.
    pub max_span_px: f32,
    /// Speed range in wheel clicks per emission.
    pub min_speed: f32,
    pub max_speed: f32,
    /// Momentum decay per tick at the slow end of the speed range.
    pub base_decay: f32,
    /// Decay eases toward this slower factor as speed nears its ceiling.
    pub fast_decay: f32,
    /// Momentum magnitude below which scrolling snaps to rest.
    pub rest_threshold: f32,
    /// Minimum wall-clock gap between fresh gesture emissions.
    pub cooldown: Duration,
    /// Maximum gap between gesture ticks that still counts as one
    /// continuous scroll for the adaptive multiplier.
    pub continuity_window: Duration,
    /// Per-tick growth factor of the adaptive multiplier.
    pub accel_step: f32,
    pub accel_ceiling: f32,
}

impl Default for ScrollTuning {
    fn default() -> Self {
        Self {
            min_span_px: 30.0,
            max_span_px: 200.0,
            min_speed: 1.0,
            max_speed: 20.0,
            base_decay: 0.95,
            fast_decay: 0.98,
            rest_threshold: 0.1,
            cooldown: Duration::from_millis(50),
            continuity_window: Duration::from_millis(500),
            accel_step: 1.01,
            accel_ceiling: 1.5,
        }
    }
}

/// Per-mode scroll state. Reset whenever the committed mode changes so
/// momentum from an old session cannot leak into a new one.
#[derive(Debug)]
pub struct ScrollEngine {
    tuning: ScrollTuning,
    /// Signed wheel clicks still in flight.
    momentum: f32,
    /// Sustained-scrolling multiplier in `[1, accel_ceiling]`.
    adaptive: f32,
    /// Unsigned speed of the last fresh emission; eases the decay rate.
    last_speed: f32,
    last_gesture_at: Option<Instant>,
    last_emit_at: Option<Instant>,
}

impl ScrollEngine {
    pub fn new(tuning: ScrollTuning) -> Self {
        Self {
            tuning,
            momentum: 0.0,
            adaptive: 1.0,
            last_speed: 0.0,
            last_gesture_at: None,
            last_emit_at: None,
        }
    }

    /// One tick with a scroll gesture held. Returns the wheel clicks to
    /// emit this tick, if any.
    ///
    /// Fresh emissions are rate limited by the cooldown; on gated ticks
    /// the existing momentum coasts instead, so motion stays continuous
    /// between fresh emissions.
    pub fn drive(&mut self, direction: ScrollDirection, span_px: f32, now: Instant) -> Option<i32> {
        self.update_adaptive(now);
        self.last_gesture_at = Some(now);

        let cooled = self
            .last_emit_at
            .map_or(true, |t| now.duration_since(t) >= self.tuning.cooldown);
        if !cooled {
            return self.coast();
        }

        let speed = interp(
            span_px,
            (self.tuning.min_span_px, self.tuning.max_span_px),
            (self.tuning.min_speed, self.tuning.max_speed),
        ) * self.adaptive;
        let signed = match direction {
            ScrollDirection::Up => speed,
            ScrollDirection::Down => -speed,
        };

        self.momentum = signed;
        self.last_speed = speed;
        self.last_emit_at = Some(now);
        Some(signed as i32)
    }

    /// One tick without a scroll gesture: emit the residual momentum if
    /// it is still meaningful, then decay it. Higher last speeds decay
    /// more slowly and therefore coast longer.
    pub fn coast(&mut self) -> Option<i32> {
        if self.momentum.abs() <= self.tuning.rest_threshold {
            self.momentum = 0.0;
            return None;
        }

        let clicks = self.momentum as i32;
        self.momentum *= self.decay_factor();
        if self.momentum.abs() <= self.tuning.rest_threshold {
            self.momentum = 0.0;
        }

        (clicks != 0).then_some(clicks)
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn is_resting(&self) -> bool {
        self.momentum == 0.0
    }

    pub fn reset(&mut self) {
        self.momentum = 0.0;
        self.adaptive = 1.0;
        self.last_speed = 0.0;
        self.last_gesture_at = None;
        self.last_emit_at = None;
    }

    fn update_adaptive(&mut self, now: Instant) {
        let continuous = self
            .last_gesture_at
            .map_or(false, |t| now.duration_since(t) <= self.tuning.continuity_window);
        self.adaptive = if continuous {
            (self.adaptive * self.tuning.accel_step).min(self.tuning.accel_ceiling)
        } else {
            1.0
        };
    }

    fn decay_factor(&self) -> f32 {
        interp(
            self.last_speed,
            (self.tuning.min_speed, self.tuning.max_speed),
            (self.tuning.base_decay, self.tuning.fast_decay),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ScrollEngine {
        ScrollEngine::new(ScrollTuning::default())
    }

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn test_drive_speed_spans_range() {
        let start = t0();
        assert_eq!(engine().drive(ScrollDirection::Up, 30.0, start), Some(1));
        assert_eq!(engine().drive(ScrollDirection::Up, 200.0, start), Some(20));
        // Midpoint of the span range: 1 + (85 / 170) * 19 = 10.5 clicks.
        assert_eq!(engine().drive(ScrollDirection::Up, 115.0, start), Some(10));
    }

    #[test]
    fn test_down_direction_is_negative() {
        let mut engine = engine();
        let clicks = engine.drive(ScrollDirection::Down, 115.0, t0());
        assert_eq!(clicks, Some(-10));
        assert!(engine.momentum() < 0.0);
    }

    #[test]
    fn test_adaptive_grows_until_ceiling() {
        let mut engine = engine();
        let start = t0();
        // 60 ms steps: past the cooldown, inside the continuity window.
        let mut last = 0;
        for i in 0..60u32 {
            let at = start + Duration::from_millis(60 * u64::from(i));
            if let Some(clicks) = engine.drive(ScrollDirection::Up, 200.0, at) {
                last = clicks;
            }
        }
        assert_eq!(engine.adaptive, 1.5);
        assert_eq!(last, 30);
    }

    #[test]
    fn test_pause_resets_adaptive() {
        let mut engine = engine();
        let start = t0();
        for i in 0..20u32 {
            engine.drive(ScrollDirection::Up, 200.0, start + Duration::from_millis(60 * u64::from(i)));
        }
        assert!(engine.adaptive > 1.0);

        engine.drive(ScrollDirection::Up, 200.0, start + Duration::from_secs(30));
        assert_eq!(engine.adaptive, 1.0);
    }

    #[test]
    fn test_cooldown_coasts_between_fresh_emissions() {
        let mut engine = engine();
        let start = t0();
        assert_eq!(engine.drive(ScrollDirection::Up, 200.0, start), Some(20));

        // 16 ms later the fresh path is gated; momentum carries it.
        let gated = engine.drive(ScrollDirection::Up, 200.0, start + Duration::from_millis(16));
        assert_eq!(gated, Some(20));
        assert!(engine.momentum() < 20.0);

        // Once the cooldown lapses a fresh emission resets the baseline.
        let fresh = engine.drive(ScrollDirection::Up, 200.0, start + Duration::from_millis(66));
        assert_eq!(fresh, Some(20));
        assert!(engine.momentum() >= 20.0);
    }

    #[test]
    fn test_coast_decays_monotonically_to_rest() {
        let mut engine = engine();
        engine.drive(ScrollDirection::Up, 115.0, t0());

        let mut previous = engine.momentum();
        for _ in 0..500 {
            if engine.is_resting() {
                break;
            }
            if let Some(clicks) = engine.coast() {
                assert!(clicks > 0, "emission reversed sign");
            }
            let current = engine.momentum();
            assert!(current >= 0.0, "momentum reversed sign");
            assert!(current <= previous, "momentum grew while coasting");
            previous = current;
        }
        assert!(engine.is_resting());
        assert_eq!(engine.coast(), None);
    }

    #[test]
    fn test_faster_flicks_coast_longer() {
        let ticks_to_rest = |span: f32| {
            let mut engine = engine();
            engine.drive(ScrollDirection::Up, span, t0());
            let mut ticks = 0;
            while !engine.is_resting() {
                engine.coast();
                ticks += 1;
                assert!(ticks < 1000, "coasting never settled");
            }
            ticks
        };
        assert!(ticks_to_rest(200.0) > ticks_to_rest(40.0));
    }

    #[test]
    fn test_reset_clears_session() {
        let mut engine = engine();
        engine.drive(ScrollDirection::Up, 200.0, t0());
        engine.reset();
        assert!(engine.is_resting());
        assert_eq!(engine.coast(), None);
        assert_eq!(engine.adaptive, 1.0);
    }
}
