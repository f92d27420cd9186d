//! Pinch distance to volume level mapping
//!
//! Converts the thumb to index separation into a normalized volume
//! level, smoothing against a short history of recent distances so a
//! single jittery frame cannot yank the volume around.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::interp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeTuning {
    /// Pinch distance in pixels mapped to level 0.0.
    pub min_distance_px: f32,
    /// Pinch distance in pixels mapped to level 1.0.
    pub max_distance_px: f32,
    /// Weight of the instantaneous distance in the smoothing blend; the
    /// remainder comes from the mean of the recorded history.
    pub instant_weight: f32,
    /// How many recent distances feed the historical mean.
    pub history_depth: usize,
}

impl Default for VolumeTuning {
    fn default() -> Self {
        Self {
            min_distance_px: 50.0,
            max_distance_px: 200.0,
            instant_weight: 0.7,
            history_depth: 10,
        }
    }
}

/// Stateful mapper from pinch distances onto a `[0, 1]` volume level.
/// Smoothing state is scoped to one volume session and must be reset
/// whenever the mode changes.
#[derive(Debug)]
pub struct VolumeMapper {
    tuning: VolumeTuning,
    history: VecDeque<f32>,
    level: f32,
}

impl VolumeMapper {
    pub fn new(tuning: VolumeTuning) -> Self {
        let depth = tuning.history_depth.max(1);
        Self {
            tuning,
            history: VecDeque::with_capacity(depth),
            level: 0.0,
        }
    }

    /// Record a pinch distance and produce the smoothed level in
    /// `[0, 1]`. The first sample of a session passes through unblended.
    pub fn map(&mut self, distance_px: f32) -> f32 {
        let smoothed = match self.history_mean() {
            Some(mean) => {
                self.tuning.instant_weight * distance_px
                    + (1.0 - self.tuning.instant_weight) * mean
            }
            None => distance_px,
        };
        self.remember(distance_px);

        self.level = interp(
            smoothed,
            (self.tuning.min_distance_px, self.tuning.max_distance_px),
            (0.0, 1.0),
        );
        self.level
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn percent(&self) -> u8 {
        (self.level * 100.0).round() as u8
    }

    /// Clears the distance history and the last mapped level.
    pub fn reset(&mut self) {
        self.history.clear();
        self.level = 0.0;
    }

    fn history_mean(&self) -> Option<f32> {
        if self.history.is_empty() {
            return None;
        }
        Some(self.history.iter().sum::<f32>() / self.history.len() as f32)
    }

    fn remember(&mut self, distance_px: f32) {
        if self.history.len() == self.tuning.history_depth.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(distance_px);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_maps_to_half() {
        let mut mapper = VolumeMapper::new(VolumeTuning::default());
        let level = mapper.map(125.0);
        assert!((level - 0.5).abs() < 1e-6);
        assert_eq!(mapper.percent(), 50);
    }

    #[test]
    fn test_clamps_outside_calibration() {
        let mut mapper = VolumeMapper::new(VolumeTuning::default());
        assert_eq!(mapper.map(10.0), 0.0);

        let mut mapper = VolumeMapper::new(VolumeTuning::default());
        assert_eq!(mapper.map(500.0), 1.0);
    }

    #[test]
    fn test_monotonic_for_widening_pinch() {
        let mut mapper = VolumeMapper::new(VolumeTuning::default());
        let mut previous = -1.0;
        for distance in [60.0, 80.0, 105.0, 130.0, 155.0, 180.0] {
            let level = mapper.map(distance);
            assert!(level >= previous, "level regressed at {}", distance);
            previous = level;
        }
    }

    #[test]
    fn test_history_drags_sudden_jump() {
        let mut mapper = VolumeMapper::new(VolumeTuning::default());
        for _ in 0..10 {
            mapper.map(50.0);
        }
        let level = mapper.map(200.0);
        // 0.7 * 200 + 0.3 * 50 = 155 px, well short of full scale.
        assert!((level - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_smoothing() {
        let mut mapper = VolumeMapper::new(VolumeTuning::default());
        for _ in 0..10 {
            mapper.map(50.0);
        }
        mapper.reset();
        assert_eq!(mapper.level(), 0.0);
        assert_eq!(mapper.map(200.0), 1.0);
    }
}
