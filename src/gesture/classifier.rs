//! Frame-level gesture labeling
//!
//! Maps a finger extension pattern (plus the pinch distance) onto one
//! of the control gestures. Labeling is stateless per frame; debounce
//! and mode switching happen downstream in the control pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::fingers::FingerState;

/// Gesture recognized in a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    /// All digits folded, requests idle
    Fist,
    /// Index extended alone
    ScrollUp,
    /// Index and middle extended
    ScrollDown,
    /// Thumb and index pinch held apart
    Volume,
    /// Anything else, carries no request
    Unknown,
}

impl Default for GestureLabel {
    fn default() -> Self {
        GestureLabel::Unknown
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GestureLabel::Fist => "fist",
            GestureLabel::ScrollUp => "scroll_up",
            GestureLabel::ScrollDown => "scroll_down",
            GestureLabel::Volume => "volume",
            GestureLabel::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Thresholds for gesture labeling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureRules {
    /// Minimum thumb to index separation in pixels before a pinch pose
    /// reads as a volume gesture rather than an accidental near-touch.
    pub min_pinch_px: f32,
}

impl Default for GestureRules {
    fn default() -> Self {
        Self { min_pinch_px: 30.0 }
    }
}

impl GestureRules {
    /// Label one frame. The scroll poses and the volume pinch differ in
    /// digit count, so the precedence order below never shadows one
    /// gesture with another.
    pub fn classify(&self, fingers: FingerState, pinch_px: f32) -> GestureLabel {
        if fingers.is_fist() {
            return GestureLabel::Fist;
        }
        if fingers.is_index_only() {
            return GestureLabel::ScrollUp;
        }
        if fingers.is_index_middle() {
            return GestureLabel::ScrollDown;
        }
        if fingers.is_thumb_index() && pinch_px > self.min_pinch_px {
            return GestureLabel::Volume;
        }
        GestureLabel::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingers(thumb: bool, index: bool, middle: bool, ring: bool, pinky: bool) -> FingerState {
        FingerState {
            thumb,
            index,
            middle,
            ring,
            pinky,
        }
    }

    #[test]
    fn test_fist_wins_regardless_of_pinch() {
        let rules = GestureRules::default();
        let all_folded = fingers(false, false, false, false, false);
        assert_eq!(rules.classify(all_folded, 0.0), GestureLabel::Fist);
        assert_eq!(rules.classify(all_folded, 500.0), GestureLabel::Fist);
    }

    #[test]
    fn test_scroll_labels() {
        let rules = GestureRules::default();
        assert_eq!(
            rules.classify(fingers(false, true, false, false, false), 0.0),
            GestureLabel::ScrollUp
        );
        assert_eq!(
            rules.classify(fingers(false, true, true, false, false), 0.0),
            GestureLabel::ScrollDown
        );
    }

    #[test]
    fn test_volume_requires_open_pinch() {
        let rules = GestureRules::default();
        let pinch = fingers(true, true, false, false, false);
        assert_eq!(rules.classify(pinch, 120.0), GestureLabel::Volume);
        // A closed pinch is ambiguous, so it carries no request.
        assert_eq!(rules.classify(pinch, 10.0), GestureLabel::Unknown);
    }

    #[test]
    fn test_unmatched_patterns_are_unknown() {
        let rules = GestureRules::default();
        assert_eq!(
            rules.classify(fingers(false, false, false, false, true), 0.0),
            GestureLabel::Unknown
        );
        assert_eq!(
            rules.classify(fingers(true, true, true, true, true), 150.0),
            GestureLabel::Unknown
        );
    }

    #[test]
    fn test_label_serialization() {
        let json = serde_json::to_string(&GestureLabel::ScrollDown).unwrap();
        assert_eq!(json, r#""scroll_down""#);
        let back: GestureLabel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, GestureLabel::ScrollDown);
    }
}
