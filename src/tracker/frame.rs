//! Hand frame types and the detector wire format.
//!
//! The detector reports 21 landmarks per hand in normalized image
//! coordinates. Everything downstream works in pixel space, so frames
//! are scaled against the camera resolution as soon as they arrive.

use serde::Deserialize;

/// Landmark indices in the 21-point hand model.
pub mod landmark {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;

    pub const COUNT: usize = 21;
}

/// A single landmark in pixel space. `z` is the detector's relative
/// depth estimate and is carried through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    /// Planar distance to another landmark. Depth is too noisy to be
    /// useful for gesture geometry, so only x and y participate.
    pub fn distance(&self, other: &Point) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Which hand the detector believes it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("Left") => Self::Left,
            Some("Right") => Self::Right,
            _ => Self::Unknown,
        }
    }
}

/// One detected hand: a full landmark set in pixel space plus detector
/// metadata. Handedness is advisory only; orientation for gesture
/// purposes is re-derived from the landmark geometry.
#[derive(Debug, Clone)]
pub struct HandFrame {
    pub landmarks: [Point; landmark::COUNT],
    pub confidence: f32,
    pub handedness: Handedness,
}

impl HandFrame {
    pub fn point(&self, index: usize) -> Point {
        self.landmarks[index]
    }

    /// Thumb tip to index tip separation, the pinch used for volume.
    pub fn pinch_distance(&self) -> f32 {
        self.point(landmark::THUMB_TIP)
            .distance(&self.point(landmark::INDEX_TIP))
    }

    /// Index tip to middle tip separation, which drives scroll speed.
    pub fn scroll_span(&self) -> f32 {
        self.point(landmark::INDEX_TIP)
            .distance(&self.point(landmark::MIDDLE_TIP))
    }
}

#[derive(Debug, Deserialize)]
struct WirePoint {
    x: f32,
    y: f32,
    #[serde(default)]
    z: f32,
}

#[derive(Debug, Deserialize)]
struct WireHand {
    handedness: Option<String>,
    score: f32,
    landmarks: Vec<WirePoint>,
}

/// One newline-delimited JSON message from the detector process.
#[derive(Debug, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    hands: Vec<WireHand>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Outcome of picking a usable hand out of a wire message.
#[derive(Debug)]
pub enum FrameExtract {
    Hand(HandFrame),
    NoHand,
    /// Hands were reported but none carried a full landmark set.
    Malformed,
}

impl WireMessage {
    /// Selects the first hand meeting the confidence floor, scaling its
    /// landmarks from normalized coordinates into `width` x `height`
    /// pixel space. Hands with a short landmark list are skipped.
    pub fn extract(&self, width: f32, height: f32, min_confidence: f32) -> FrameExtract {
        let mut saw_malformed = false;

        for hand in &self.hands {
            if hand.landmarks.len() != landmark::COUNT {
                saw_malformed = true;
                continue;
            }
            if hand.score < min_confidence {
                continue;
            }

            let mut landmarks = [Point::default(); landmark::COUNT];
            for (slot, wire) in landmarks.iter_mut().zip(&hand.landmarks) {
                *slot = Point {
                    x: wire.x * width,
                    y: wire.y * height,
                    z: wire.z,
                };
            }

            return FrameExtract::Hand(HandFrame {
                landmarks,
                confidence: hand.score,
                handedness: Handedness::from_label(hand.handedness.as_deref()),
            });
        }

        if saw_malformed {
            FrameExtract::Malformed
        } else {
            FrameExtract::NoHand
        }
    }
}
