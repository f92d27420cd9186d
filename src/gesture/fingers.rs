//! Finger extension classification
//!
//! Derives which digits are extended from raw landmark geometry. All
//! comparisons run in image space, where y grows downward and the
//! camera mirrors the scene.

use crate::tracker::frame::{landmark, HandFrame};

/// Which way the knuckle line runs in image space. In the mirrored
/// camera view a right hand held palm out shows its pinky knuckle at a
/// greater x than its index knuckle, with the thumb on the low-x side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandOrientation {
    Left,
    Right,
}

impl HandOrientation {
    pub fn infer(frame: &HandFrame) -> Self {
        let pinky_base = frame.point(landmark::PINKY_MCP);
        let index_base = frame.point(landmark::INDEX_MCP);
        if pinky_base.x > index_base.x {
            Self::Right
        } else {
            Self::Left
        }
    }
}

/// Tracks which digits are currently extended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FingerState {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerState {
    /// Classify a full landmark frame into per-digit extension flags.
    ///
    /// The four fingers count as extended when the tip sits above the
    /// pip joint two landmarks below it. The thumb folds sideways, so
    /// its tip is compared horizontally against the ip joint, with the
    /// direction flipped by hand orientation.
    pub fn classify(frame: &HandFrame) -> Self {
        let orientation = HandOrientation::infer(frame);
        let thumb_tip = frame.point(landmark::THUMB_TIP);
        let thumb_ip = frame.point(landmark::THUMB_IP);
        let thumb = match orientation {
            HandOrientation::Right => thumb_tip.x < thumb_ip.x,
            HandOrientation::Left => thumb_tip.x > thumb_ip.x,
        };

        Self {
            thumb,
            index: digit_extended(frame, landmark::INDEX_TIP),
            middle: digit_extended(frame, landmark::MIDDLE_TIP),
            ring: digit_extended(frame, landmark::RING_TIP),
            pinky: digit_extended(frame, landmark::PINKY_TIP),
        }
    }

    /// Check if every digit is folded (fist pose)
    pub fn is_fist(&self) -> bool {
        !self.thumb && !self.index && !self.middle && !self.ring && !self.pinky
    }

    /// Check if only the index is extended (scroll up pose)
    pub fn is_index_only(&self) -> bool {
        !self.thumb && self.index && !self.middle && !self.ring && !self.pinky
    }

    /// Check if index and middle are extended (scroll down pose)
    pub fn is_index_middle(&self) -> bool {
        !self.thumb && self.index && self.middle && !self.ring && !self.pinky
    }

    /// Check if thumb and index are extended (volume pinch pose)
    pub fn is_thumb_index(&self) -> bool {
        self.thumb && self.index && !self.middle && !self.ring && !self.pinky
    }

    pub fn extended_count(&self) -> usize {
        [self.thumb, self.index, self.middle, self.ring, self.pinky]
            .iter()
            .filter(|&&up| up)
            .count()
    }
}

fn digit_extended(frame: &HandFrame, tip: usize) -> bool {
    frame.point(tip).y < frame.point(tip - 2).y
}
