//! Events emitted by the control pipeline
//!
//! Action executors consume the volume and scroll intents; feedback
//! clients typically subscribe to the whole stream for display.

use serde::{Deserialize, Serialize};

use crate::control::ControlMode;

/// Events broadcast by the control pipeline as it processes ticks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    /// A new mode survived the stability window and took effect
    ModeChanged {
        from: ControlMode,
        to: ControlMode,
        /// Milliseconds the previous mode had been held
        held_ms: u64,
    },

    /// Volume intent for the action executor
    VolumeSet {
        /// Normalized level in [0, 1]
        level: f32,
        /// Same level rounded to whole percent, for display
        percent: u8,
    },

    /// Scroll intent for the action executor, in signed wheel clicks
    Scroll { clicks: i32 },

    /// The tracked hand appeared in or vanished from the camera view
    HandVisibility { visible: bool },
}

impl std::fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlEvent::ModeChanged { from, to, held_ms } => {
                write!(f, "MODE_CHANGED {} -> {} ({}ms)", from, to, held_ms)
            }
            ControlEvent::VolumeSet { percent, .. } => {
                write!(f, "VOLUME_SET {}%", percent)
            }
            ControlEvent::Scroll { clicks } => write!(f, "SCROLL {}", clicks),
            ControlEvent::HandVisibility { visible } => {
                if *visible {
                    write!(f, "HAND_VISIBLE")
                } else {
                    write!(f, "HAND_LOST")
                }
            }
        }
    }
}
