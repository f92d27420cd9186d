//! Gesture recognition: finger extension flags, frame labels, and the
//! rolling label history.

pub mod classifier;
pub mod fingers;
pub mod history;

pub use classifier::{GestureLabel, GestureRules};
pub use fingers::{FingerState, HandOrientation};
pub use history::GestureHistory;
