//! Hand tracking input: the detector subprocess and its frame types.

pub mod detector;
pub mod frame;

pub use detector::{DetectorConfig, Tracker, TrackerError, TrackerEvent};
pub use frame::{landmark, HandFrame, Handedness, Point};
