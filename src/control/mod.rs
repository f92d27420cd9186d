//! The control pipeline: mode arbitration and the volume and scroll
//! engines it drives.

pub mod pipeline;
pub mod scroll;
pub mod volume;

pub use pipeline::{ControlMode, ModeRules, Pipeline, PipelineStats, PipelineTuning, TickOutcome};
pub use scroll::{ScrollDirection, ScrollEngine, ScrollTuning};
pub use volume::{VolumeMapper, VolumeTuning};

/// Linear interpolation of `x` from an input span onto an output span,
/// clamped at both ends.
pub(crate) fn interp(x: f32, from: (f32, f32), to: (f32, f32)) -> f32 {
    let (in_lo, in_hi) = from;
    let (out_lo, out_hi) = to;
    if in_hi <= in_lo {
        return out_lo;
    }
    let t = ((x - in_lo) / (in_hi - in_lo)).clamp(0.0, 1.0);
    out_lo + t * (out_hi - out_lo)
}
