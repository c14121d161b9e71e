//! Gain Applier
//!
//! Divides both channels by one shared, averaged level estimate (linked
//! leveling keeps the stereo image intact), applies output gain and hard
//! clamps the result.
//!
//! The clamp is the last-resort safety bound for when the denominator
//! collapses toward its epsilon floor. It clips audibly; it is not a
//! limiter.

/// Keeps the linked denominator away from zero.
const DENOM_EPS: f64 = 1.0e-9;
/// Absolute output bound.
pub const OUTPUT_CEILING: f64 = 2.0;

/// Linked denominator from both channels' slow levels.
#[inline]
pub fn linked_denominator(slow_l: f64, slow_r: f64) -> f64 {
    0.5 * (slow_l + slow_r) + DENOM_EPS
}

#[inline]
fn bounded(x: f64) -> f64 {
    // f64::clamp passes NaN through
    if x.is_nan() {
        0.0
    } else {
        x.clamp(-OUTPUT_CEILING, OUTPUT_CEILING)
    }
}

/// Normalize one stereo frame.
#[inline]
pub fn apply(raw_l: f64, raw_r: f64, slow_l: f64, slow_r: f64, output_gain: f64) -> (f64, f64) {
    let denom = linked_denominator(slow_l, slow_r);
    (
        bounded(raw_l / denom * output_gain),
        bounded(raw_r / denom * output_gain),
    )
}
