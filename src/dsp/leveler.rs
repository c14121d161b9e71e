//! Channel Leveler
//!
//! Two coupled nonlinear trackers per channel:
//! - `fast` (b): energy estimator pulled toward the squared, boosted
//!   instantaneous amplitude, normalized by the slow level.
//! - `slow` (zm): envelope that relaxes toward `fast` through a power law,
//!   so release speed depends on how far the two trackers have drifted.
//!
//! Both stages add `|slow - fast|` back into themselves. That positive
//! feedback gives the fast catch-up on transients and is also why the exact
//! form and the exact epsilons below matter: the tuning lives in them.
//!
//! # Lifecycle
//! - Starts (and resets) at `fast = slow = 1.0`.
//! - Advanced exactly once per sample, never reset mid-stream except by
//!   the non-finite guard in the stereo wrapper.

use nih_plug::prelude::Enum;
use serde::{Deserialize, Serialize};

/// Guards the division by the slow level in the fast stage.
const FAST_DIV_EPS: f64 = 1.0e-10;
/// Guards the division inside the release exponent.
const RELEASE_EXP_EPS: f64 = 1.0e-7;
/// Amplitude boost before squaring.
const DRIVE: f64 = 20.0;
/// Rectifier gain on the raw sample.
const RECTIFY_GAIN: f64 = 2.0;

/// Blended law: share of the power term vs. the linear hold term.
const BLEND_POWER_SHARE: f64 = 0.7;
const BLEND_HOLD_SHARE: f64 = 0.3;

const INITIAL_LEVEL: f64 = 1.0;

/// How the slow stage relaxes toward the fast stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Enum)]
pub enum ReleaseLaw {
    /// `theta * slow^(|fast| / slow)`. Canonical.
    #[default]
    #[name = "Power"]
    Power,
    /// `theta * (slow^(0.7 * |fast| / slow) + 0.3 * |slow|)`.
    #[name = "Blended"]
    Blended,
}

/// Recursive state for one channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelLeveler {
    fast: f64,
    slow: f64,
}

impl Default for ChannelLeveler {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelLeveler {
    pub fn new() -> Self {
        Self {
            fast: INITIAL_LEVEL,
            slow: INITIAL_LEVEL,
        }
    }

    pub fn reset(&mut self) {
        self.fast = INITIAL_LEVEL;
        self.slow = INITIAL_LEVEL;
    }

    /// Advance one sample and return the new slow level.
    #[inline]
    pub fn advance(
        &mut self,
        raw: f64,
        input_gain: f64,
        attack_coeff: f64,
        release_coeff: f64,
        law: ReleaseLaw,
    ) -> f64 {
        let amplitude = (raw * RECTIFY_GAIN).abs() * input_gain;
        let driven = amplitude * DRIVE;

        // Fast stage reads the previous slow level
        let fast = (1.0 - attack_coeff) * (self.fast + (self.slow - self.fast).abs())
            + attack_coeff * (driven * driven) / (self.slow + FAST_DIV_EPS);

        // Slow stage reads the fast level just computed
        let catch_up = fast + (self.slow - fast).abs();
        let base = self.slow.abs().max(f64::MIN_POSITIVE);
        let exponent = (fast.abs() / (self.slow + RELEASE_EXP_EPS)).abs();
        let relax = match law {
            ReleaseLaw::Power => base.powf(exponent),
            ReleaseLaw::Blended => {
                base.powf(exponent * BLEND_POWER_SHARE) + self.slow.abs() * BLEND_HOLD_SHARE
            }
        };
        let slow = (1.0 - release_coeff) * catch_up + release_coeff * relax;

        self.fast = fast;
        self.slow = slow;
        slow
    }

    #[inline]
    pub fn fast_level(&self) -> f64 {
        self.fast
    }

    #[inline]
    pub fn slow_level(&self) -> f64 {
        self.slow
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.fast.is_finite() && self.slow.is_finite()
    }

    #[cfg(test)]
    pub(crate) fn with_levels(fast: f64, slow: f64) -> Self {
        Self { fast, slow }
    }
}
