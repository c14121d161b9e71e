//! Lock-free control storage for hosts that are not `nih_plug`.
//!
//! Each scalar lives in its own atomic, so a reader never sees half of a
//! value. The four scalars are not published together: a block may pick up
//! a mix of old and new knobs, which the leveler tolerates. The processing
//! side calls [`SharedControls::snapshot`] once per block and works on the
//! copy.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use super::coefficients::{
    KnobPositions, INPUT_GAIN_MAX, INPUT_GAIN_MIN, OUTPUT_GAIN_MAX, OUTPUT_GAIN_MIN,
};
use super::leveler::ReleaseLaw;

#[derive(Debug)]
pub struct SharedControls {
    input_gain: AtomicU64,
    output_gain: AtomicU64,
    attack: AtomicU64,
    release: AtomicU64,
    release_law: AtomicU8,
}

impl Default for SharedControls {
    fn default() -> Self {
        Self::new(KnobPositions::default())
    }
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

impl SharedControls {
    pub fn new(knobs: KnobPositions) -> Self {
        let controls = Self {
            input_gain: AtomicU64::new(0),
            output_gain: AtomicU64::new(0),
            attack: AtomicU64::new(0),
            release: AtomicU64::new(0),
            release_law: AtomicU8::new(0),
        };
        controls.set(knobs);
        controls
    }

    pub fn set_input_gain(&self, gain: f64) {
        let v = clamp_or(gain, INPUT_GAIN_MIN, INPUT_GAIN_MAX, 1.0);
        self.input_gain.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn set_output_gain(&self, gain: f64) {
        let v = clamp_or(gain, OUTPUT_GAIN_MIN, OUTPUT_GAIN_MAX, 1.0);
        self.output_gain.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn set_attack(&self, knob: f64) {
        let v = clamp_or(knob, 0.0, 1.0, 0.0);
        self.attack.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn set_release(&self, knob: f64) {
        let v = clamp_or(knob, 0.0, 1.0, 0.0);
        self.release.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn set_release_law(&self, law: ReleaseLaw) {
        let tag = match law {
            ReleaseLaw::Power => 0,
            ReleaseLaw::Blended => 1,
        };
        self.release_law.store(tag, Ordering::Relaxed);
    }

    /// Store every control (still one scalar at a time).
    pub fn set(&self, knobs: KnobPositions) {
        self.set_input_gain(knobs.input_gain);
        self.set_output_gain(knobs.output_gain);
        self.set_attack(knobs.attack);
        self.set_release(knobs.release);
        self.set_release_law(knobs.release_law);
    }

    /// Copy of the current knobs. Call once at the top of each block.
    pub fn snapshot(&self) -> KnobPositions {
        KnobPositions {
            input_gain: f64::from_bits(self.input_gain.load(Ordering::Relaxed)),
            output_gain: f64::from_bits(self.output_gain.load(Ordering::Relaxed)),
            attack: f64::from_bits(self.attack.load(Ordering::Relaxed)),
            release: f64::from_bits(self.release.load(Ordering::Relaxed)),
            release_law: match self.release_law.load(Ordering::Relaxed) {
                1 => ReleaseLaw::Blended,
                _ => ReleaseLaw::Power,
            },
        }
    }
}
