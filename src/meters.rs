//! Thread-safe metering for the leveler.
//!
//! The audio thread publishes one [`BlockStats`] per block with relaxed
//! atomic stores; any other thread reads a [`MeterSnapshot`] without
//! blocking it. Floats are stored as their bit patterns.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::dsp::BlockStats;

/// Values as of the last processed block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeterSnapshot {
    pub input_peak_l: f32,
    pub input_peak_r: f32,
    pub output_peak_l: f32,
    pub output_peak_r: f32,
    /// Linked denominator the last frame was divided by (minus epsilon).
    pub linked_level: f32,
}

#[derive(Default)]
pub struct Meters {
    input_peak_l: AtomicU32,
    input_peak_r: AtomicU32,
    output_peak_l: AtomicU32,
    output_peak_r: AtomicU32,
    linked_level: AtomicU32,
    // Cumulative until taken
    recoveries: AtomicU32,
}

impl Meters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called from the audio thread once per block.
    pub fn publish(&self, stats: &BlockStats) {
        self.input_peak_l
            .store(stats.input_peak_l.to_bits(), Ordering::Relaxed);
        self.input_peak_r
            .store(stats.input_peak_r.to_bits(), Ordering::Relaxed);
        self.output_peak_l
            .store(stats.output_peak_l.to_bits(), Ordering::Relaxed);
        self.output_peak_r
            .store(stats.output_peak_r.to_bits(), Ordering::Relaxed);
        self.linked_level
            .store((stats.linked_level as f32).to_bits(), Ordering::Relaxed);
        if stats.recoveries > 0 {
            self.recoveries
                .fetch_add(stats.recoveries, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            input_peak_l: f32::from_bits(self.input_peak_l.load(Ordering::Relaxed)),
            input_peak_r: f32::from_bits(self.input_peak_r.load(Ordering::Relaxed)),
            output_peak_l: f32::from_bits(self.output_peak_l.load(Ordering::Relaxed)),
            output_peak_r: f32::from_bits(self.output_peak_r.load(Ordering::Relaxed)),
            linked_level: f32::from_bits(self.linked_level.load(Ordering::Relaxed)),
        }
    }

    /// Returns the non-finite recoveries counted since the last call and
    /// clears the counter.
    pub fn take_recoveries(&self) -> u32 {
        self.recoveries.swap(0, Ordering::Relaxed)
    }

    /// Zero the peak and level readouts. The recovery counter is left alone.
    pub fn reset(&self) {
        for meter in [
            &self.input_peak_l,
            &self.input_peak_r,
            &self.output_peak_l,
            &self.output_peak_r,
            &self.linked_level,
        ] {
            meter.store(0.0f32.to_bits(), Ordering::Relaxed);
        }
    }
}
