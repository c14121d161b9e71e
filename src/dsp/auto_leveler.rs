//! Stereo Auto Leveler
//!
//! Owns one [`ChannelLeveler`] per side and runs the per-sample control
//! flow over host-owned buffers:
//!
//! 1. advance left, advance right (each on its own raw sample)
//! 2. reset any channel whose state went non-finite
//! 3. divide both sides by the linked denominator, apply output gain, clamp
//!
//! # Real-time contract
//! - In place over borrowed slices, no allocation, no locks.
//! - Controls are a plain copy taken before the block starts.

use super::coefficients::MappedControls;
use super::gain;
use super::leveler::ChannelLeveler;
use super::utils::peak_abs;

/// Per-block measurements handed to the metering side.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockStats {
    /// Max |x| of the left input before processing.
    pub input_peak_l: f32,
    pub input_peak_r: f32,
    /// Max |y| of the left output after processing.
    pub output_peak_l: f32,
    pub output_peak_r: f32,
    /// `0.5 * (slow_l + slow_r)` after the last frame.
    pub linked_level: f64,
    /// Channels reset by the non-finite guard during this block.
    pub recoveries: u32,
}

#[derive(Clone, Debug, Default)]
pub struct AutoLeveler {
    left: ChannelLeveler,
    right: ChannelLeveler,
}

impl AutoLeveler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream (re)start. Only call while processing is stopped.
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    /// `(fast, slow)` for left and right.
    pub fn levels(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.left.fast_level(), self.left.slow_level()),
            (self.right.fast_level(), self.right.slow_level()),
        )
    }

    pub fn linked_level(&self) -> f64 {
        0.5 * (self.left.slow_level() + self.right.slow_level())
    }

    /// Process one frame. Returns the outputs and how many channels had to
    /// be recovered.
    #[inline]
    pub fn process_frame_counted(
        &mut self,
        raw_l: f64,
        raw_r: f64,
        controls: &MappedControls,
    ) -> ((f64, f64), u32) {
        advance(&mut self.left, raw_l, controls);
        advance(&mut self.right, raw_r, controls);

        let mut recovered = 0;
        if !self.left.is_finite() {
            self.left.reset();
            recovered += 1;
        }
        if !self.right.is_finite() {
            self.right.reset();
            recovered += 1;
        }

        let out = gain::apply(
            raw_l,
            raw_r,
            self.left.slow_level(),
            self.right.slow_level(),
            controls.output_gain,
        );
        (out, recovered)
    }

    #[cfg(test)]
    pub(crate) fn process_frame(
        &mut self,
        raw_l: f64,
        raw_r: f64,
        controls: &MappedControls,
    ) -> (f64, f64) {
        self.process_frame_counted(raw_l, raw_r, controls).0
    }

    /// Process a block in place. Only the common length of the two slices
    /// is touched.
    pub fn process_block(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        controls: &MappedControls,
    ) -> BlockStats {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);

        let mut stats = BlockStats {
            input_peak_l: peak_abs(left),
            input_peak_r: peak_abs(right),
            ..BlockStats::default()
        };

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let ((out_l, out_r), recovered) =
                self.process_frame_counted(*l as f64, *r as f64, controls);
            *l = out_l as f32;
            *r = out_r as f32;
            stats.recoveries += recovered;
        }

        stats.output_peak_l = peak_abs(left);
        stats.output_peak_r = peak_abs(right);
        stats.linked_level = self.linked_level();
        stats
    }

    #[cfg(test)]
    pub(crate) fn from_channels(left: ChannelLeveler, right: ChannelLeveler) -> Self {
        Self { left, right }
    }
}

#[inline]
fn advance(channel: &mut ChannelLeveler, raw: f64, c: &MappedControls) {
    channel.advance(
        raw,
        c.input_gain,
        c.attack_coeff,
        c.release_coeff,
        c.release_law,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::coefficients::KnobPositions;
    use crate::dsp::leveler::ReleaseLaw;
    use std::f64::consts::PI;

    const SR: f64 = 48_000.0;

    fn sine(freq: f64, amp: f64, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|n| (amp * (2.0 * PI * freq * n as f64 / SR).sin()) as f32)
            .collect()
    }

    fn run(
        leveler: &mut AutoLeveler,
        l: &[f32],
        r: &[f32],
        c: &MappedControls,
    ) -> (Vec<f32>, Vec<f32>) {
        let mut left = l.to_vec();
        let mut right = r.to_vec();
        for (lc, rc) in left.chunks_mut(512).zip(right.chunks_mut(512)) {
            leveler.process_block(lc, rc, c);
        }
        (left, right)
    }

    fn stress_signal() -> Vec<f32> {
        let mut s = vec![0.0f32; 20_000];
        s.push(1.0);
        s.extend(std::iter::repeat(0.0).take(5_000));
        s.extend(std::iter::repeat(1.0).take(10_000));
        s.extend(std::iter::repeat(-1.0).take(10_000));
        s.extend(std::iter::repeat(0.0).take(30_000));
        s.extend(std::iter::repeat(1e-30).take(100));
        s.extend(std::iter::repeat(0.5).take(100));
        s.extend(std::iter::repeat(0.0).take(20_000));
        s.extend(sine(1000.0, 1.0, 4_800));
        s
    }

    #[test]
    fn test_silence_stays_silent_and_bounded() {
        let c = MappedControls::default();
        let mut lev = AutoLeveler::new();
        let zeros = vec![0.0f32; 96_000];
        let (l, r) = run(&mut lev, &zeros, &zeros, &c);
        assert!(l.iter().chain(r.iter()).all(|&x| x == 0.0));

        let ((fl, sl), (fr, sr)) = lev.levels();
        for v in [fl, sl, fr, sr] {
            assert!(v.is_finite() && v > 0.0 && v < 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_sine_reaches_equilibrium() {
        let c = MappedControls::default();
        let mut lev = AutoLeveler::new();
        let s = sine(1000.0, 1.0, 96_000);
        let (l, _) = run(&mut lev, &s, &s, &c);

        let window_peak = |from: usize| {
            l[from..from + 4_800]
                .iter()
                .fold(0.0f32, |m, &x| m.max(x.abs()))
        };
        let early = window_peak(48_000);
        let late = window_peak(91_200);
        assert!(late > 0.0);
        // Far from the clamp
        assert!(late < 0.5, "steady state amplitude {}", late);
        assert!((early - late).abs() / late < 0.01, "{} vs {}", early, late);
    }

    #[test]
    fn test_reset_reproduces_output() {
        let c = MappedControls::default();
        let s = stress_signal();
        let mut lev = AutoLeveler::new();
        let (first, _) = run(&mut lev, &s, &s, &c);

        lev.reset();
        assert_eq!(lev.levels(), ((1.0, 1.0), (1.0, 1.0)));
        let (second, _) = run(&mut lev, &s, &s, &c);
        assert_eq!(
            first.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
            second.iter().map(|x| x.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_identical_channels_stay_linked() {
        let c = MappedControls::default();
        let mut lev = AutoLeveler::new();
        let s = stress_signal();
        for &x in &s {
            let (out_l, out_r) = lev.process_frame(x as f64, x as f64, &c);
            assert_eq!(out_l, out_r);
            let ((_, sl), (_, sr)) = lev.levels();
            assert_eq!(sl, sr);
        }
    }

    #[test]
    fn test_outputs_bounded_and_finite_under_stress() {
        let s = stress_signal();
        let s_r: Vec<f32> = s.iter().map(|x| -0.5 * x).collect();
        for &attack in &[0.0, 0.5, 1.0] {
            for &release in &[0.0, 0.5, 1.0] {
                for &input_gain in &[0.00025, 1.0, 3.0] {
                    for &law in &[ReleaseLaw::Power, ReleaseLaw::Blended] {
                        let c = MappedControls::from_knobs(&KnobPositions {
                            input_gain,
                            output_gain: 10.0,
                            attack,
                            release,
                            release_law: law,
                        });
                        let mut lev = AutoLeveler::new();
                        let (l, r) = run(&mut lev, &s, &s_r, &c);
                        for &x in l.iter().chain(r.iter()) {
                            assert!(x.is_finite());
                            assert!((-2.0..=2.0).contains(&x));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_input_stays_bounded() {
        let extremes = [1e3f32, -1e3, 1e20, -1e20, f32::MAX, -f32::MAX, 0.0, 1.0];
        let left: Vec<f32> = extremes.iter().cycle().take(4_096).copied().collect();
        let right: Vec<f32> = left.iter().rev().copied().collect();
        for &attack in &[0.0, 1.0] {
            for &release in &[0.0, 1.0] {
                for &law in &[ReleaseLaw::Power, ReleaseLaw::Blended] {
                    let c = MappedControls::from_knobs(&KnobPositions {
                        input_gain: 3.0,
                        output_gain: 10.0,
                        attack,
                        release,
                        release_law: law,
                    });
                    let mut lev = AutoLeveler::new();
                    let (l, r) = run(&mut lev, &left, &right, &c);
                    for &x in l.iter().chain(r.iter()) {
                        assert!(x.is_finite(), "non-finite output at {:?}", c);
                        assert!(x.abs() <= 2.0, "{} out of range at {:?}", x, c);
                    }
                    let ((fl, sl), (fr, sr)) = lev.levels();
                    assert!([fl, sl, fr, sr].iter().all(|v| v.is_finite()));
                }
            }
        }
    }

    #[test]
    fn test_non_finite_state_is_recovered() {
        let c = MappedControls::default();
        let mut lev = AutoLeveler::from_channels(
            ChannelLeveler::with_levels(f64::NAN, f64::NAN),
            ChannelLeveler::new(),
        );
        let ((out_l, out_r), recovered) = lev.process_frame_counted(0.5, 0.5, &c);
        assert_eq!(recovered, 1);
        assert!(out_l.is_finite() && out_r.is_finite());
        let ((fl, sl), _) = lev.levels();
        assert_eq!((fl, sl), (1.0, 1.0));
    }

    #[test]
    fn test_block_stats() {
        let c = MappedControls::default();
        let mut lev = AutoLeveler::new();
        let mut left = vec![0.0f32, 0.25, -0.5, 0.1];
        let mut right = vec![0.0f32, -0.75, 0.2, 0.0];
        let stats = lev.process_block(&mut left, &mut right, &c);

        assert_eq!(stats.input_peak_l, 0.5);
        assert_eq!(stats.input_peak_r, 0.75);
        assert_eq!(stats.output_peak_l, peak_abs(&left));
        assert_eq!(stats.output_peak_r, peak_abs(&right));
        assert_eq!(stats.linked_level, lev.linked_level());
        assert_eq!(stats.recoveries, 0);
    }

    #[test]
    fn test_mismatched_lengths_use_common_prefix() {
        let c = MappedControls::default();
        let mut lev = AutoLeveler::new();
        let mut left = vec![0.5f32; 8];
        let mut right = vec![0.5f32; 4];
        lev.process_block(&mut left, &mut right, &c);
        assert!(left[4..].iter().all(|&x| x == 0.5));
    }
}
