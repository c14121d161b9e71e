//! Parameter Mapper
//!
//! Turns the four host-facing controls into the values the leveling
//! recursion actually consumes. Input and output gain pass straight through;
//! attack and release knob positions are mapped onto a logarithmic
//! coefficient scale so a linear knob sweep covers four decades evenly.
//!
//! # Mapping
//! `coeff = COEFF_MIN * (COEFF_MAX / COEFF_MIN) ^ knob`, knob in [0, 1].

use super::leveler::ReleaseLaw;

/// Smallest attack/release coefficient (knob fully counter-clockwise).
pub const COEFF_MIN: f64 = 1.0e-5;
/// Largest attack/release coefficient (knob fully clockwise).
pub const COEFF_MAX: f64 = 1.0e-1;

pub const INPUT_GAIN_MIN: f64 = 0.00025;
pub const INPUT_GAIN_MAX: f64 = 3.0;
pub const INPUT_GAIN_DEFAULT: f64 = 1.0;

pub const OUTPUT_GAIN_MIN: f64 = 1.0;
pub const OUTPUT_GAIN_MAX: f64 = 10.0;
pub const OUTPUT_GAIN_DEFAULT: f64 = 1.0;

/// Attack coefficient the default knob position lands on.
pub const ATTACK_COEFF_DEFAULT: f64 = 0.008;
/// Release coefficient the default knob position lands on.
pub const RELEASE_COEFF_DEFAULT: f64 = 0.001;

/// Log-domain map from a normalized knob position to a filter coefficient.
///
/// Positions outside [0, 1] (and NaN) are pulled back into range first, so
/// the result always lies in [`COEFF_MIN`, `COEFF_MAX`].
#[inline]
pub fn coeff_from_knob(knob: f64) -> f64 {
    let k = if knob.is_nan() { 0.0 } else { knob.clamp(0.0, 1.0) };
    let coeff = COEFF_MIN * (COEFF_MAX / COEFF_MIN).powf(k);
    // powf rounding can step a hair outside the endpoints
    coeff.clamp(COEFF_MIN, COEFF_MAX)
}

/// Inverse of [`coeff_from_knob`]. Used to derive default knob positions
/// from a target coefficient.
#[inline]
pub fn knob_for_coeff(coeff: f64) -> f64 {
    if coeff.is_nan() || coeff <= 0.0 {
        return 0.0;
    }
    ((coeff / COEFF_MIN).ln() / (COEFF_MAX / COEFF_MIN).ln()).clamp(0.0, 1.0)
}

pub fn default_attack_knob() -> f64 {
    knob_for_coeff(ATTACK_COEFF_DEFAULT)
}

pub fn default_release_knob() -> f64 {
    knob_for_coeff(RELEASE_COEFF_DEFAULT)
}

/// Raw control values as the host or UI hands them over.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KnobPositions {
    /// Linear input gain, [0.00025, 3].
    pub input_gain: f64,
    /// Linear output gain, [1, 10].
    pub output_gain: f64,
    /// Normalized attack position, [0, 1].
    pub attack: f64,
    /// Normalized release position, [0, 1].
    pub release: f64,
    pub release_law: ReleaseLaw,
}

impl Default for KnobPositions {
    fn default() -> Self {
        Self {
            input_gain: INPUT_GAIN_DEFAULT,
            output_gain: OUTPUT_GAIN_DEFAULT,
            attack: default_attack_knob(),
            release: default_release_knob(),
            release_law: ReleaseLaw::default(),
        }
    }
}

/// Values consumed by the per-sample loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MappedControls {
    pub input_gain: f64,
    pub output_gain: f64,
    /// `gamma`: how fast the fast tracker follows rising energy.
    pub attack_coeff: f64,
    /// `theta`: how fast the slow tracker relaxes toward the fast one.
    pub release_coeff: f64,
    pub release_law: ReleaseLaw,
}

impl MappedControls {
    pub fn from_knobs(knobs: &KnobPositions) -> Self {
        Self {
            input_gain: knobs.input_gain,
            output_gain: knobs.output_gain,
            attack_coeff: coeff_from_knob(knobs.attack),
            release_coeff: coeff_from_knob(knobs.release),
            release_law: knobs.release_law,
        }
    }
}

impl Default for MappedControls {
    fn default() -> Self {
        Self::from_knobs(&KnobPositions::default())
    }
}

/// Caches the last mapping so the `powf` calls only run when a knob moves.
#[derive(Clone, Debug)]
pub struct ControlMapper {
    last_knobs: Option<KnobPositions>,
    mapped: MappedControls,
}

impl Default for ControlMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlMapper {
    pub fn new() -> Self {
        Self {
            last_knobs: None,
            mapped: MappedControls::default(),
        }
    }

    /// Returns the mapped controls for `knobs`, recomputing only on change.
    pub fn update(&mut self, knobs: KnobPositions) -> MappedControls {
        if self.last_knobs != Some(knobs) {
            self.mapped = MappedControls::from_knobs(&knobs);
            self.last_knobs = Some(knobs);
        }
        self.mapped
    }

    /// Whether the next `update` with these knobs would recompute.
    #[cfg(test)]
    pub(crate) fn is_stale(&self, knobs: &KnobPositions) -> bool {
        self.last_knobs.as_ref() != Some(knobs)
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> MappedControls {
        self.mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_endpoints() {
        assert_relative_eq!(coeff_from_knob(0.0), COEFF_MIN);
        assert_relative_eq!(coeff_from_knob(1.0), COEFF_MAX);
        assert_relative_eq!(coeff_from_knob(0.5), 1.0e-3, max_relative = 1e-12);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let mut prev = 0.0;
        for i in 0..=1000 {
            let knob = i as f64 / 1000.0;
            let c = coeff_from_knob(knob);
            assert!(c >= COEFF_MIN && c <= COEFF_MAX, "knob {} -> {}", knob, c);
            assert!(c > prev, "not increasing at knob {}", knob);
            prev = c;
        }
    }

    #[test]
    fn test_out_of_range_knobs_are_clamped() {
        assert_eq!(coeff_from_knob(-3.0), COEFF_MIN);
        assert_eq!(coeff_from_knob(7.0), COEFF_MAX);
        assert_eq!(coeff_from_knob(f64::NAN), COEFF_MIN);
    }

    #[test]
    fn test_inverse_map() {
        for i in 0..=20 {
            let knob = i as f64 / 20.0;
            assert_relative_eq!(
                knob_for_coeff(coeff_from_knob(knob)),
                knob,
                epsilon = 1e-12
            );
        }
        assert_eq!(knob_for_coeff(0.0), 0.0);
        assert_eq!(knob_for_coeff(1.0), 1.0);
    }

    #[test]
    fn test_defaults() {
        // ln(800) / ln(10000)
        assert_relative_eq!(default_attack_knob(), 0.725_772_5, epsilon = 1e-6);
        assert_relative_eq!(default_release_knob(), 0.5, epsilon = 1e-12);

        let mapped = MappedControls::default();
        assert_relative_eq!(mapped.attack_coeff, 0.008, max_relative = 1e-9);
        assert_relative_eq!(mapped.release_coeff, 0.001, max_relative = 1e-9);
        assert_eq!(mapped.input_gain, 1.0);
        assert_eq!(mapped.output_gain, 1.0);
    }

    #[test]
    fn test_mapper_recomputes_only_on_change() {
        let mut mapper = ControlMapper::new();
        let knobs = KnobPositions::default();
        assert!(mapper.is_stale(&knobs));

        let first = mapper.update(knobs);
        assert!(!mapper.is_stale(&knobs));
        assert_eq!(mapper.update(knobs), first);

        let moved = KnobPositions {
            attack: 1.0,
            ..knobs
        };
        assert!(mapper.is_stale(&moved));
        let second = mapper.update(moved);
        assert_relative_eq!(second.attack_coeff, COEFF_MAX);
        assert_eq!(second.release_coeff, first.release_coeff);
        assert_eq!(mapper.current(), second);
    }
}
