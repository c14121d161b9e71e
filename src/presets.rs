use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;

use crate::dsp::coefficients::{
    knob_for_coeff, KnobPositions, ATTACK_COEFF_DEFAULT, INPUT_GAIN_DEFAULT,
    OUTPUT_GAIN_DEFAULT, RELEASE_COEFF_DEFAULT,
};
use crate::dsp::ReleaseLaw;

// =============================================================================
// FACTORY PRESETS
// =============================================================================

pub const DEFAULT_PRESET: &str = "Default";

/// Factory bank, parsed once on first use.
pub static FACTORY_PRESETS: Lazy<PresetManager> = Lazy::new(PresetManager::new);

/// A preset is stored as target coefficients rather than knob positions so
/// the JSON reads in the same units the leveler works in.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PresetValues {
    pub input_gain: f64,
    pub output_gain: f64,
    pub attack_coeff: f64,
    pub release_coeff: f64,
    #[serde(default)]
    pub release_law: ReleaseLaw,
}

impl Default for PresetValues {
    fn default() -> Self {
        Self {
            input_gain: INPUT_GAIN_DEFAULT,
            output_gain: OUTPUT_GAIN_DEFAULT,
            attack_coeff: ATTACK_COEFF_DEFAULT,
            release_coeff: RELEASE_COEFF_DEFAULT,
            release_law: ReleaseLaw::Power,
        }
    }
}

impl PresetValues {
    /// Knob positions that map back onto this preset's coefficients.
    pub fn knobs(&self) -> KnobPositions {
        KnobPositions {
            input_gain: self.input_gain,
            output_gain: self.output_gain,
            attack: knob_for_coeff(self.attack_coeff),
            release: knob_for_coeff(self.release_coeff),
            release_law: self.release_law,
        }
    }
}

#[derive(Debug)]
pub struct PresetManager {
    presets: HashMap<String, PresetValues>,
}

impl PresetManager {
    /// Load presets from baked-in JSON. A malformed bank is not fatal: the
    /// manager falls back to the "Default" preset alone.
    pub fn new() -> Self {
        let presets_str = include_str!("../presets.json");
        match Self::from_json(presets_str) {
            Ok(manager) => manager,
            Err(err) => {
                log::warn!("factory presets unavailable, using defaults: {:#}", err);
                Self::default()
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let presets: HashMap<String, PresetValues> =
            serde_json::from_str(json).context("failed to parse preset bank")?;
        if !presets.contains_key(DEFAULT_PRESET) {
            anyhow::bail!("preset bank has no \"{}\" entry", DEFAULT_PRESET);
        }
        Ok(Self { presets })
    }

    pub fn get_preset_values(&self, preset_name: &str) -> Option<&PresetValues> {
        self.presets.get(preset_name)
    }

    pub fn knobs(&self, preset_name: &str) -> Option<KnobPositions> {
        self.get_preset_values(preset_name).map(PresetValues::knobs)
    }

    /// Preset names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PresetManager {
    fn default() -> Self {
        let mut presets = HashMap::new();
        presets.insert(DEFAULT_PRESET.to_string(), PresetValues::default());
        Self { presets }
    }
}
