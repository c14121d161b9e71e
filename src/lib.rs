pub mod dsp;
pub mod meters;
pub mod presets;

use crate::dsp::coefficients::{
    default_attack_knob, default_release_knob, INPUT_GAIN_DEFAULT, INPUT_GAIN_MAX,
    INPUT_GAIN_MIN, OUTPUT_GAIN_DEFAULT, OUTPUT_GAIN_MAX, OUTPUT_GAIN_MIN,
};
use crate::dsp::{AutoLeveler, ControlMapper, KnobPositions, ReleaseLaw};
use crate::meters::Meters;
use assert_no_alloc::permit_alloc;
use nih_plug::prelude::*;
use std::sync::Arc;

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------
#[derive(Params)]
pub struct AutoLevelParams {
    /// Linear gain into the level detector.
    #[id = "input"]
    pub input: FloatParam,

    /// Linear gain after normalization.
    #[id = "output"]
    pub output: FloatParam,

    /// Attack knob position, log-mapped to the attack coefficient.
    #[id = "gamma"]
    pub attack: FloatParam,

    /// Release knob position, log-mapped to the release coefficient.
    #[id = "theta"]
    pub release: FloatParam,

    #[id = "release_law"]
    pub release_law: EnumParam<ReleaseLaw>,
}

// Shows the coefficient a knob position maps to
fn format_coeff(v: f32) -> String {
    format!("{:.5}", dsp::coefficients::coeff_from_knob(v as f64))
}

fn format_gain(v: f32) -> String {
    format!("{:.3}x", v)
}

impl Default for AutoLevelParams {
    fn default() -> Self {
        Self {
            input: FloatParam::new(
                "Input",
                INPUT_GAIN_DEFAULT as f32,
                FloatRange::Linear {
                    min: INPUT_GAIN_MIN as f32,
                    max: INPUT_GAIN_MAX as f32,
                },
            )
            .with_step_size(0.00001)
            .with_value_to_string(Arc::new(format_gain)),

            output: FloatParam::new(
                "Output",
                OUTPUT_GAIN_DEFAULT as f32,
                FloatRange::Linear {
                    min: OUTPUT_GAIN_MIN as f32,
                    max: OUTPUT_GAIN_MAX as f32,
                },
            )
            .with_step_size(0.001)
            .with_value_to_string(Arc::new(format_gain)),

            attack: FloatParam::new(
                "Attack",
                default_attack_knob() as f32,
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_step_size(0.0001)
            .with_value_to_string(Arc::new(format_coeff)),

            release: FloatParam::new(
                "Release",
                default_release_knob() as f32,
                FloatRange::Linear { min: 0.0, max: 1.0 },
            )
            .with_step_size(0.0001)
            .with_value_to_string(Arc::new(format_coeff)),

            release_law: EnumParam::new("Release Law", ReleaseLaw::Power),
        }
    }
}

impl AutoLevelParams {
    /// One read per scalar; each parameter is atomic on its own.
    pub fn snapshot(&self) -> KnobPositions {
        KnobPositions {
            input_gain: self.input.value() as f64,
            output_gain: self.output.value() as f64,
            attack: self.attack.value() as f64,
            release: self.release.value() as f64,
            release_law: self.release_law.value(),
        }
    }
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------
pub struct AutoLevelPlugin {
    params: Arc<AutoLevelParams>,
    leveler: AutoLeveler,
    mapper: ControlMapper,
    meters: Arc<Meters>,
    sample_rate: f32,
}

impl Default for AutoLevelPlugin {
    fn default() -> Self {
        Self {
            params: Arc::new(AutoLevelParams::default()),
            leveler: AutoLeveler::new(),
            mapper: ControlMapper::new(),
            meters: Arc::new(Meters::new()),
            sample_rate: 44100.0,
        }
    }
}

impl AutoLevelPlugin {
    /// Meter readouts for a UI or host thread.
    pub fn meters(&self) -> Arc<Meters> {
        self.meters.clone()
    }

    fn process_internal(&mut self, buffer: &mut Buffer) -> ProcessStatus {
        let controls = self.mapper.update(self.params.snapshot());

        let channels = buffer.as_slice();
        if let [left, right, ..] = channels {
            let stats = self
                .leveler
                .process_block(&mut **left, &mut **right, &controls);
            self.meters.publish(&stats);
        }

        ProcessStatus::Normal
    }
}

impl Plugin for AutoLevelPlugin {
    const NAME: &'static str = "AutoLevel2";
    const VENDOR: &'static str = "Harmonious Records";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(2),
        main_output_channels: NonZeroU32::new(2),
        ..AudioIOLayout::const_default()
    }];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        self.sample_rate = buffer_config.sample_rate;
        self.leveler.reset();
        self.mapper = ControlMapper::new();
        self.meters.reset();

        log::info!(
            "AutoLevel initialized: {} Hz, max block {} samples",
            self.sample_rate,
            buffer_config.max_buffer_size
        );
        true
    }

    fn reset(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.leveler.reset();
            self.meters.reset();

            let recoveries = self.meters.take_recoveries();
            if recoveries > 0 {
                permit_alloc(|| {
                    log::warn!(
                        "leveler state went non-finite {} time(s) since last reset",
                        recoveries
                    );
                });
            }
        }))
        .unwrap_or(());
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.process_internal(buffer)
        }))
        .unwrap_or(ProcessStatus::Normal)
    }
}

impl ClapPlugin for AutoLevelPlugin {
    const CLAP_ID: &'static str = "com.harmonious-records.autolevel";
    const CLAP_DESCRIPTION: Option<&'static str> = Some("Stereo-linked auto leveler");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Compressor,
    ];
}

impl Vst3Plugin for AutoLevelPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"HarmoniousAutoL2";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Dynamics];
}

nih_export_clap!(AutoLevelPlugin);
nih_export_vst3!(AutoLevelPlugin);
