use anyhow::{bail, Context, Result};
use clap::Parser;
use autolevel::dsp::utils::lin_to_db;
use autolevel::dsp::{AutoLeveler, ControlMapper, ReleaseLaw, SharedControls};
use autolevel::meters::Meters;
use autolevel::presets::{DEFAULT_PRESET, FACTORY_PRESETS};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::{Path, PathBuf};

const BLOCK_FRAMES: usize = 512;

/// Render a WAV file through the auto-leveler.
#[derive(Parser, Debug)]
#[command(name = "autolevel_render", version, about)]
struct Args {
    /// Input WAV (mono is duplicated to both sides)
    input: PathBuf,

    /// Output WAV, written as 32-bit float stereo
    output: PathBuf,

    /// Factory preset to render with
    #[arg(long, default_value = DEFAULT_PRESET)]
    preset: String,

    /// Use the blended release law instead of the preset's
    #[arg(long)]
    blended: bool,
}

/// Reads any PCM/float WAV into two f32 channels. Mono is duplicated.
fn read_stereo(path: &Path) -> Result<(Vec<f32>, Vec<f32>, u32)> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open input WAV '{}'", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        bail!("'{}' has no channels", path.display());
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .context("failed to decode float samples")?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("failed to decode integer samples")?
        }
    };

    let frames = interleaved.len() / channels;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in interleaved.chunks_exact(channels) {
        left.push(frame[0]);
        right.push(if channels > 1 { frame[1] } else { frame[0] });
    }
    Ok((left, right, spec.sample_rate))
}

/// Writes two channels as interleaved 32-bit float stereo.
fn write_stereo(path: &Path, left: &[f32], right: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create output WAV '{}'", path.display()))?;
    for (&l, &r) in left.iter().zip(right.iter()) {
        writer
            .write_sample(l)
            .and_then(|_| writer.write_sample(r))
            .with_context(|| format!("failed to write '{}'", path.display()))?;
    }
    writer.finalize().context("failed to finalize output WAV")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut knobs = FACTORY_PRESETS.knobs(&args.preset).with_context(|| {
        format!(
            "unknown preset '{}' (available: {})",
            args.preset,
            FACTORY_PRESETS.names().join(", ")
        )
    })?;
    if args.blended {
        knobs.release_law = ReleaseLaw::Blended;
    }
    let controls = SharedControls::new(knobs);

    let (mut left, mut right, sample_rate) = read_stereo(&args.input)?;

    let mut leveler = AutoLeveler::new();
    let mut mapper = ControlMapper::new();
    let meters = Meters::new();
    let mut input_peak = 0.0f32;
    let mut output_peak = 0.0f32;

    for (l, r) in left
        .chunks_mut(BLOCK_FRAMES)
        .zip(right.chunks_mut(BLOCK_FRAMES))
    {
        let mapped = mapper.update(controls.snapshot());
        let stats = leveler.process_block(l, r, &mapped);
        meters.publish(&stats);
        input_peak = input_peak.max(stats.input_peak_l.max(stats.input_peak_r));
        output_peak = output_peak.max(stats.output_peak_l.max(stats.output_peak_r));
    }

    write_stereo(&args.output, &left, &right, sample_rate)?;

    let last = meters.snapshot();
    println!("Render summary for '{}':", args.input.display());
    println!("  preset           : {}", args.preset);
    println!("  release law      : {:?}", knobs.release_law);
    println!("  frames processed : {}", left.len());
    println!("  input peak       : {:.2} dBFS", lin_to_db(input_peak));
    println!("  output peak      : {:.2} dBFS", lin_to_db(output_peak));
    println!("  final level      : {:.4}", last.linked_level);
    println!("  recoveries       : {}", meters.take_recoveries());
    Ok(())
}
