//! Timed synthesis loop and per-run reports.

use crate::config::SynthesisConfig;
use crate::error::{BenchError, Result};
use std::fmt;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Prompt used when none is given.
pub const DEFAULT_PROMPT: &str = "A rainbow is a meteorological phenomenon that is caused by reflection, refraction and dispersion of light in water droplets resulting in a spectrum of light appearing in the sky.
It takes the form of a multi-colored circular arc.
Rainbows caused by sunlight always appear in the section of sky directly opposite the Sun.
With tenure, Suzie\u{2019}d have all the more leisure for yachting, but her publications are no good.
Shaw, those twelve beige hooks are joined if I patch a young, gooey mouth.
Are those shy Eurasian footwear, cowboy chaps, or jolly earthmoving headgear?
The beige hue on the waters of the loch impressed all, including the French queen, before she heard that symphony again, just as young Arthur wanted.
";

/// Something that renders text into a WAV stream.
pub trait Synthesizer {
    /// Format of the audio written by [`Synthesizer::synthesize`].
    fn wav_spec(&self) -> hound::WavSpec;

    /// Write the audio for `text` into `wav`.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis or the write fails.
    fn synthesize<W: Write + Seek>(
        &mut self,
        text: &str,
        wav: &mut hound::WavWriter<W>,
        params: &SynthesisConfig,
    ) -> Result<()>;
}

/// What to run.
#[derive(Debug, Clone)]
pub struct BenchPlan {
    /// Label printed in every report (model file stem).
    pub model_name: String,
    pub prompt: String,
    /// Overwritten by every run.
    pub output: PathBuf,
    pub runs: usize,
    pub synthesis: SynthesisConfig,
}

/// Timing of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub model_name: String,
    pub output: PathBuf,
    /// Wall-clock seconds spent in synthesis.
    pub inference_secs: f64,
    /// Seconds of audio produced.
    pub audio_secs: f64,
}

impl RunReport {
    /// Inference time / audio time. Below 1.0 is faster than realtime.
    pub fn realtime_factor(&self) -> f64 {
        self.inference_secs / self.audio_secs
    }

    /// Audio time / inference time.
    pub fn inverse_realtime_factor(&self) -> f64 {
        self.audio_secs / self.inference_secs
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Piper TTS model:    {}", self.model_name)?;
        writeln!(f, "Output saved to:    {}", self.output.display())?;
        writeln!(f, "Inference duration: {:.3} sec", self.inference_secs)?;
        writeln!(f, "Audio duration:     {:.3} sec", self.audio_secs)?;
        writeln!(f, "Realtime factor:    {:.3}", self.realtime_factor())?;
        write!(f, "Inverse RTF (RTFX): {:.3}", self.inverse_realtime_factor())
    }
}

/// File stem of a model name or path: `dir/en_US-x-high.onnx` → `en_US-x-high`.
pub fn model_stem(model: &str) -> String {
    Path::new(model)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| model.to_owned())
}

/// `piper-<model stem>.wav`.
pub fn default_output_path(model: &str) -> PathBuf {
    PathBuf::from(format!("piper-{}.wav", model_stem(model)))
}

/// Run `plan.runs` timed syntheses, calling `on_report` after each.
///
/// Every run writes a fresh WAV file at `plan.output`; its frame count and
/// sample rate are read back from disk to compute the audio duration. When
/// the output is not a regular file (`/dev/null`, a pipe) nothing can be read
/// back, and the frames counted by the writer are used instead.
///
/// # Errors
///
/// Returns the first synthesis, I/O, or WAV error, or
/// [`BenchError::Benchmark`] if a run produced no audio.
pub fn run_benchmark<S: Synthesizer>(
    synth: &mut S,
    plan: &BenchPlan,
    mut on_report: impl FnMut(&RunReport),
) -> Result<Vec<RunReport>> {
    if let Some(parent) = plan.output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut reports = Vec::with_capacity(plan.runs);
    for run in 0..plan.runs {
        let spec = synth.wav_spec();
        let mut wav = hound::WavWriter::create(&plan.output, spec)?;

        let start = Instant::now();
        synth.synthesize(&plan.prompt, &mut wav, &plan.synthesis)?;
        let inference_secs = start.elapsed().as_secs_f64();
        let written = wav.duration();
        wav.finalize()?;

        let (frames, rate) = if is_regular_file(&plan.output) {
            read_wav_length(&plan.output)?
        } else {
            debug!("{} is not a regular file, using writer frame count", plan.output.display());
            (written, spec.sample_rate)
        };
        if frames == 0 || rate == 0 {
            return Err(BenchError::Benchmark(format!(
                "run {} produced no audio",
                run + 1
            )));
        }
        debug!("run {}: {frames} frames at {rate} Hz", run + 1);

        let report = RunReport {
            model_name: plan.model_name.clone(),
            output: plan.output.clone(),
            inference_secs,
            audio_secs: f64::from(frames) / f64::from(rate),
        };
        info!(
            "run {}/{}: rtf={:.3}",
            run + 1,
            plan.runs,
            report.realtime_factor()
        );
        on_report(&report);
        reports.push(report);
    }
    Ok(reports)
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file())
}

/// Frame count and sample rate of a WAV file.
fn read_wav_length(path: &Path) -> Result<(u32, u32)> {
    let reader = hound::WavReader::open(path)?;
    Ok((reader.duration(), reader.spec().sample_rate))
}
