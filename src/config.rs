//! Configuration types for the benchmark harness.

use crate::piper_dirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Voice used when none is given.
pub const DEFAULT_VOICE: &str = "en_US-lessac-high";

/// Base URL that catalog file paths are resolved against.
pub const DEFAULT_VOICES_URL: &str = "https://huggingface.co/rhasspy/piper-voices/resolve/v1.0.0";

/// Top-level benchmark settings.
///
/// Every field can also be set from the command line; CLI flags win over
/// values loaded with [`BenchConfig::from_file`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Catalog key, legacy alias, or path of the `.onnx` model.
    pub model: String,
    /// Path to the model's `.onnx.json` config (inferred from `model` when unset).
    pub config: Option<PathBuf>,
    /// Directory holding downloaded voices and the `voices.json` catalog.
    pub cache_dir: PathBuf,
    /// Base URL for the voice catalog and voice files.
    pub voices_url: String,
    /// Prompt to synthesize (the built-in passage when unset).
    pub prompt: Option<String>,
    /// WAV file written by every run (`piper-<model>.wav` when unset).
    pub output: Option<PathBuf>,
    /// Number of benchmark iterations.
    pub runs: usize,
    /// Request the CUDA execution provider.
    pub use_cuda: bool,
    /// Enable ONNX Runtime debug logging.
    pub verbose: bool,
    /// Parameters passed to every synthesis call.
    pub synthesis: SynthesisConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_VOICE.to_owned(),
            config: None,
            cache_dir: piper_dirs::cache_dir(),
            voices_url: DEFAULT_VOICES_URL.to_owned(),
            prompt: None,
            output: None,
            runs: 5,
            use_cuda: true,
            verbose: false,
            synthesis: SynthesisConfig::default(),
        }
    }
}

/// Per-call synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Speaker id for multi-speaker voices (ignored otherwise).
    pub speaker_id: u32,
    /// Phoneme duration multiplier; larger is slower speech.
    pub length_scale: f32,
    /// Noise added to the generator.
    pub noise_scale: f32,
    /// Phoneme width variation.
    pub noise_w: f32,
    /// Seconds of silence appended after each sentence.
    pub sentence_silence: f32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            speaker_id: 0,
            length_scale: 1.0,
            noise_scale: 0.667,
            noise_w: 0.8,
            sentence_silence: 0.2,
        }
    }
}

impl BenchConfig {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::BenchError::Config(e.to_string()))
    }

    /// Check values that would otherwise fail deep inside a run.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`](crate::error::BenchError::Config) describing the first bad value.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::BenchError;

        if self.model.trim().is_empty() {
            return Err(BenchError::Config("model must not be empty".into()));
        }
        let s = &self.synthesis;
        if !(s.length_scale.is_finite() && s.length_scale > 0.0) {
            return Err(BenchError::Config(format!(
                "length scale must be positive, got {}",
                s.length_scale
            )));
        }
        if !(s.sentence_silence.is_finite() && s.sentence_silence >= 0.0) {
            return Err(BenchError::Config(format!(
                "sentence silence must be non-negative, got {}",
                s.sentence_silence
            )));
        }
        if !s.noise_scale.is_finite() || !s.noise_w.is_finite() {
            return Err(BenchError::Config("noise parameters must be finite".into()));
        }
        Ok(())
    }
}
