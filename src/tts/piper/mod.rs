//! Piper VITS voices: JSON config, phonemization, ONNX inference.

pub mod config;
mod engine;
pub mod phonemize;

pub use config::PiperConfig;
pub use engine::{PiperVoice, audio_float_to_int16, default_config_path, phonemes_to_ids};

/// Beginning-of-utterance phoneme.
pub const BOS: &str = "^";
/// End-of-utterance phoneme.
pub const EOS: &str = "$";
/// Padding phoneme interleaved after every phoneme.
pub const PAD: &str = "_";
