//! Text-to-speech synthesis using Piper voices.
//!
//! Runs Piper's exported VITS ONNX models through ONNX Runtime and writes
//! 16-bit mono PCM at the voice's sample rate.

mod piper;

pub use piper::{
    BOS, EOS, PAD, PiperConfig, PiperVoice, audio_float_to_int16, config, default_config_path,
    phonemes_to_ids, phonemize,
};
