//! piper-bench: benchmarking harness for Piper text-to-speech voices.
//!
//! # Architecture
//!
//! One linear pipeline, each phase a separate module:
//! - **Voices**: resolves a voice name through the `voices.json` catalog and
//!   downloads missing files into the cache
//! - **TTS**: loads the voice's ONNX model and synthesizes 16-bit WAV
//! - **Bench**: times repeated synthesis and reports realtime factors

pub mod bench;
pub mod config;
pub mod error;
pub mod model_integrity;
pub mod piper_dirs;
pub mod tts;
pub mod voices;

pub use bench::{BenchPlan, RunReport, Synthesizer, run_benchmark};
pub use config::{BenchConfig, SynthesisConfig};
pub use error::{BenchError, Result};
pub use tts::PiperVoice;
pub use voices::{ResolvedVoice, resolve_voice};
