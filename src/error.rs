//! Error types for the benchmark harness.

/// Top-level error type for voice resolution, loading and benchmarking.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Settings file or CLI configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Voice catalog (`voices.json`) could not be fetched or parsed.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// The requested voice is not in the catalog.
    #[error("voice not found: {0}")]
    VoiceNotFound(String),

    /// Voice file download error.
    #[error("download error: {0}")]
    Download(String),

    /// A voice's files are missing or failed verification.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Text to phoneme conversion error.
    #[error("phonemize error: {0}")]
    Phonemize(String),

    /// ONNX model loading or inference error.
    #[error("inference error: {0}")]
    Inference(String),

    /// WAV read/write error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Benchmark loop error.
    #[error("benchmark error: {0}")]
    Benchmark(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hound::Error> for BenchError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => Self::Io(io),
            other => Self::Audio(other.to_string()),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BenchError>;
