//! CLI binary: download, load and benchmark a Piper voice.

use clap::Parser;
use piper_bench::bench::{self, BenchPlan, DEFAULT_PROMPT};
use piper_bench::voices::HttpDownloader;
use piper_bench::{BenchConfig, PiperVoice};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Benchmark a Piper TTS voice with ONNX Runtime.
#[derive(Parser, Debug)]
#[command(name = "piper-bench", version, about)]
struct Cli {
    /// TOML settings file; flags below override its values.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Model path or name to download [default: en_US-lessac-high].
    #[arg(long)]
    model: Option<String>,

    /// Path to the model's json config (inferred from --model if unspecified).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Location to save downloaded models [default: $PIPER_CACHE].
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Speaker ID from the voice to use [default: 0].
    #[arg(long)]
    speaker: Option<u32>,

    /// Speaking speed [default: 1.0].
    #[arg(long)]
    length_scale: Option<f32>,

    /// Noise added to the generator [default: 0.667].
    #[arg(long)]
    noise_scale: Option<f32>,

    /// Phoneme width variation [default: 0.8].
    #[arg(long)]
    noise_w: Option<f32>,

    /// Seconds of silence after each sentence [default: 0.2].
    #[arg(long)]
    sentence_silence: Option<f32>,

    /// Test prompt to generate (a built-in passage if unspecified).
    #[arg(long)]
    prompt: Option<String>,

    /// Output wav file (piper-$MODEL.wav if unspecified).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of benchmarking iterations [default: 5].
    #[arg(long)]
    runs: Option<usize>,

    /// Disable CUDA and use CPU for inference instead.
    #[arg(long)]
    disable_cuda: bool,

    /// Enable ONNX Runtime debug logging.
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    /// Layer the flags over the settings file (or defaults).
    fn into_config(self) -> anyhow::Result<BenchConfig> {
        let mut config = match &self.settings {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };

        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(path) = self.config {
            config.config = Some(path);
        }
        if let Some(cache) = self.cache {
            config.cache_dir = cache;
        }
        if let Some(prompt) = self.prompt {
            config.prompt = Some(prompt);
        }
        if let Some(output) = self.output {
            config.output = Some(output);
        }
        if let Some(runs) = self.runs {
            config.runs = runs;
        }
        if self.disable_cuda {
            config.use_cuda = false;
        }
        if self.verbose {
            config.verbose = true;
        }

        let s = &mut config.synthesis;
        if let Some(v) = self.speaker {
            s.speaker_id = v;
        }
        if let Some(v) = self.length_scale {
            s.length_scale = v;
        }
        if let Some(v) = self.noise_scale {
            s.noise_scale = v;
        }
        if let Some(v) = self.noise_w {
            s.noise_w = v;
        }
        if let Some(v) = self.sentence_silence {
            s.sentence_silence = v;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config()?;

    // Users can override with RUST_LOG=debug to see everything.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(config.verbose))),
        )
        .init();

    println!("{config:?}");
    run(config)
}

/// Log filter used when `RUST_LOG` is unset; `--verbose` opens up ONNX Runtime.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "piper_bench=debug,ort=debug"
    } else {
        "piper_bench=info,ort=warn"
    }
}

fn run(config: BenchConfig) -> anyhow::Result<()> {
    let downloader = HttpDownloader::new();

    // Phase 1: resolve (and download) the voice
    let resolved = piper_bench::resolve_voice(
        &config.model,
        config.config.as_deref(),
        &config.cache_dir,
        &config.voices_url,
        &downloader,
    )?;

    // Phase 2: load
    println!("Loading {}", resolved.model.display());
    let mut voice =
        PiperVoice::load(&resolved.model, resolved.config.as_deref(), config.use_cuda)?;

    // Phase 3: timed runs
    let plan = BenchPlan {
        model_name: bench::model_stem(&resolved.model.to_string_lossy()),
        prompt: config
            .prompt
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROMPT.to_owned()),
        output: config
            .output
            .unwrap_or_else(|| bench::default_output_path(&config.model)),
        runs: config.runs,
        synthesis: config.synthesis,
    };
    info!("running {} iterations", plan.runs);

    bench::run_benchmark(&mut voice, &plan, |report| println!("{report}\n"))?;
    Ok(())
}
