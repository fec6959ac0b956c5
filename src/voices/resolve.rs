//! Voice name → model and config paths.

use super::catalog::{fetch_voices_or_cached, with_aliases};
use super::download::{Downloader, ensure_voice_exists, find_voice};
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths handed to the voice loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVoice {
    /// The `.onnx` model.
    pub model: PathBuf,
    /// Explicit or discovered `.onnx.json`; `None` lets the loader infer it.
    pub config: Option<PathBuf>,
}

/// Resolve `model` to files on disk, downloading the voice if needed.
///
/// `cache_dir/model` (or `model` itself) naming an existing file is used
/// as-is without touching the network. Otherwise the catalog is refreshed
/// (falling back to the cached copy), aliases are merged, the voice's files
/// are ensured in `cache_dir` and located there. An explicit `config`
/// always wins over the discovered one.
///
/// # Errors
///
/// Returns an error if the catalog is unavailable, the voice is unknown,
/// or a download fails.
pub fn resolve_voice<D: Downloader + ?Sized>(
    model: &str,
    config: Option<&Path>,
    cache_dir: &Path,
    base_url: &str,
    downloader: &D,
) -> Result<ResolvedVoice> {
    let cached = cache_dir.join(model);
    for candidate in [cached.as_path(), Path::new(model)] {
        if candidate.is_file() {
            info!("using voice file {}", candidate.display());
            return Ok(ResolvedVoice {
                model: candidate.to_path_buf(),
                config: config.map(Path::to_path_buf),
            });
        }
    }

    std::fs::create_dir_all(cache_dir)?;
    let catalog = with_aliases(fetch_voices_or_cached(cache_dir, base_url, downloader)?);

    let data_dirs = [cache_dir.to_path_buf()];
    let key = ensure_voice_exists(model, &data_dirs, cache_dir, &catalog, base_url, downloader)?;
    let (model_path, config_path) = find_voice(&key, &data_dirs)?;

    Ok(ResolvedVoice {
        model: model_path,
        config: Some(config.map_or(config_path, Path::to_path_buf)),
    })
}
