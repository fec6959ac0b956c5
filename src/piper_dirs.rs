//! Filesystem locations used by the harness.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Environment Overrides
//!
//! - `PIPER_CACHE`: overrides [`cache_dir`]

use std::path::{Path, PathBuf};

/// Environment variable holding the default voice cache directory.
pub const CACHE_ENV: &str = "PIPER_CACHE";

/// Voice cache directory.
///
/// Downloaded `.onnx` models, their `.onnx.json` configs and the
/// `voices.json` catalog all live directly in this directory.
///
/// Resolves to `dirs::cache_dir()/piper/` by default. Override with
/// the `PIPER_CACHE` environment variable.
#[must_use]
pub fn cache_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os(CACHE_ENV) {
        return PathBuf::from(override_dir);
    }
    dirs::cache_dir()
        .map(|d| d.join("piper"))
        .unwrap_or_else(|| PathBuf::from("/tmp/piper-cache"))
}

/// Path of the cached voice catalog inside `cache`.
#[must_use]
pub fn voices_file(cache: &Path) -> PathBuf {
    cache.join("voices.json")
}
