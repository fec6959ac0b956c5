//! Piper voice catalog, downloads, and cache resolution.
//!
//! Voices are published as `<key>.onnx` + `<key>.onnx.json` pairs listed in
//! a `voices.json` catalog. Everything is cached flat in one directory.

pub mod catalog;
pub mod download;
mod resolve;

pub use catalog::{Catalog, VoiceInfo, fetch_voices, load_voices, with_aliases};
pub use download::{Downloader, HttpDownloader, ensure_voice_exists, find_voice};
pub use resolve::{ResolvedVoice, resolve_voice};
