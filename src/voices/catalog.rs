//! The Piper voice catalog (`voices.json`).

use super::download::Downloader;
use crate::error::{BenchError, Result};
use crate::piper_dirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Voice catalog keyed by voice name (e.g. `en_US-lessac-high`).
pub type Catalog = BTreeMap<String, VoiceInfo>;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Canonical voice key, `<language>-<name>-<quality>`.
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub quality: String,
    #[serde(default = "default_num_speakers")]
    pub num_speakers: u32,
    #[serde(default)]
    pub speaker_id_map: BTreeMap<String, u32>,
    /// Repository-relative path → size and digest.
    #[serde(default)]
    pub files: BTreeMap<String, FileInfo>,
    /// Legacy names this voice was published under.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Set on entries inserted by [`with_aliases`].
    #[serde(rename = "_is_alias", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_alias: bool,
}

fn default_num_speakers() -> u32 {
    1
}

/// Language block of a catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Language {
    pub code: String,
    pub family: String,
    pub region: String,
    pub name_native: String,
    pub name_english: String,
    pub country_english: String,
}

/// Expected size and digest of one voice file.
///
/// Both are always present in the published catalog; the bundled snapshot
/// lists paths only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileInfo {
    pub size_bytes: Option<u64>,
    pub md5_digest: Option<String>,
}

/// Catalog snapshot compiled into the binary, used when neither the remote
/// catalog nor a cached copy is available.
const BUNDLED_VOICES: &str = include_str!("voices_fallback.json");

/// Parse a catalog from its JSON text.
///
/// # Errors
///
/// Returns [`BenchError::Catalog`] on malformed JSON.
pub fn parse_voices(json: &str) -> Result<Catalog> {
    serde_json::from_str(json).map_err(|e| BenchError::Catalog(format!("invalid voices.json: {e}")))
}

/// Load the catalog cached in `download_dir`.
///
/// # Errors
///
/// Returns [`BenchError::Catalog`] if there is no cached copy or it cannot be parsed.
pub fn load_voices(download_dir: &Path) -> Result<Catalog> {
    let path = piper_dirs::voices_file(download_dir);
    let json = std::fs::read_to_string(&path).map_err(|e| {
        BenchError::Catalog(format!(
            "no usable voice catalog at {}: {e}",
            path.display()
        ))
    })?;
    let catalog = parse_voices(&json)?;
    info!("loaded {} voices from {}", catalog.len(), path.display());
    Ok(catalog)
}

/// Refresh the cached catalog from `base_url`, then load it.
///
/// # Errors
///
/// Returns an error if the refresh fails or the cached copy cannot be loaded.
pub fn fetch_voices<D: Downloader + ?Sized>(
    download_dir: &Path,
    base_url: &str,
    downloader: &D,
) -> Result<Catalog> {
    let url = file_url(base_url, "voices.json");
    info!("downloading voice catalog from {url}");
    downloader.download(&url, &piper_dirs::voices_file(download_dir))?;
    load_voices(download_dir)
}

/// The catalog snapshot compiled into the binary.
///
/// # Errors
///
/// Returns [`BenchError::Catalog`] if the snapshot does not parse.
pub fn bundled_voices() -> Result<Catalog> {
    parse_voices(BUNDLED_VOICES)
}

/// Refresh the catalog, falling back to the cached copy and then to the
/// bundled snapshot when the refresh fails.
///
/// # Errors
///
/// Returns an error only if the bundled snapshot is unusable.
pub fn fetch_voices_or_cached<D: Downloader + ?Sized>(
    download_dir: &Path,
    base_url: &str,
    downloader: &D,
) -> Result<Catalog> {
    match fetch_voices(download_dir, base_url, downloader) {
        Ok(catalog) => Ok(catalog),
        Err(e) => {
            println!("Failed to download Piper voice list ({e})");
            load_voices(download_dir).or_else(|e| {
                warn!("{e}; using bundled voice list");
                bundled_voices()
            })
        }
    }
}

/// Add an entry for every legacy alias so old voice names still resolve.
///
/// Alias entries are copies of their voice with `is_alias` set, and replace
/// any existing entry of the same name.
pub fn with_aliases(mut catalog: Catalog) -> Catalog {
    let aliases: Vec<(String, VoiceInfo)> = catalog
        .values()
        .flat_map(|voice| {
            voice.aliases.iter().map(move |alias| {
                let mut entry = voice.clone();
                entry.is_alias = true;
                (alias.clone(), entry)
            })
        })
        .collect();
    catalog.extend(aliases);
    catalog
}

/// Join a catalog-relative path onto the base URL.
pub fn file_url(base_url: &str, file: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), file.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    const SAMPLE: &str = r#"{
        "en_US-lessac-high": {
            "key": "en_US-lessac-high",
            "name": "lessac",
            "language": {"code": "en_US", "family": "en", "region": "US"},
            "quality": "high",
            "num_speakers": 1,
            "speaker_id_map": {},
            "files": {
                "en/en_US/lessac/high/en_US-lessac-high.onnx": {"size_bytes": 4, "md5_digest": "abc"},
                "en/en_US/lessac/high/en_US-lessac-high.onnx.json": {"size_bytes": 2, "md5_digest": "def"}
            },
            "aliases": ["en-us-lessac-high"]
        },
        "en_GB-vctk-medium": {
            "key": "en_GB-vctk-medium",
            "name": "vctk",
            "quality": "medium",
            "num_speakers": 109,
            "speaker_id_map": {"p239": 0, "p236": 1},
            "files": {},
            "aliases": ["en-gb-vctk-medium", "vctk"]
        }
    }"#;

    #[test]
    fn parses_catalog_entries() {
        let catalog = parse_voices(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        let lessac = &catalog["en_US-lessac-high"];
        assert_eq!(lessac.language.code, "en_US");
        assert_eq!(lessac.files.len(), 2);
        assert!(!lessac.is_alias);
        assert_eq!(catalog["en_GB-vctk-medium"].speaker_id_map["p236"], 1);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_voices("[1, 2"), Err(BenchError::Catalog(_))));
    }

    #[test]
    fn aliases_are_merged_as_copies() {
        let catalog = with_aliases(parse_voices(SAMPLE).unwrap());
        assert_eq!(catalog.len(), 5);

        let alias = &catalog["en-us-lessac-high"];
        assert!(alias.is_alias);
        assert_eq!(alias.key, "en_US-lessac-high");
        assert_eq!(alias.files, catalog["en_US-lessac-high"].files);

        assert!(catalog["vctk"].is_alias);
        assert!(!catalog["en_GB-vctk-medium"].is_alias);
    }

    #[test]
    fn alias_overwrites_existing_key() {
        let mut catalog = parse_voices(SAMPLE).unwrap();
        let mut clash = catalog["en_US-lessac-high"].clone();
        clash.key = "vctk".to_owned();
        clash.aliases.clear();
        catalog.insert("vctk".to_owned(), clash);

        let merged = with_aliases(catalog);
        assert_eq!(merged["vctk"].key, "en_GB-vctk-medium");
    }

    #[test]
    fn load_voices_without_cache_is_catalog_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_voices(dir.path()), Err(BenchError::Catalog(_))));
    }

    #[test]
    fn alias_marker_is_not_serialized_for_real_voices() {
        let catalog = parse_voices(SAMPLE).unwrap();
        let json = serde_json::to_string(&catalog["en_US-lessac-high"]).unwrap();
        assert!(!json.contains("_is_alias"));
    }

    #[test]
    fn bundled_snapshot_has_default_voice() {
        let catalog = bundled_voices().unwrap();
        let voice = &catalog[crate::config::DEFAULT_VOICE];
        assert_eq!(voice.files.len(), 2);
        assert!(voice.files.values().all(|f| f.md5_digest.is_none()));
        for (key, voice) in &catalog {
            assert_eq!(key, &voice.key);
            assert!(voice.files.keys().any(|f| f.ends_with(&format!("/{key}.onnx"))));
        }
    }

    #[test]
    fn file_url_joins_without_double_slashes() {
        assert_eq!(
            file_url("https://example.com/voices/", "/en/a.onnx"),
            "https://example.com/voices/en/a.onnx"
        );
        assert_eq!(file_url("http://h", "voices.json"), "http://h/voices.json");
    }
}
