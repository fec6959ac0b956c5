//! Voice config (`<voice>.onnx.json`) written by Piper's training export.

use crate::error::{BenchError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Phoneme → id sequence mapping.
pub type PhonemeIdMap = HashMap<String, Vec<i64>>;

/// Parsed voice config.
#[derive(Debug, Clone, Deserialize)]
pub struct PiperConfig {
    pub audio: AudioConfig,
    #[serde(default)]
    pub espeak: EspeakConfig,
    #[serde(default = "default_num_speakers")]
    pub num_speakers: u32,
    #[serde(default)]
    pub speaker_id_map: HashMap<String, u32>,
    #[serde(default)]
    pub phoneme_type: PhonemeType,
    pub phoneme_id_map: PhonemeIdMap,
}

fn default_num_speakers() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspeakConfig {
    pub voice: String,
}

impl Default for EspeakConfig {
    fn default() -> Self {
        Self {
            voice: "en-us".to_owned(),
        }
    }
}

/// How text becomes phonemes for this voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhonemeType {
    /// IPA phonemes from a grapheme-to-phoneme model.
    #[default]
    Espeak,
    /// Characters of the text are used directly.
    Text,
}

impl PiperConfig {
    /// Parse a config from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] on malformed or incomplete JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BenchError::Config(format!("invalid voice config: {e}")))?;
        for required in [super::BOS, super::EOS, super::PAD] {
            if !config.phoneme_id_map.contains_key(required) {
                return Err(BenchError::Config(format!(
                    "voice config phoneme_id_map lacks '{required}'"
                )));
            }
        }
        if config.audio.sample_rate == 0 {
            return Err(BenchError::Config("voice sample rate is zero".into()));
        }
        Ok(config)
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!("failed to read voice config {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Whether the espeak voice selects British English.
    pub fn is_british(&self) -> bool {
        self.espeak.voice.to_ascii_lowercase().starts_with("en-gb")
    }

    /// Whether the espeak voice is any variant of English.
    pub fn is_english(&self) -> bool {
        let voice = self.espeak.voice.to_ascii_lowercase();
        voice == "en" || voice.starts_with("en-") || voice.starts_with("en_")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "audio": {"sample_rate": 22050, "quality": "high"},
        "espeak": {"voice": "en-us"},
        "inference": {"noise_scale": 0.667, "length_scale": 1, "noise_w": 0.8},
        "phoneme_type": "espeak",
        "phoneme_map": {},
        "phoneme_id_map": {
            "_": [0], "^": [1], "$": [2], " ": [3], "!": [4], ",": [8], ".": [10],
            "d": [17], "h": [20], "l": [24], "o": [27], "w": [35],
            "ə": [59], "ɜ": [62], "ʊ": [100], "ˈ": [120], "ː": [122]
        },
        "num_symbols": 256,
        "num_speakers": 1,
        "speaker_id_map": {},
        "piper_version": "1.0.0"
    }"#;

    #[test]
    fn parses_voice_config() {
        let config = PiperConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.audio.sample_rate, 22050);
        assert_eq!(config.num_speakers, 1);
        assert_eq!(config.phoneme_type, PhonemeType::Espeak);
        assert_eq!(config.phoneme_id_map["ə"], vec![59]);
        assert!(config.is_english());
        assert!(!config.is_british());
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config = PiperConfig::from_json(
            r#"{"audio": {"sample_rate": 16000},
                "phoneme_type": "text",
                "phoneme_id_map": {"_": [0], "^": [1], "$": [2]}}"#,
        )
        .unwrap();
        assert_eq!(config.espeak.voice, "en-us");
        assert_eq!(config.phoneme_type, PhonemeType::Text);
        assert_eq!(config.num_speakers, 1);
    }

    #[test]
    fn missing_special_phonemes_are_rejected() {
        let err = PiperConfig::from_json(
            r#"{"audio": {"sample_rate": 16000}, "phoneme_id_map": {"_": [0]}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("lacks"));
    }

    #[test]
    fn british_detection() {
        let mut config = PiperConfig::from_json(SAMPLE).unwrap();
        config.espeak.voice = "en-gb-x-rp".into();
        assert!(config.is_british());
        config.espeak.voice = "de".into();
        assert!(!config.is_english());
    }

    #[test]
    fn from_file_reports_path() {
        let err = PiperConfig::from_file(Path::new("/nonexistent/v.onnx.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/v.onnx.json"));
    }
}
