//! Piper ONNX inference engine.
//!
//! Phonemize → phoneme ids → VITS ONNX inference → int16 PCM at the
//! voice's native sample rate.

use super::config::{PhonemeIdMap, PiperConfig};
use super::phonemize::Phonemizer;
use super::{BOS, EOS, PAD};
use crate::bench::Synthesizer;
use crate::config::SynthesisConfig;
use crate::error::{BenchError, Result};
use ort::session::Session;
use ort::session::builder::SessionBuilder;
use ort::value::Tensor;
use std::collections::{HashMap, HashSet};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Peak value int16 samples are normalized to.
const MAX_WAV_VALUE: f32 = 32767.0;

/// A loaded Piper voice.
pub struct PiperVoice {
    session: Session,
    config: PiperConfig,
    phonemizer: Phonemizer,
    /// Phonemes already reported as missing from the id map.
    unknown_phonemes: HashSet<char>,
}

impl PiperVoice {
    /// Load a voice from its `.onnx` model.
    ///
    /// `config_path` defaults to `<model>.json`. `use_cuda` requests the CUDA
    /// execution provider; builds without the `cuda` feature fall back to CPU.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed, the voice language is
    /// unsupported, or ONNX Runtime cannot load the model.
    pub fn load(model_path: &Path, config_path: Option<&Path>, use_cuda: bool) -> Result<Self> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_config_path(model_path));
        info!("loading voice config {}", config_path.display());
        let config = PiperConfig::from_file(&config_path)?;
        let phonemizer = Phonemizer::for_config(&config)?;

        info!("loading Piper ONNX model {}", model_path.display());
        let builder = Session::builder()
            .map_err(|e| BenchError::Inference(format!("failed to create session builder: {e}")))?;
        let builder = if use_cuda {
            with_cuda(builder)?
        } else {
            builder
        };
        let session = builder.commit_from_file(model_path).map_err(|e| {
            BenchError::Inference(format!(
                "failed to load ONNX model {}: {e}",
                model_path.display()
            ))
        })?;

        info!(
            "Piper voice ready (sample_rate={}, speakers={}, espeak={})",
            config.audio.sample_rate, config.num_speakers, config.espeak.voice
        );

        Ok(Self {
            session,
            config,
            phonemizer,
            unknown_phonemes: HashSet::new(),
        })
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.config.audio.sample_rate
    }

    /// Phonemize text into per-sentence phoneme lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the G2P fails.
    pub fn phonemize(&self, text: &str) -> Result<Vec<Vec<char>>> {
        self.phonemizer.phonemize(text)
    }

    /// Map phonemes to the model's input ids.
    ///
    /// Each phoneme missing from the voice's map is warned about once per
    /// voice, so only the first run pays for the log line.
    pub fn phonemes_to_ids(&mut self, phonemes: &[char]) -> Vec<i64> {
        let id_map = &self.config.phoneme_id_map;
        for phoneme in missing_phonemes(id_map, phonemes) {
            if self.unknown_phonemes.insert(phoneme) {
                warn!("missing phoneme from id map: {phoneme:?}");
            }
        }
        phonemes_to_ids(id_map, phonemes)
    }

    /// Run the model on one sentence of phoneme ids.
    ///
    /// # Errors
    ///
    /// Returns an error for an out-of-range speaker id or a failed inference.
    pub fn synthesize_ids_to_raw(
        &mut self,
        phoneme_ids: &[i64],
        params: &SynthesisConfig,
    ) -> Result<Vec<i16>> {
        use ort::session::{SessionInputValue, SessionInputs};

        let speaker = speaker_input(self.config.num_speakers, params.speaker_id)?;
        let seq_len = phoneme_ids.len();

        // input: shape [1, seq_len]
        let input = Tensor::from_array(([1_usize, seq_len], phoneme_ids.to_vec()))
            .map_err(|e| BenchError::Inference(format!("failed to create input tensor: {e}")))?;
        // input_lengths: shape [1]
        let input_lengths = Tensor::from_array(([1_usize], vec![seq_len as i64]))
            .map_err(|e| BenchError::Inference(format!("failed to create lengths tensor: {e}")))?;
        // scales: shape [3]
        let scales = Tensor::from_array((
            [3_usize],
            vec![params.noise_scale, params.length_scale, params.noise_w],
        ))
        .map_err(|e| BenchError::Inference(format!("failed to create scales tensor: {e}")))?;

        let mut feed: HashMap<String, SessionInputValue> = HashMap::new();
        feed.insert("input".to_string(), input.into());
        feed.insert("input_lengths".to_string(), input_lengths.into());
        feed.insert("scales".to_string(), scales.into());
        if let Some(sid) = speaker {
            let sid = Tensor::from_array(([1_usize], vec![sid]))
                .map_err(|e| BenchError::Inference(format!("failed to create sid tensor: {e}")))?;
            feed.insert("sid".to_string(), sid.into());
        }

        let outputs = self
            .session
            .run(SessionInputs::from(feed))
            .map_err(|e| BenchError::Inference(format!("ONNX inference failed: {e}")))?;

        // Output: shape [1, 1, num_samples]
        let (_shape, data) = outputs[0_usize]
            .try_extract_tensor::<f32>()
            .map_err(|e| BenchError::Inference(format!("failed to extract output tensor: {e}")))?;

        Ok(audio_float_to_int16(data))
    }

    /// Synthesize `text` into `wav`, one sentence at a time.
    ///
    /// Each sentence is followed by `sentence_silence` seconds of silence.
    ///
    /// # Errors
    ///
    /// Returns an error if phonemization, inference, or the WAV write fails.
    pub fn synthesize_to_wav<W: Write + Seek>(
        &mut self,
        text: &str,
        wav: &mut hound::WavWriter<W>,
        params: &SynthesisConfig,
    ) -> Result<()> {
        let silence_samples = silence_len(params.sentence_silence, self.sample_rate());

        for (i, phonemes) in self.phonemize(text)?.iter().enumerate() {
            let ids = self.phonemes_to_ids(phonemes);
            debug!("sentence {i}: {} phonemes, {} ids", phonemes.len(), ids.len());
            for sample in self.synthesize_ids_to_raw(&ids, params)? {
                wav.write_sample(sample)?;
            }
            for _ in 0..silence_samples {
                wav.write_sample(0_i16)?;
            }
        }
        Ok(())
    }
}

impl Synthesizer for PiperVoice {
    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn synthesize<W: Write + Seek>(
        &mut self,
        text: &str,
        wav: &mut hound::WavWriter<W>,
        params: &SynthesisConfig,
    ) -> Result<()> {
        self.synthesize_to_wav(text, wav, params)
    }
}

#[cfg(feature = "cuda")]
fn with_cuda(builder: SessionBuilder) -> Result<SessionBuilder> {
    use ort::execution_providers::CUDAExecutionProvider;

    info!("enabling CUDA execution provider");
    builder
        .with_execution_providers([CUDAExecutionProvider::default().build()])
        .map_err(|e| BenchError::Inference(format!("failed to enable CUDA: {e}")))
}

#[cfg(not(feature = "cuda"))]
fn with_cuda(builder: SessionBuilder) -> Result<SessionBuilder> {
    warn!("built without the `cuda` feature, running on CPU");
    Ok(builder)
}

/// `<model>.json`, e.g. `voice.onnx` → `voice.onnx.json`.
pub fn default_config_path(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

/// `^`, then every known phoneme followed by `_`, then `$`.
///
/// Phonemes missing from the map are skipped.
pub fn phonemes_to_ids(id_map: &PhonemeIdMap, phonemes: &[char]) -> Vec<i64> {
    fn lookup<'a>(id_map: &'a PhonemeIdMap, key: &str) -> &'a [i64] {
        id_map.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    let mut ids: Vec<i64> = lookup(id_map, BOS).to_vec();
    let pad = lookup(id_map, PAD);
    let mut buf = [0u8; 4];
    for phoneme in phonemes {
        if let Some(phoneme_ids) = id_map.get(&*phoneme.encode_utf8(&mut buf)) {
            ids.extend_from_slice(phoneme_ids);
            ids.extend_from_slice(pad);
        }
    }
    ids.extend_from_slice(lookup(id_map, EOS));
    ids
}

/// Distinct phonemes with no entry in `id_map`, in order of appearance.
pub fn missing_phonemes(id_map: &PhonemeIdMap, phonemes: &[char]) -> Vec<char> {
    let mut buf = [0u8; 4];
    let mut missing = Vec::new();
    for &phoneme in phonemes {
        if !id_map.contains_key(&*phoneme.encode_utf8(&mut buf)) && !missing.contains(&phoneme) {
            missing.push(phoneme);
        }
    }
    missing
}

/// Peak-normalize float audio to int16.
///
/// Quiet output (peak below 0.01) is scaled as if its peak were 0.01 so
/// that near-silence is not amplified into noise.
pub fn audio_float_to_int16(audio: &[f32]) -> Vec<i16> {
    let peak = audio.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
    let scale = MAX_WAV_VALUE / peak.max(0.01);
    audio
        .iter()
        .map(|s| (s * scale).clamp(-MAX_WAV_VALUE, MAX_WAV_VALUE) as i16)
        .collect()
}

/// Number of zero samples for `seconds` of silence.
fn silence_len(seconds: f32, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f32) as usize
}

/// The `sid` input value, present only for multi-speaker voices.
fn speaker_input(num_speakers: u32, speaker_id: u32) -> Result<Option<i64>> {
    if num_speakers <= 1 {
        return Ok(None);
    }
    if speaker_id >= num_speakers {
        return Err(BenchError::Inference(format!(
            "speaker id {speaker_id} out of range (voice has {num_speakers} speakers)"
        )));
    }
    Ok(Some(i64::from(speaker_id)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn id_map() -> PhonemeIdMap {
        super::super::config::PiperConfig::from_json(super::super::config::tests::SAMPLE)
            .unwrap()
            .phoneme_id_map
    }

    #[test]
    fn ids_are_wrapped_and_padded() {
        let ids = phonemes_to_ids(&id_map(), &['h', 'ə', 'l', 'o', 'ʊ']);
        assert_eq!(ids, vec![1, 20, 0, 59, 0, 24, 0, 27, 0, 100, 0, 2]);
    }

    #[test]
    fn unknown_phonemes_are_skipped() {
        let ids = phonemes_to_ids(&id_map(), &['h', 'Ω', '.']);
        assert_eq!(ids, vec![1, 20, 0, 10, 0, 2]);
    }

    #[test]
    fn missing_phonemes_are_listed_once() {
        let missing = missing_phonemes(&id_map(), &['h', '\u{200D}', 'Ω', '\u{200D}', '.']);
        assert_eq!(missing, vec!['\u{200D}', 'Ω']);
        assert!(missing_phonemes(&id_map(), &['h', 'ə']).is_empty());
    }

    #[test]
    fn empty_phonemes_only_bos_eos() {
        assert_eq!(phonemes_to_ids(&id_map(), &[]), vec![1, 2]);
    }

    #[test]
    fn int16_peak_normalizes() {
        let pcm = audio_float_to_int16(&[0.5, -0.25, 0.0]);
        assert_eq!(pcm, vec![32767, -16383, 0]);
    }

    #[test]
    fn int16_quiet_audio_is_not_amplified_past_floor() {
        let pcm = audio_float_to_int16(&[0.001, -0.001]);
        assert_eq!(pcm, vec![3276, -3276]);
    }

    #[test]
    fn int16_empty_input() {
        assert!(audio_float_to_int16(&[]).is_empty());
    }

    #[test]
    fn silence_length_from_seconds() {
        assert_eq!(silence_len(0.2, 22050), 4410);
        assert_eq!(silence_len(0.0, 22050), 0);
        assert_eq!(silence_len(-1.0, 22050), 0);
    }

    #[test]
    fn sid_only_for_multi_speaker_voices() {
        assert_eq!(speaker_input(1, 0).unwrap(), None);
        assert_eq!(speaker_input(1, 7).unwrap(), None);
        assert_eq!(speaker_input(4, 3).unwrap(), Some(3));
        assert!(speaker_input(4, 4).is_err());
    }

    #[test]
    fn default_config_path_appends_json() {
        assert_eq!(
            default_config_path(Path::new("/c/en_US-lessac-high.onnx")),
            PathBuf::from("/c/en_US-lessac-high.onnx.json")
        );
    }
}
