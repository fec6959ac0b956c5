//! Text → sentences → phonemes.
//!
//! Espeak-type voices are phonemized with the `espeak-ng` program when it is
//! installed, and with the built-in `misaki-rs` English G2P otherwise. Either
//! way each sentence is phonemized clause by clause and the clause
//! punctuation is put back, since Piper voices are trained on IPA with
//! punctuation kept. Text-type voices use the characters themselves.

use super::config::{PhonemeType, PiperConfig};
use crate::error::{BenchError, Result};
use std::process::{Command, Stdio};
use tracing::info;

/// One sentence worth of phonemes.
pub type SentencePhonemes = Vec<char>;

/// Programs tried, in order, when looking for espeak.
const ESPEAK_PROGRAMS: &[&str] = &["espeak-ng", "espeak"];

/// Punctuation that ends a clause and is passed to the voice.
const CLAUSE_PUNCTUATION: &[char] = &[',', ';', ':', '.', '!', '?'];

/// Phonemizer chosen from a voice config.
pub enum Phonemizer {
    /// External espeak-ng process, any espeak language.
    Espeak(EspeakPhonemizer),
    /// Built-in English G2P.
    Misaki(misaki_rs::G2P),
    /// Codepoints of the input text.
    Text,
}

impl Phonemizer {
    /// Build the phonemizer a voice needs, preferring espeak-ng from `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Phonemize`] for non-English espeak voices when
    /// no espeak program is installed.
    pub fn for_config(config: &PiperConfig) -> Result<Self> {
        Self::with_espeak(config, find_espeak())
    }

    /// Like [`Phonemizer::for_config`], with the espeak program given
    /// explicitly (`None` means espeak is unavailable).
    ///
    /// # Errors
    ///
    /// See [`Phonemizer::for_config`].
    pub fn with_espeak(config: &PiperConfig, espeak_program: Option<&str>) -> Result<Self> {
        match (config.phoneme_type, espeak_program) {
            (PhonemeType::Text, _) => Ok(Self::Text),
            (PhonemeType::Espeak, Some(program)) => {
                info!("phonemizing with {program} (voice {})", config.espeak.voice);
                Ok(Self::Espeak(EspeakPhonemizer::new(
                    program,
                    &config.espeak.voice,
                )))
            }
            (PhonemeType::Espeak, None) if config.is_english() => {
                info!("espeak-ng not found, using built-in English G2P");
                Ok(Self::misaki(config))
            }
            (PhonemeType::Espeak, None) => Err(BenchError::Phonemize(format!(
                "espeak voice '{}' needs espeak-ng on PATH (built-in G2P is English only)",
                config.espeak.voice
            ))),
        }
    }

    /// Built-in English G2P, British when the voice is `en-gb*`.
    pub fn misaki(config: &PiperConfig) -> Self {
        let lang = if config.is_british() {
            misaki_rs::Language::EnglishGB
        } else {
            misaki_rs::Language::EnglishUS
        };
        Self::Misaki(misaki_rs::G2P::new(lang))
    }

    /// Split `text` into sentences and phonemize each one.
    ///
    /// Sentences that produce no phonemes are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the G2P fails.
    pub fn phonemize(&self, text: &str) -> Result<Vec<SentencePhonemes>> {
        let text = match self {
            Self::Text => text.to_owned(),
            Self::Espeak(_) | Self::Misaki(_) => normalize_text(text),
        };

        let mut sentences = Vec::new();
        for sentence in split_sentences(&text) {
            let phonemes: Vec<char> = match self {
                Self::Text => sentence.chars().collect(),
                Self::Espeak(_) | Self::Misaki(_) => self.phonemize_sentence(&sentence)?.chars().collect(),
            };
            if phonemes.iter().any(|c| !c.is_whitespace()) {
                sentences.push(phonemes);
            }
        }
        Ok(sentences)
    }

    /// IPA for one sentence, clause punctuation re-attached.
    fn phonemize_sentence(&self, sentence: &str) -> Result<String> {
        let mut out = String::new();
        for (clause, punctuation) in split_clauses(sentence) {
            let ipa = match self {
                Self::Espeak(espeak) => espeak.phonemize(clause)?,
                Self::Misaki(g2p) => {
                    let (ipa, _tokens) = g2p
                        .g2p(clause)
                        .map_err(|e| BenchError::Phonemize(format!("phonemization failed: {e}")))?;
                    ipa
                }
                Self::Text => clause.to_owned(),
            };
            let ipa = clean_ipa(&ipa);
            if ipa.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&ipa);
            out.push_str(punctuation);
        }
        Ok(out)
    }
}

/// Runs `espeak-ng -q --ipa -v <voice> <text>`.
#[derive(Debug, Clone)]
pub struct EspeakPhonemizer {
    program: String,
    voice: String,
}

impl EspeakPhonemizer {
    pub fn new(program: &str, voice: &str) -> Self {
        Self {
            program: program.to_owned(),
            voice: voice.to_owned(),
        }
    }

    /// Raw IPA output for `text`.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Phonemize`] if the program cannot be run or exits
    /// with an error.
    pub fn phonemize(&self, text: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["-q", "--ipa", "-v", &self.voice])
            .arg(text)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                BenchError::Phonemize(format!("failed to run '{}': {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BenchError::Phonemize(format!(
                "'{}' failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| BenchError::Phonemize(format!("'{}' emitted non-UTF-8 output", self.program)))
    }
}

/// First espeak program found on `PATH`.
pub fn find_espeak() -> Option<&'static str> {
    ESPEAK_PROGRAMS
        .iter()
        .copied()
        .find(|program| executable_in_path(program))
}

fn executable_in_path(command: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| {
        dir.join(command).is_file()
            || (cfg!(windows) && dir.join(format!("{command}.exe")).is_file())
    })
}

/// Drop zero-width joiners and collapse whitespace in G2P output.
///
/// Misaki ties diphthongs with U+200D and pads its output with spaces;
/// espeak-ng may split long clauses over several lines.
pub fn clean_ipa(ipa: &str) -> String {
    ipa.split_whitespace()
        .map(|word| word.replace('\u{200D}', ""))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a sentence into `(clause, punctuation)` pairs.
///
/// A run of [`CLAUSE_PUNCTUATION`] ends a clause only when it is followed by
/// whitespace, a closing quote or the end of the sentence, so `3.50` stays whole.
pub fn split_clauses(sentence: &str) -> Vec<(&str, &str)> {
    let mut clauses = Vec::new();
    let mut start = 0;
    let mut chars = sentence.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if !CLAUSE_PUNCTUATION.contains(&ch) {
            continue;
        }
        let mut end = i + ch.len_utf8();
        while let Some(&(j, next)) = chars.peek()
            && CLAUSE_PUNCTUATION.contains(&next)
        {
            end = j + next.len_utf8();
            chars.next();
        }
        let boundary = chars
            .peek()
            .is_none_or(|&(_, c)| c.is_whitespace() || matches!(c, '"' | '\'' | ')'));
        if boundary {
            push_clause(&mut clauses, &sentence[start..i], &sentence[i..end]);
            start = end;
        }
    }
    push_clause(&mut clauses, &sentence[start..], "");
    clauses
}

fn push_clause<'a>(clauses: &mut Vec<(&'a str, &'a str)>, text: &'a str, punctuation: &'a str) {
    let text = text.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '(' | ')'));
    if !text.is_empty() {
        clauses.push((text, punctuation));
    }
}

/// Split text at sentence-final punctuation and line breaks.
///
/// Punctuation stays attached to its sentence; surrounding whitespace is
/// trimmed and empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\n' || ch == '\r' {
            push_trimmed(&mut sentences, &mut current);
            continue;
        }
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            // Keep runs like "?!" or "..." together.
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?' | '"' | '\'' | ')') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek().is_none_or(|c| c.is_whitespace()) {
                push_trimmed(&mut sentences, &mut current);
            }
        }
    }
    push_trimmed(&mut sentences, &mut current);
    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_owned());
    }
    current.clear();
}

/// Light text cleanup before G2P: markdown emphasis, typographic quotes
/// and dashes, currency amounts, and common abbreviations.
///
/// Line breaks are kept so sentence splitting still sees them.
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(normalize_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize_line(line: &str) -> String {
    let line = line
        .replace(['*', '#', '`'], "")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2014}', '\u{2013}'], ", ");

    let words: Vec<String> = line
        .split(' ')
        .map(|word| expand_currency(word).unwrap_or_else(|| expand_abbreviation(word)))
        .collect();
    words.join(" ")
}

/// `$5` → `5 dollars`, keeping trailing punctuation.
fn expand_currency(word: &str) -> Option<String> {
    let mut chars = word.chars();
    let unit = match chars.next()? {
        '$' => "dollars",
        '£' => "pounds",
        '€' => "euros",
        _ => return None,
    };
    let rest = chars.as_str();
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    Some(format!("{} {unit}{}", &rest[..digits_end], &rest[digits_end..]))
}

fn expand_abbreviation(word: &str) -> String {
    const ABBREVS: &[(&str, &str)] = &[
        ("Mrs.", "Missus"),
        ("Mr.", "Mister"),
        ("Ms.", "Miz"),
        ("Dr.", "Doctor"),
        ("St.", "Saint"),
        ("vs.", "versus"),
        ("etc.", "etcetera"),
        ("e.g.", "for example"),
        ("i.e.", "that is"),
    ];
    ABBREVS
        .iter()
        .find(|(abbrev, _)| *abbrev == word)
        .map_or_else(|| word.to_owned(), |(_, spoken)| (*spoken).to_owned())
}
