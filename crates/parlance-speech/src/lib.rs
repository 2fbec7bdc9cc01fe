//! Parlance speech crate - text-to-speech for assistant replies.
//!
//! Provides a trait-based abstraction over speech synthesis, a client for the
//! Google Translate TTS endpoint, a disabled backend, and a mock
//! implementation for testing without network access.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use parlance_core::config::SpeechConfig;
use parlance_core::error::{ParlanceError, Result};

/// Longest text the Google Translate TTS endpoint accepts per request.
pub const MAX_CHUNK_CHARS: usize = 100;

// =============================================================================
// Trait
// =============================================================================

/// Service that converts text into encoded audio bytes.
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and return the audio (MP3 for the hosted backend).
    ///
    /// Failures are reported as `ParlanceError::Speech`.
    fn synthesize(&self, text: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

// =============================================================================
// Google Translate TTS
// =============================================================================

/// Hosted speech client backed by the Google Translate TTS endpoint.
///
/// Long text is split into chunks of at most [`MAX_CHUNK_CHARS`] characters
/// and the resulting MP3 segments are concatenated in order.
#[derive(Debug, Clone)]
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    base_url: String,
    language: String,
}

impl GoogleTranslateTts {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ParlanceError::Speech(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            language: config.language.clone(),
        })
    }

    async fn fetch_chunk(&self, chunk: &str, idx: usize, total: usize) -> Result<Vec<u8>> {
        let query = [
            ("ie", "UTF-8".to_string()),
            ("q", chunk.to_string()),
            ("tl", self.language.clone()),
            ("client", "tw-ob".to_string()),
            ("total", total.to_string()),
            ("idx", idx.to_string()),
            ("textlen", chunk.chars().count().to_string()),
        ];

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ParlanceError::Speech(format!("speech request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ParlanceError::Speech(format!(
                "speech service returned {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ParlanceError::Speech(format!("failed to read speech audio: {e}")))?;
        Ok(bytes.to_vec())
    }
}

impl SpeechSynthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(ParlanceError::Speech("Cannot speak empty text".to_string()));
        }

        tracing::debug!(
            chunks = chunks.len(),
            language = %self.language,
            "Synthesizing speech"
        );

        let total = chunks.len();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let segment = self.fetch_chunk(chunk, idx, total).await?;
            audio.extend_from_slice(&segment);
        }

        tracing::debug!(bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }
}

/// Split text into pieces of at most `max_chars` characters.
///
/// Sentences are kept whole when they fit; otherwise they break on word
/// boundaries, and words longer than `max_chars` are hard-split. Whitespace is
/// normalized to single spaces.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        let current_len = current.chars().count();

        if current.is_empty() && sentence_len <= max_chars {
            current = sentence;
            continue;
        }
        if !current.is_empty() && current_len + 1 + sentence_len <= max_chars {
            current.push(' ');
            current.push_str(&sentence);
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if sentence_len <= max_chars {
            current = sentence;
            continue;
        }

        for word in sentence.split(' ') {
            push_word(&mut chunks, &mut current, word, max_chars);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn push_word(chunks: &mut Vec<String>, current: &mut String, word: &str, max_chars: usize) {
    let word_len = word.chars().count();
    let current_len = current.chars().count();

    if word_len > max_chars {
        if !current.is_empty() {
            chunks.push(std::mem::take(current));
        }
        let chars: Vec<char> = word.chars().collect();
        let mut pieces = chars.chunks(max_chars).map(|c| c.iter().collect::<String>());
        let mut last = pieces.next().unwrap_or_default();
        for piece in pieces {
            chunks.push(std::mem::replace(&mut last, piece));
        }
        *current = last;
        return;
    }

    if current.is_empty() {
        current.push_str(word);
    } else if current_len + 1 + word_len <= max_chars {
        current.push(' ');
        current.push_str(word);
    } else {
        chunks.push(std::mem::replace(current, word.to_string()));
    }
}

/// Split on sentence punctuation and newlines, keeping the punctuation.
///
/// Punctuation only ends a sentence when followed by whitespace or the end of
/// the text, so `3.14` and `main.rs` stay intact.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut buf = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\n' {
            buf.push(c);
        }
        let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
        if c == '\n' || (matches!(c, '.' | '!' | '?' | ';') && at_boundary) {
            push_normalized(&mut sentences, &buf);
            buf.clear();
        }
    }
    push_normalized(&mut sentences, &buf);
    sentences
}

fn push_normalized(out: &mut Vec<String>, raw: &str) {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        out.push(normalized);
    }
}

// =============================================================================
// Disabled backend
// =============================================================================

/// Backend used when speech output is turned off in configuration.
#[derive(Debug, Clone, Default)]
pub struct DisabledSpeech;

impl SpeechSynthesizer for DisabledSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Err(ParlanceError::Speech(
            "speech output is disabled in configuration".to_string(),
        ))
    }
}

/// Runtime choice between the hosted client and the disabled backend.
#[derive(Debug, Clone)]
pub enum SpeechBackend {
    Google(GoogleTranslateTts),
    Disabled(DisabledSpeech),
}

impl SpeechBackend {
    /// Pick a backend from configuration.
    ///
    /// A client that cannot be constructed degrades to the disabled backend.
    pub fn from_config(config: &SpeechConfig) -> Self {
        if !config.enabled {
            return SpeechBackend::Disabled(DisabledSpeech);
        }
        match GoogleTranslateTts::new(config) {
            Ok(client) => SpeechBackend::Google(client),
            Err(e) => {
                tracing::warn!(error = %e, "Speech client unavailable, continuing text-only");
                SpeechBackend::Disabled(DisabledSpeech)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, SpeechBackend::Google(_))
    }
}

impl SpeechSynthesizer for SpeechBackend {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            SpeechBackend::Google(client) => client.synthesize(text).await,
            SpeechBackend::Disabled(disabled) => disabled.synthesize(text).await,
        }
    }
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock synthesizer that returns `MOCK-MP3:` followed by the text bytes.
///
/// Set `fail` to simulate an unreachable speech service.
#[derive(Debug, Default)]
pub struct MockSpeech {
    pub fail: bool,
    spoken: Mutex<Vec<String>>,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            spoken: Mutex::new(Vec::new()),
        }
    }

    /// Texts passed to `synthesize`, oldest first.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SpeechSynthesizer for MockSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
        if self.fail {
            return Err(ParlanceError::Speech("mock speech failure".to_string()));
        }
        if text.trim().is_empty() {
            return Err(ParlanceError::Speech("Cannot speak empty text".to_string()));
        }
        let mut audio = b"MOCK-MP3:".to_vec();
        audio.extend_from_slice(text.as_bytes());
        Ok(audio)
    }
}

// =============================================================================
// Tests
// =============================================================================
