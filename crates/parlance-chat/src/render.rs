//! Output renderer: display lines, speech, and transcript export.

use std::io::Write;
use std::path::Path;

use chrono::Local;

use parlance_core::types::Turn;
use parlance_speech::SpeechSynthesizer;

use crate::error::ChatError;
use crate::export::ExportFormat;
use crate::session::Session;

/// Presents turns to the user and hands replies to the speech service.
pub struct OutputRenderer<S> {
    speech: S,
}

impl<S: SpeechSynthesizer> OutputRenderer<S> {
    pub fn new(speech: S) -> Self {
        Self { speech }
    }

    pub fn speech(&self) -> &S {
        &self.speech
    }

    /// Display line for a turn: `[local time] role: text` followed by
    /// attachment markers.
    pub fn format_turn(turn: &Turn) -> String {
        let stamp = turn
            .timestamp()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S");
        let mut line = format!("[{}] {}: {}", stamp, turn.role(), turn.text());

        let images = turn.image_count();
        if images > 0 {
            line.push_str(&format!(" [{} image(s) attached]", images));
        }
        if turn.has_audio_clip() {
            line.push_str(" [audio attached]");
        }
        if let Some(transcript) = turn.audio_transcript() {
            line.push_str(&format!(" [audio transcript: {}]", transcript));
        }
        line
    }

    /// Write one turn to `out`.
    pub fn render<W: Write>(&self, out: &mut W, turn: &Turn) -> Result<(), ChatError> {
        writeln!(out, "{}", Self::format_turn(turn))?;
        Ok(())
    }

    /// Write every turn of the session to `out`, oldest first.
    pub fn render_session<W: Write>(&self, out: &mut W, session: &Session) -> Result<(), ChatError> {
        for turn in session.turns() {
            self.render(out, turn)?;
        }
        Ok(())
    }

    /// Synthesize `text` to audio bytes.
    ///
    /// Any failure is reported as `SpeechUnavailable`; the caller can keep
    /// showing text.
    pub async fn speak(&self, text: &str) -> Result<Vec<u8>, ChatError> {
        match self.speech.synthesize(text).await {
            Ok(audio) => Ok(audio),
            Err(e) => {
                tracing::warn!(error = %e, "Speech synthesis failed, falling back to text");
                Err(ChatError::SpeechUnavailable(e.to_string()))
            }
        }
    }

    /// Speak the most recent assistant reply of the session.
    pub async fn speak_last_reply(&self, session: &Session) -> Result<Vec<u8>, ChatError> {
        let reply = session
            .last_reply()
            .ok_or_else(|| ChatError::SpeechUnavailable("no assistant reply to speak".to_string()))?;
        self.speak(reply.text()).await
    }

    /// Serialize the session transcript.
    pub fn export(&self, session: &Session, format: ExportFormat) -> Result<String, ChatError> {
        session.export(format)
    }

    /// Write the transcript to `path`, picking the format from its extension
    /// (`.txt` or `.json`). Parent directories are created as needed.
    pub fn export_to_file(&self, session: &Session, path: &Path) -> Result<ExportFormat, ChatError> {
        let format = ExportFormat::from_path(path)?;
        let content = session.export(format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::info!(
            path = %path.display(),
            format = %format,
            turns = session.len(),
            "Transcript exported"
        );
        Ok(format)
    }
}

// =============================================================================
// Tests
// =============================================================================
