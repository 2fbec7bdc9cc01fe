use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ParlanceError, Result};

// =============================================================================
// Enums
// =============================================================================

/// Who produced a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad media category of an attachment, derived from its MIME type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
}

// =============================================================================
// Attachments
// =============================================================================

/// Accepted upload extensions and their MIME types.
const KNOWN_MEDIA: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("wav", "audio/wav"),
    ("mp3", "audio/mp3"),
    ("m4a", "audio/mp4"),
    ("ogg", "audio/ogg"),
];

/// Look up the MIME type for a file extension (case-insensitive).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    KNOWN_MEDIA
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// Raw media bytes sent inline alongside a message.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Read an attachment from disk, inferring the MIME type from the extension.
    ///
    /// Only the image and audio formats the chat front-end accepts are allowed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let mime = mime_for_extension(ext).ok_or_else(|| {
            ParlanceError::Attachment(format!(
                "unsupported file type '{}' for {}",
                ext,
                path.display()
            ))
        })?;
        let data = std::fs::read(path)?;
        if data.is_empty() {
            return Err(ParlanceError::Attachment(format!(
                "{} is empty",
                path.display()
            )));
        }
        let mut attachment = Attachment::new(mime, data);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            attachment = attachment.with_file_name(name);
        }
        Ok(attachment)
    }

    pub fn kind(&self) -> Option<MediaKind> {
        if self.mime_type.starts_with("image/") {
            Some(MediaKind::Image)
        } else if self.mime_type.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Keeps raw bytes out of logs and debug output.
impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// Non-text content carried by a turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnAttachment {
    /// Image bytes forwarded inline to the model.
    Image(Attachment),
    /// Raw audio forwarded inline to the model.
    AudioClip(Attachment),
    /// Audio already transcribed to text before reaching the dispatcher.
    AudioTranscript(String),
}

impl TurnAttachment {
    pub fn is_empty(&self) -> bool {
        match self {
            TurnAttachment::Image(a) | TurnAttachment::AudioClip(a) => a.is_empty(),
            TurnAttachment::AudioTranscript(t) => t.trim().is_empty(),
        }
    }

    /// Inline media, if this attachment carries any.
    pub fn media(&self) -> Option<&Attachment> {
        match self {
            TurnAttachment::Image(a) | TurnAttachment::AudioClip(a) => Some(a),
            TurnAttachment::AudioTranscript(_) => None,
        }
    }
}

// =============================================================================
// Turn
// =============================================================================

/// One message in a conversation.
///
/// Fields are private: a turn is never modified after it is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    text: String,
    attachments: Vec<TurnAttachment>,
    timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        role: Role,
        text: impl Into<String>,
        attachments: Vec<TurnAttachment>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            role,
            text: text.into(),
            attachments,
            timestamp,
        }
    }

    /// A user turn stamped with the current time.
    pub fn user(text: impl Into<String>, attachments: Vec<TurnAttachment>) -> Self {
        Self::new(Role::User, text, attachments, Utc::now())
    }

    /// An assistant turn stamped with the current time.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text, Vec::new(), Utc::now())
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachments(&self) -> &[TurnAttachment] {
        &self.attachments
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// True when the turn has neither text nor any non-empty attachment.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.iter().all(TurnAttachment::is_empty)
    }

    /// True when the turn carries inline image or audio bytes.
    pub fn has_media(&self) -> bool {
        self.attachments.iter().any(|a| a.media().is_some())
    }

    pub fn image_count(&self) -> usize {
        self.attachments
            .iter()
            .filter(|a| matches!(a, TurnAttachment::Image(_)))
            .count()
    }

    pub fn audio_transcript(&self) -> Option<&str> {
        self.attachments.iter().find_map(|a| match a {
            TurnAttachment::AudioTranscript(t) => Some(t.as_str()),
            _ => None,
        })
    }

    pub fn has_audio_clip(&self) -> bool {
        self.attachments
            .iter()
            .any(|a| matches!(a, TurnAttachment::AudioClip(_)))
    }

    /// The exported form of this turn.
    pub fn record(&self) -> TurnRecord {
        TurnRecord {
            role: self.role,
            text: self.text.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Serialized transcript entry: `{role, text, timestamp}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// UserInput
// =============================================================================

/// Everything a user can submit in one send.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserInput {
    pub text: Option<String>,
    pub images: Vec<Attachment>,
    pub audio_transcript: Option<String>,
    pub audio_clip: Option<Attachment>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image: Attachment) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_audio_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.audio_transcript = Some(transcript.into());
        self
    }

    pub fn with_audio_clip(mut self, clip: Attachment) -> Self {
        self.audio_clip = Some(clip);
        self
    }

    /// True when no field carries usable content.
    ///
    /// Whitespace-only text and zero-length attachments count as empty.
    pub fn is_empty(&self) -> bool {
        let blank = |s: &Option<String>| s.as_deref().map_or(true, |t| t.trim().is_empty());
        blank(&self.text)
            && blank(&self.audio_transcript)
            && self.images.iter().all(Attachment::is_empty)
            && self.audio_clip.as_ref().map_or(true, Attachment::is_empty)
    }

    /// Convert into a user turn stamped with the current time.
    ///
    /// Empty attachments are dropped; attachment order is images, audio clip,
    /// then transcript.
    pub fn into_turn(self) -> Turn {
        let mut attachments: Vec<TurnAttachment> = self
            .images
            .into_iter()
            .filter(|a| !a.is_empty())
            .map(TurnAttachment::Image)
            .collect();
        if let Some(clip) = self.audio_clip.filter(|a| !a.is_empty()) {
            attachments.push(TurnAttachment::AudioClip(clip));
        }
        if let Some(transcript) = self.audio_transcript.filter(|t| !t.trim().is_empty()) {
            attachments.push(TurnAttachment::AudioTranscript(transcript));
        }
        Turn::user(self.text.unwrap_or_default(), attachments)
    }
}

// =============================================================================
// Tests
// =============================================================================
