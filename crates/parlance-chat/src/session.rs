//! Session store: the ordered transcript and persona selection of one
//! conversation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use parlance_core::types::{Role, Turn};

use crate::error::ChatError;
use crate::export::{export_turns, ExportFormat};
use crate::persona::PersonaRegistry;

/// Where a session is in its request/reply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A dispatch has appended the user turn and is waiting on the service.
    AwaitingReply,
}

/// One conversation: turns in insertion order plus the active persona.
///
/// The session is the only owner of its turns. Exclusive (`&mut`) access is
/// needed to append, so at most one dispatch can be in flight per session.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    persona: String,
    custom_prompt: Option<String>,
    turns: Vec<Turn>,
    state: SessionState,
}

impl Session {
    /// Start an empty session on the registry's default persona.
    pub fn new(registry: &PersonaRegistry) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            persona: registry.default_persona().to_string(),
            custom_prompt: None,
            turns: Vec::new(),
            state: SessionState::Idle,
        }
    }

    /// Start an empty session on a named persona.
    pub fn with_persona(registry: &PersonaRegistry, persona: &str) -> Result<Self, ChatError> {
        let mut session = Self::new(registry);
        session.switch_persona(registry, persona)?;
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn custom_prompt(&self) -> Option<&str> {
        self.custom_prompt.as_deref()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Add a turn to the end of the transcript.
    pub fn append(&mut self, turn: Turn) -> Result<(), ChatError> {
        if turn.is_empty() {
            return Err(ChatError::InvalidTurn);
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Drop every turn. Persona selection is kept. Calling it twice is a no-op.
    pub fn clear(&mut self) {
        if !self.turns.is_empty() {
            tracing::info!(session_id = %self.id, turns = self.turns.len(), "Chat history cleared");
        }
        self.turns.clear();
        self.state = SessionState::Idle;
    }

    /// Select another persona for future requests.
    ///
    /// Existing turns are untouched, and any custom prompt override is dropped.
    pub fn switch_persona(
        &mut self,
        registry: &PersonaRegistry,
        persona: &str,
    ) -> Result<(), ChatError> {
        registry.get(persona)?;
        self.persona = persona.to_string();
        self.custom_prompt = None;
        tracing::debug!(session_id = %self.id, persona = %persona, "Persona switched");
        Ok(())
    }

    /// Replace the persona prompt with a one-off system prompt, or restore the
    /// persona prompt with `None`. A blank prompt counts as `None`.
    pub fn set_custom_prompt(&mut self, prompt: Option<String>) {
        self.custom_prompt = prompt.filter(|p| !p.trim().is_empty());
    }

    /// System prompt that frames the next request.
    pub fn system_prompt<'a>(&'a self, registry: &'a PersonaRegistry) -> Result<&'a str, ChatError> {
        match self.custom_prompt.as_deref() {
            Some(prompt) => Ok(prompt),
            None => registry.get(&self.persona),
        }
    }

    /// Most recent assistant turn.
    pub fn last_reply(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role() == Role::Assistant)
    }

    /// Serialize the full transcript.
    pub fn export(&self, format: ExportFormat) -> Result<String, ChatError> {
        export_turns(&self.turns, format)
    }

    /// Serialize the transcript using a format name such as `"txt"` or `"json"`.
    pub fn export_as(&self, format: &str) -> Result<String, ChatError> {
        self.export(format.parse()?)
    }
}

// =============================================================================
// Tests
// =============================================================================
