//! Conversation dispatcher: turns user input into a completion request and
//! records the exchange in the session.

use std::sync::Arc;

use parlance_core::completion::{CompletionRequest, CompletionService};
use parlance_core::types::{Turn, UserInput};

use crate::error::ChatError;
use crate::persona::PersonaRegistry;
use crate::session::{Session, SessionState};

/// Sends user input to the completion service with the session's context.
pub struct ConversationDispatcher<C> {
    service: C,
    personas: Arc<PersonaRegistry>,
}

impl<C: CompletionService> ConversationDispatcher<C> {
    pub fn new(service: C, personas: Arc<PersonaRegistry>) -> Self {
        Self { service, personas }
    }

    pub fn service(&self) -> &C {
        &self.service
    }

    pub fn personas(&self) -> &PersonaRegistry {
        &self.personas
    }

    /// Send one user message and return the assistant's reply.
    ///
    /// The user turn is appended before the service is called, and the
    /// request carries every turn of the session up to and including it. On
    /// success the reply is appended as an assistant turn. On failure the
    /// user turn stays in the transcript and the error is returned unchanged;
    /// there is no retry.
    ///
    /// Empty input or an unknown persona fail before anything is appended.
    pub async fn send(&self, session: &mut Session, input: UserInput) -> Result<String, ChatError> {
        if input.is_empty() {
            return Err(ChatError::EmptyInput);
        }
        let system_prompt = session.system_prompt(&self.personas)?.to_string();

        if session.state() == SessionState::AwaitingReply {
            // Only reachable when a previous send future was dropped mid-flight.
            tracing::warn!(session_id = %session.id(), "Previous dispatch was abandoned");
        }

        session.append(input.into_turn())?;
        session.set_state(SessionState::AwaitingReply);

        tracing::info!(
            session_id = %session.id(),
            persona = %session.persona(),
            turns = session.len(),
            "Dispatching message"
        );

        let result = {
            let Some((input, history)) = session.turns().split_last() else {
                return Err(ChatError::InvalidTurn);
            };
            let request = CompletionRequest {
                system_prompt: &system_prompt,
                history,
                input,
            };
            self.service.complete(request).await
        };
        session.set_state(SessionState::Idle);

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                let err = ChatError::from(e);
                tracing::warn!(
                    session_id = %session.id(),
                    error = %err,
                    retryable = err.is_retryable(),
                    "Completion failed"
                );
                return Err(err);
            }
        };

        if reply.text.trim().is_empty() {
            tracing::warn!(session_id = %session.id(), model = %reply.model, "Empty reply");
            return Err(ChatError::Upstream {
                message: "completion service returned an empty reply".to_string(),
                retryable: false,
            });
        }

        session.append(Turn::assistant(reply.text.clone()))?;
        tracing::info!(
            session_id = %session.id(),
            model = %reply.model,
            reply_len = reply.text.len(),
            "Reply received"
        );
        Ok(reply.text)
    }
}

// =============================================================================
// Tests
// =============================================================================
