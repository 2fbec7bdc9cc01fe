//! Boundary to the hosted AI completion service.
//!
//! Provides the request/reply types, the `CompletionService` trait that
//! concrete clients implement, and a scriptable mock for tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use crate::error::{ParlanceError, Result};
use crate::types::Turn;

// =============================================================================
// Request / reply
// =============================================================================

/// A single completion request.
///
/// `history` holds every earlier turn of the session in order and `input` is
/// the user turn being answered, so `history` followed by `input` is the full
/// conversation.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub history: &'a [Turn],
    pub input: &'a Turn,
}

impl<'a> CompletionRequest<'a> {
    /// All turns in conversational order, ending with `input`.
    pub fn turns(&self) -> impl Iterator<Item = &'a Turn> + 'a {
        let history: &'a [Turn] = self.history;
        history.iter().chain(std::iter::once(self.input))
    }

    /// True when any turn in the request carries inline image or audio bytes.
    pub fn has_media(&self) -> bool {
        self.turns().any(Turn::has_media)
    }
}

/// Text produced by the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReply {
    pub text: String,
    /// Model that produced the reply.
    pub model: String,
}

// =============================================================================
// Trait
// =============================================================================

/// Service that turns a conversation into an assistant reply.
///
/// Failures are reported as `ParlanceError::Upstream` carrying a retryable
/// flag; implementations never retry on their own.
pub trait CompletionService: Send + Sync {
    fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> impl Future<Output = Result<CompletionReply>> + Send;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Owned copy of a request seen by [`MockCompletionService`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub turns: Vec<Turn>,
}

/// Scriptable completion service for tests and offline runs.
///
/// Queued outcomes are returned in order; once the queue is empty the mock
/// echoes the user's text back.
#[derive(Debug, Default)]
pub struct MockCompletionService {
    script: Mutex<VecDeque<std::result::Result<String, (String, bool)>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, text: impl Into<String>) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(text.into()));
        }
        self
    }

    /// Queue an upstream failure.
    pub fn push_failure(&self, message: impl Into<String>, retryable: bool) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err((message.into(), retryable)));
        }
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl CompletionService for MockCompletionService {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<CompletionReply> {
        {
            let mut requests = self
                .requests
                .lock()
                .map_err(|e| ParlanceError::upstream(format!("mock lock poisoned: {e}"), false))?;
            requests.push(RecordedRequest {
                system_prompt: request.system_prompt.to_string(),
                turns: request.turns().cloned().collect(),
            });
        }

        let next = self
            .script
            .lock()
            .map_err(|e| ParlanceError::upstream(format!("mock lock poisoned: {e}"), false))?
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(CompletionReply {
                text,
                model: "mock".to_string(),
            }),
            Some(Err((message, retryable))) => Err(ParlanceError::upstream(message, retryable)),
            None => Ok(CompletionReply {
                text: format!("Echo: {}", request.input.text()),
                model: "mock".to_string(),
            }),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attachment, TurnAttachment};

    #[test]
    fn test_request_turns_end_with_input() {
        let history = vec![Turn::user("a", vec![]), Turn::assistant("b")];
        let input = Turn::user("c", vec![]);
        let request = CompletionRequest {
            system_prompt: "sys",
            history: &history,
            input: &input,
        };
        let texts: Vec<&str> = request.turns().map(Turn::text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_request_has_media_checks_history() {
        let image = TurnAttachment::Image(Attachment::new("image/png", vec![1]));
        let history = vec![Turn::user("look", vec![image]), Turn::assistant("a cat")];
        let input = Turn::user("what colour?", vec![]);
        let request = CompletionRequest {
            system_prompt: "",
            history: &history,
            input: &input,
        };
        assert!(request.has_media());

        let request = CompletionRequest {
            system_prompt: "",
            history: &[],
            input: &input,
        };
        assert!(!request.has_media());
    }

    #[tokio::test]
    async fn test_mock_echoes_when_unscripted() {
        let mock = MockCompletionService::new();
        let input = Turn::user("hello", vec![]);
        let reply = mock
            .complete(CompletionRequest {
                system_prompt: "sys",
                history: &[],
                input: &input,
            })
            .await
            .unwrap();
        assert_eq!(reply.text, "Echo: hello");
        assert_eq!(mock.requests().len(), 1);
        assert_eq!(mock.requests()[0].system_prompt, "sys");
    }

    #[tokio::test]
    async fn test_mock_follows_script() {
        let mock = MockCompletionService::new();
        mock.push_reply("first").push_failure("overloaded", true);
        let input = Turn::user("q", vec![]);
        let request = CompletionRequest {
            system_prompt: "",
            history: &[],
            input: &input,
        };

        assert_eq!(mock.complete(request).await.unwrap().text, "first");
        let err = mock.complete(request).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(mock.complete(request).await.unwrap().text, "Echo: q");
    }
}
