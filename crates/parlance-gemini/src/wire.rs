//! JSON shapes for the Gemini `generateContent` and `models` endpoints.
//!
//! Everything here is pure: request assembly from turns, reply extraction,
//! and HTTP error mapping. The network half lives in `client`.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use parlance_core::completion::CompletionRequest;
use parlance_core::config::ModelConfig;
use parlance_core::error::{ParlanceError, Result};
use parlance_core::types::{Role, Turn, TurnAttachment};

// =============================================================================
// Request
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl From<&ModelConfig> for GenerationConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// Assemble the request body for a conversation.
///
/// Every turn becomes one `Content` entry, in order. A blank system prompt is
/// omitted rather than sent empty.
pub fn build_request(request: &CompletionRequest<'_>, config: &ModelConfig) -> GenerateContentRequest {
    let contents = request.turns().map(turn_to_content).collect();

    let system_instruction = (!request.system_prompt.trim().is_empty()).then(|| SystemInstruction {
        parts: vec![Part::Text {
            text: request.system_prompt.to_string(),
        }],
    });

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: GenerationConfig::from(config),
    }
}

fn turn_to_content(turn: &Turn) -> Content {
    let role = match turn.role() {
        Role::User => "user",
        Role::Assistant => "model",
    };

    let mut parts = Vec::new();
    if !turn.text().trim().is_empty() {
        parts.push(Part::Text {
            text: turn.text().to_string(),
        });
    }
    for attachment in turn.attachments() {
        match attachment {
            TurnAttachment::Image(media) | TurnAttachment::AudioClip(media) => {
                parts.push(Part::InlineData {
                    inline_data: InlineData {
                        mime_type: media.mime_type.clone(),
                        data: BASE64_STANDARD.encode(&media.data),
                    },
                });
            }
            TurnAttachment::AudioTranscript(transcript) => {
                parts.push(Part::Text {
                    text: format!("(transcribed audio) {transcript}"),
                });
            }
        }
    }

    // The API rejects contents without parts; an empty reply turn is sent as
    // an empty string so history keeps its alternation.
    if parts.is_empty() {
        parts.push(Part::Text {
            text: String::new(),
        });
    }

    Content { role, parts }
}

// =============================================================================
// Response
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<ContentResponse>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentResponse {
    pub parts: Option<Vec<PartResponse>>,
}

#[derive(Debug, Deserialize)]
pub struct PartResponse {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

/// Pull the reply text out of a response.
///
/// Text parts of the first candidate are concatenated. A response with no
/// text (blocked prompt, safety stop, empty candidate list) is a
/// non-retryable upstream error.
pub fn extract_reply(response: GenerateContentResponse) -> Result<String> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);

    let Some(candidate) = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
    else {
        let message = match block_reason {
            Some(reason) => format!("Gemini blocked the prompt: {reason}"),
            None => "Gemini returned no candidates".to_string(),
        };
        return Err(ParlanceError::upstream(message, false));
    };

    let text: String = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(ParlanceError::upstream(
            format!("Gemini returned no text (finish reason: {reason})"),
            false,
        ));
    }

    Ok(text)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Whether an HTTP status is worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Map a non-success HTTP response onto an upstream error.
///
/// The Gemini error envelope `{"error": {"status", "message"}}` is unwrapped
/// when present; otherwise the raw body is used.
pub fn map_http_error(status: u16, body: &str, retry_after_secs: Option<u64>) -> ParlanceError {
    let detail = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|| body.trim().to_string());

    let mut message = format!("Gemini API returned HTTP {status}: {detail}");
    if let Some(secs) = retry_after_secs {
        message.push_str(&format!(" (retry after {secs}s)"));
    }
    ParlanceError::upstream(message, is_retryable_status(status))
}

/// Parse a `Retry-After` header given in seconds.
pub fn parse_retry_after(value: Option<&str>) -> Option<u64> {
    value?.trim().parse::<u64>().ok()
}

// =============================================================================
// Model listing
// =============================================================================

/// One entry from the `models` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// True when the model can serve `generateContent`.
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::types::Attachment;
    use serde_json::{json, Value};

    fn body_json(request: &CompletionRequest<'_>) -> Value {
        serde_json::to_value(build_request(request, &ModelConfig::default())).unwrap()
    }

    #[test]
    fn test_build_request_maps_roles_and_order() {
        let history = vec![Turn::user("hi", vec![]), Turn::assistant("hello!")];
        let input = Turn::user("how are you?", vec![]);
        let request = CompletionRequest {
            system_prompt: "You are a helpful, concise assistant.",
            history: &history,
            input: &input,
        };

        let body = body_json(&request);
        assert_eq!(
            body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "hi"}]},
                {"role": "model", "parts": [{"text": "hello!"}]},
                {"role": "user", "parts": [{"text": "how are you?"}]},
            ])
        );
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are a helpful, concise assistant."
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        assert!(body["generationConfig"]["topP"].as_f64().unwrap() > 0.9);
    }

    #[test]
    fn test_build_request_omits_blank_system_prompt() {
        let input = Turn::user("hi", vec![]);
        let request = CompletionRequest {
            system_prompt: "  ",
            history: &[],
            input: &input,
        };
        let body = body_json(&request);
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_build_request_inlines_media_and_transcript() {
        let input = Turn::user(
            "describe",
            vec![
                TurnAttachment::Image(Attachment::new("image/png", b"abc".to_vec())),
                TurnAttachment::AudioClip(Attachment::new("audio/wav", vec![0, 1])),
                TurnAttachment::AudioTranscript("turn left".to_string()),
            ],
        );
        let request = CompletionRequest {
            system_prompt: "",
            history: &[],
            input: &input,
        };
        let body = body_json(&request);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0], json!({"text": "describe"}));
        assert_eq!(
            parts[1],
            json!({"inlineData": {"mimeType": "image/png", "data": "YWJj"}})
        );
        assert_eq!(parts[2]["inlineData"]["mimeType"], "audio/wav");
        assert_eq!(parts[3], json!({"text": "(transcribed audio) turn left"}));
    }

    #[test]
    fn test_build_request_attachment_only_turn() {
        let input = Turn::user(
            "",
            vec![TurnAttachment::Image(Attachment::new("image/jpeg", vec![1]))],
        );
        let request = CompletionRequest {
            system_prompt: "",
            history: &[],
            input: &input,
        };
        let body = body_json(&request);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].get("inlineData").is_some());
    }

    #[test]
    fn test_extract_reply_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello, "}, {"text": "world"}], "role": "model"},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(extract_reply(response).unwrap(), "Hello, world");
    }

    #[test]
    fn test_extract_reply_blocked_prompt() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = extract_reply(response).unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_extract_reply_candidate_without_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();
        let err = extract_reply(response).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn test_extract_reply_empty_response() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        let err = extract_reply(response).unwrap_err();
        assert!(err.to_string().contains("no candidates"));
    }

    #[test]
    fn test_map_http_error_unwraps_envelope() {
        let body = r#"{"error":{"code":400,"message":"Image input not supported","status":"INVALID_ARGUMENT"}}"#;
        let err = map_http_error(400, body, None);
        assert!(!err.is_retryable());
        assert!(err
            .to_string()
            .contains("INVALID_ARGUMENT: Image input not supported"));
    }

    #[test]
    fn test_map_http_error_retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(map_http_error(status, "busy", None).is_retryable());
        }
        for status in [400, 401, 403, 404] {
            assert!(!map_http_error(status, "nope", None).is_retryable());
        }
    }

    #[test]
    fn test_map_http_error_includes_retry_after() {
        let err = map_http_error(429, "slow down", Some(12));
        assert!(err.to_string().contains("retry after 12s"));
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("30")), Some(30));
        assert_eq!(parse_retry_after(Some(" 5 ")), Some(5));
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_list_models_response_parsing() {
        let response: ListModelsResponse = serde_json::from_value(json!({
            "models": [
                {
                    "name": "models/gemini-2.0-flash",
                    "displayName": "Gemini 2.0 Flash",
                    "supportedGenerationMethods": ["generateContent", "countTokens"]
                },
                {"name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"]}
            ],
            "nextPageToken": "abc"
        }))
        .unwrap();
        assert_eq!(response.models.len(), 2);
        assert!(response.models[0].supports_generate_content());
        assert!(!response.models[1].supports_generate_content());
        assert_eq!(response.next_page_token.as_deref(), Some("abc"));
    }
}
