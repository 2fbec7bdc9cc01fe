//! HTTP client for the Gemini REST API.

use std::time::Duration;

use reqwest::{Client, Response};

use parlance_core::completion::{CompletionReply, CompletionRequest, CompletionService};
use parlance_core::config::{ApiKey, ModelConfig};
use parlance_core::error::{ParlanceError, Result};

use crate::wire::{
    build_request, extract_reply, map_http_error, parse_retry_after, GenerateContentResponse,
    ListModelsResponse, ModelInfo,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Completion service that talks to the Gemini HTTP API.
///
/// The API key travels in a request header; it is never placed in a URL and
/// never logged.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: ApiKey,
    config: ModelConfig,
}

impl GeminiClient {
    pub fn new(config: ModelConfig, api_key: ApiKey) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ParlanceError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Build a client whose key is read from the configured environment variable.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::new(config.clone(), api_key)
    }

    /// Model that will serve `request`: the multimodal model whenever any
    /// turn carries inline media, the text model otherwise.
    pub fn model_for(&self, request: &CompletionRequest<'_>) -> &str {
        if request.has_media() {
            &self.config.multimodal_model
        } else {
            &self.config.text_model
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// List the models available to this API key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", "100".to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let response = self
                .client
                .get(self.endpoint("models"))
                .header(API_KEY_HEADER, self.api_key.expose())
                .query(&query)
                .send()
                .await
                .map_err(request_error)?;
            let response = check_status(response).await?;

            let page: ListModelsResponse = response.json().await.map_err(|e| {
                ParlanceError::upstream(format!("Failed to parse Gemini model list: {e}"), false)
            })?;
            models.extend(page.models);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(count = models.len(), "Listed Gemini models");
        Ok(models)
    }
}

impl CompletionService for GeminiClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<CompletionReply> {
        let model = self.model_for(&request).to_string();
        let body = build_request(&request, &self.config);

        tracing::debug!(
            model = %model,
            turns = body.contents.len(),
            "Sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint(&format!("models/{model}:generateContent")))
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response).await?;

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            ParlanceError::upstream(format!("Failed to parse Gemini response: {e}"), false)
        })?;
        let text = extract_reply(parsed)?;

        tracing::debug!(model = %model, reply_len = text.len(), "Gemini reply received");
        Ok(CompletionReply { text, model })
    }
}

fn request_error(err: reqwest::Error) -> ParlanceError {
    ParlanceError::upstream(
        format!("Gemini API request failed: {err}"),
        err.is_connect() || err.is_timeout(),
    )
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = parse_retry_after(
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok()),
    );
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
    Err(map_http_error(status.as_u16(), &body, retry_after))
}
