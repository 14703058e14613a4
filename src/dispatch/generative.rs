//! Client for the generative-language API used by free chat.
//!
//! Speaks the `generateContent` REST call: one user turn in, the text parts of
//! the first candidate out.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::dispatch::ServiceFuture;
use crate::dispatch::error::{DispatchError, DispatchResult};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A collaborator that turns a prompt into a text completion.
pub trait GenerativeService: Send + Sync {
    /// Generate a completion for `prompt`. Single attempt.
    fn generate<'a>(&'a self, prompt: &'a str) -> ServiceFuture<'a, DispatchResult<String>>;
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// HTTP client for the generative-language API.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// Create a client against `base_url` for `model`.
    #[must_use]
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }

    /// Create a client from the service configuration.
    #[must_use]
    pub fn from_config(client: Client, config: &AppConfig) -> Self {
        Self::new(
            client,
            config.gemini_base_url.clone(),
            config.gemini_model.clone(),
            config.gemini_api_key.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn post_generate(&self, prompt: &str) -> DispatchResult<String> {
        let api_key = self.api_key.as_deref().ok_or(DispatchError::MissingApiKey)?;
        let request = GenerateContentRequest {
            contents: [Content {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: GenerateContentResponse = serde_json::from_slice(&body)?;
        extract_text(parsed)
    }
}

impl GenerativeService for GeminiClient {
    fn generate<'a>(&'a self, prompt: &'a str) -> ServiceFuture<'a, DispatchResult<String>> {
        Box::pin(self.post_generate(prompt))
    }
}

fn extract_text(response: GenerateContentResponse) -> DispatchResult<String> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| DispatchError::MalformedResponse("no candidates".to_string()))?;

    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() {
        return Err(DispatchError::MalformedResponse(
            "candidate has no text".to_string(),
        ));
    }
    Ok(text)
}
