use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AppConfig;

/// An image ready to be sent inline to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("provider quota exhausted or rate limited")]
    RateLimited,

    #[error("request blocked by provider: {0}")]
    Blocked(String),

    #[error("provider returned no text")]
    EmptyResponse,
}

/// Adapter over a hosted generative model.
///
/// Each call is an independent round trip: no retries, no caching.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, for logs and the health route.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ImageBuffer,
    ) -> Result<String, ModelError>;
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Result<Self, ModelError> {
        let http = Client::builder().build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    async fn send(&self, parts: Vec<Part>) -> Result<String, ModelError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        };

        // key travels in a header so reqwest errors (which carry the URL) never expose it
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(model = %self.model, status = status.as_u16(), "generateContent failed");

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ModelError::RateLimited);
            }
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = extract_text(body)?;
        debug!(model = %self.model, output_len = text.len(), "generateContent succeeded");
        Ok(text)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "text generation");
        self.send(vec![Part::text(prompt)]).await
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ImageBuffer,
    ) -> Result<String, ModelError> {
        debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            mime_type = %image.mime_type,
            image_bytes = image.bytes.len(),
            "multimodal generation"
        );
        self.send(vec![Part::text(prompt), Part::inline(image)]).await
    }
}

/// Pull the `error.message` out of a Gemini error body, falling back to the raw text.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, ModelError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ModelError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ModelError::EmptyResponse)?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return match candidate.finish_reason {
            Some(reason) if is_block_reason(&reason) => Err(ModelError::Blocked(reason)),
            _ => Err(ModelError::EmptyResponse),
        };
    }

    Ok(text)
}

fn is_block_reason(reason: &str) -> bool {
    matches!(reason, "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST")
}

// ---- wire types ----

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn inline(image: &ImageBuffer) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: BASE64.encode(&image.bytes),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
