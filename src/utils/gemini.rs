use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("The model returned no text")]
    EmptyResponse,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// HTTP status returned by the provider, when it answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            ProviderError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A single content part sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineBinary { mime_type: String, data: Vec<u8> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn pdf(data: Vec<u8>) -> Self {
        Self::InlineBinary {
            mime_type: PDF_MIME_TYPE.to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
    pub max_output_tokens: Option<u32>,
}

/// Something that turns content parts into generated text.
///
/// The API key travels with every call; nothing is stored server-side.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        api_key: &str,
        request: GenerationRequest,
    ) -> Result<String, ProviderError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

// Variant order matters for untagged decoding.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl From<&GenerationRequest> for GenerateContentRequest {
    fn from(request: &GenerationRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => Part::Text { text: text.clone() },
                ContentPart::InlineBinary { mime_type, data } => Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.clone(),
                        data: STANDARD.encode(data),
                    },
                },
            })
            .collect();

        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: request
                .max_output_tokens
                .map(|max_output_tokens| GenerationConfig { max_output_tokens }),
        }
    }
}

/// Joins the text parts of the first candidate.
fn collect_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| match part {
                    Part::Text { text } => Some(text),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    Ok(text)
}

/// Pulls the human-readable message out of an error body, falling back to the status line.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status))
}

pub struct GeminiService {
    client: Client,
    endpoint: String,
}

impl GeminiService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }
}

#[async_trait]
impl GenerationProvider for GeminiService {
    async fn generate(
        &self,
        api_key: &str,
        request: GenerationRequest,
    ) -> Result<String, ProviderError> {
        let body = GenerateContentRequest::from(&request);

        debug!(
            "Sending generateContent request: model={}, parts={}",
            request.model,
            request.parts.len()
        );

        let response = self
            .client
            .post(self.url_for(&request.model))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            let message = error_message(status, &response_text);
            error!("Gemini API error: Status {} - {}", status, message);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = serde_json::from_str::<GenerateContentResponse>(&response_text)?;
        collect_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_pdf_request_with_token_cap() {
        let request = GenerationRequest {
            model: "gemini-2.0-flash".to_string(),
            parts: vec![ContentPart::text("Summarize"), ContentPart::pdf(b"%PDF".to_vec())],
            max_output_tokens: Some(8192),
        };

        let value = serde_json::to_value(GenerateContentRequest::from(&request)).unwrap();

        assert_eq!(
            value,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "Summarize" },
                        { "inlineData": { "mimeType": "application/pdf", "data": "JVBERg==" } }
                    ]
                }],
                "generationConfig": { "maxOutputTokens": 8192 }
            })
        );
    }

    #[test]
    fn text_request_omits_generation_config() {
        let request = GenerationRequest {
            model: "m".to_string(),
            parts: vec![ContentPart::text("Summarize"), ContentPart::text("Hello world")],
            max_output_tokens: None,
        };

        let value = serde_json::to_value(GenerateContentRequest::from(&request)).unwrap();

        assert!(value.get("generationConfig").is_none());
        assert_eq!(value["contents"][0]["parts"][1]["text"], "Hello world");
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "Hello, " }, { "text": "world" }] } },
                { "content": { "role": "model", "parts": [{ "text": "ignored" }] } }
            ],
            "usageMetadata": { "totalTokenCount": 12 }
        }))
        .unwrap();

        assert_eq!(collect_text(response).unwrap(), "Hello, world");
    }

    #[test]
    fn tolerates_non_text_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "functionCall": { "name": "f", "args": {} } },
                { "text": "answer" }
            ] } }]
        }))
        .unwrap();

        assert_eq!(collect_text(response).unwrap(), "answer");
    }

    #[test]
    fn missing_candidates_is_empty_response() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
                .unwrap();

        assert!(matches!(
            collect_text(response),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn extracts_api_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;

        assert_eq!(
            error_message(reqwest::StatusCode::BAD_REQUEST, body),
            "API key not valid. Please pass a valid API key."
        );
        assert_eq!(
            error_message(reqwest::StatusCode::BAD_GATEWAY, "<html>oops</html>"),
            "HTTP 502 Bad Gateway"
        );
    }

    #[test]
    fn builds_model_url_without_double_slash() {
        let service =
            GeminiService::new("https://example.test/v1beta/", Duration::from_secs(5)).unwrap();

        assert_eq!(
            service.url_for("gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
