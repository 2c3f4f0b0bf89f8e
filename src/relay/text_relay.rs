use std::sync::Arc;

use tracing::info;

use super::{missing_fields, present, ModelSettings, RelayError};
use crate::utils::content_guard::preview;
use crate::utils::gemini::{ContentPart, GenerationProvider, GenerationRequest};

#[derive(Debug, Default)]
pub struct TextRelayInput {
    pub prompt: Option<String>,
    pub query: Option<String>,
    pub api_key: Option<String>,
}

/// Relays a prompt plus free text, no file involved.
pub struct TextRelay {
    provider: Arc<dyn GenerationProvider>,
    settings: ModelSettings,
}

impl TextRelay {
    pub fn new(provider: Arc<dyn GenerationProvider>, settings: ModelSettings) -> Self {
        Self { provider, settings }
    }

    pub async fn execute(&self, input: TextRelayInput) -> Result<String, RelayError> {
        let (prompt, query, api_key) = match (
            present(&input.prompt),
            present(&input.query),
            present(&input.api_key),
        ) {
            (Some(prompt), Some(query), Some(api_key)) => (prompt, query, api_key),
            (prompt, query, api_key) => {
                return Err(missing_fields(&[
                    ("prompt", prompt.is_some()),
                    ("query", query.is_some()),
                    ("apiKey", api_key.is_some()),
                ]))
            }
        };

        info!(
            "Relaying text query ({} chars) with prompt \"{}\"",
            query.chars().count(),
            preview(prompt)
        );

        let request = GenerationRequest {
            model: self.settings.model.clone(),
            parts: vec![ContentPart::text(prompt), ContentPart::text(query)],
            max_output_tokens: self.settings.max_output_tokens,
        };

        Ok(self.provider.generate(api_key, request).await?)
    }
}
