use std::sync::Arc;

use tracing::{info, warn};

use super::{generate_for_document, missing_fields, present, ModelSettings, RelayError};
use crate::utils::archive::Document;
use crate::utils::content_guard::{has_extension, looks_like_pdf, preview};
use crate::utils::gemini::GenerationProvider;

#[derive(Debug, Default)]
pub struct PdfRelayInput {
    pub prompt: Option<String>,
    pub api_key: Option<String>,
    pub file: Option<Document>,
}

/// Relays one uploaded PDF plus a prompt to the model.
pub struct PdfRelay {
    provider: Arc<dyn GenerationProvider>,
    settings: ModelSettings,
}

impl PdfRelay {
    pub fn new(provider: Arc<dyn GenerationProvider>, settings: ModelSettings) -> Self {
        Self { provider, settings }
    }

    pub async fn execute(&self, input: PdfRelayInput) -> Result<String, RelayError> {
        let file = input.file.filter(|f| !f.content.is_empty());

        let (prompt, api_key, file) =
            match (present(&input.prompt), present(&input.api_key), file) {
                (Some(prompt), Some(api_key), Some(file)) => (prompt, api_key, file),
                (prompt, api_key, file) => {
                    return Err(missing_fields(&[
                        ("prompt", prompt.is_some()),
                        ("apiKey", api_key.is_some()),
                        ("file", file.is_some()),
                    ]))
                }
            };

        if !has_extension(&file.name, "pdf") {
            return Err(RelayError::Validation("The file must be a PDF.".to_string()));
        }

        if !looks_like_pdf(&file.content) {
            warn!("{} has a .pdf name but no PDF signature", file.name);
        }

        info!(
            "Relaying PDF {} ({} bytes) with prompt \"{}\"",
            file.name,
            file.content.len(),
            preview(prompt)
        );

        let answer =
            generate_for_document(self.provider.as_ref(), api_key, &self.settings, prompt, &file)
                .await?;

        Ok(answer)
    }
}
