pub mod pdf_relay;
pub mod text_relay;
pub mod zip_relay;

use thiserror::Error;

use crate::utils::archive::{ArchiveError, Document};
use crate::utils::gemini::{ContentPart, GenerationProvider, GenerationRequest, ProviderError};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Model and output cap used for one kind of relay call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub model: String,
    pub max_output_tokens: Option<u32>,
}

/// Treats `None` and empty strings the same way.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Builds the validation error naming every absent field, in the order given.
pub(crate) fn missing_fields(fields: &[(&str, bool)]) -> RelayError {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, is_present)| !is_present)
        .map(|(name, _)| *name)
        .collect();

    RelayError::Validation(format!(
        "Missing required field(s): {}.",
        missing.join(", ")
    ))
}

/// Sends `[prompt, inline PDF]` to the provider and returns its text.
pub(crate) async fn generate_for_document(
    provider: &dyn GenerationProvider,
    api_key: &str,
    settings: &ModelSettings,
    prompt: &str,
    document: &Document,
) -> Result<String, ProviderError> {
    let request = GenerationRequest {
        model: settings.model.clone(),
        parts: vec![
            ContentPart::text(prompt),
            ContentPart::pdf(document.content.clone()),
        ],
        max_output_tokens: settings.max_output_tokens,
    };

    provider.generate(api_key, request).await
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_every_missing_field() {
        let err = missing_fields(&[("prompt", false), ("apiKey", true), ("file", false)]);

        assert!(matches!(err, RelayError::Validation(_)));
        assert_eq!(err.to_string(), "Missing required field(s): prompt, file.");
    }

    #[test]
    fn empty_strings_are_not_present() {
        assert_eq!(present(&None), None);
        assert_eq!(present(&Some(String::new())), None);
        assert_eq!(present(&Some("key".to_string())), Some("key"));
    }
}
