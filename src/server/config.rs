use std::time::Duration;

use crate::relay::ModelSettings;
use crate::utils::gemini::DEFAULT_ENDPOINT;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PDF_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash-preview-04-17";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Model used for PDF and ZIP uploads.
    pub pdf_model: String,
    /// Model used for plain-text queries.
    pub text_model: String,
    /// Output cap for document calls; text calls are uncapped.
    pub max_output_tokens: u32,
    pub provider_endpoint: String,
    pub provider_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            pdf_model: DEFAULT_PDF_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            provider_endpoint: DEFAULT_ENDPOINT.to_string(),
            provider_timeout: Duration::from_secs(120),
            body_limit_bytes: 50 * 1024 * 1024,
        }
    }
}

impl RelayConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn document_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.pdf_model.clone(),
            max_output_tokens: Some(self.max_output_tokens),
        }
    }

    pub fn text_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.text_model.clone(),
            max_output_tokens: None,
        }
    }
}
