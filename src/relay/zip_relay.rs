use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info};

use super::{generate_for_document, missing_fields, present, ModelSettings, RelayError};
use crate::utils::archive::{extract_documents, Document};
use crate::utils::content_guard::{has_extension, preview};
use crate::utils::gemini::GenerationProvider;

#[derive(Debug, Default)]
pub struct ZipRelayInput {
    pub prompt: Option<String>,
    pub api_key: Option<String>,
    pub file: Option<Document>,
}

/// Relays every PDF inside an uploaded ZIP archive, one model call per PDF.
///
/// All calls run concurrently and the answers come back in archive order.
/// A single failed call fails the whole batch.
pub struct ZipRelay {
    provider: Arc<dyn GenerationProvider>,
    settings: ModelSettings,
}

impl ZipRelay {
    pub fn new(provider: Arc<dyn GenerationProvider>, settings: ModelSettings) -> Self {
        Self { provider, settings }
    }

    pub async fn execute(&self, input: ZipRelayInput) -> Result<Vec<String>, RelayError> {
        let file = input.file.filter(|f| !f.content.is_empty());

        let (prompt, api_key, archive) =
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

        if !has_extension(&archive.name, "zip") {
            return Err(RelayError::Validation("The file must be a ZIP archive.".to_string()));
        }

        let documents = extract_documents(&archive.content)?;
        if documents.is_empty() {
            return Err(RelayError::Validation(
                "The ZIP archive contains no PDFs.".to_string(),
            ));
        }

        info!(
            "Relaying {} PDFs from {} with prompt \"{}\"",
            documents.len(),
            archive.name,
            preview(prompt)
        );

        // join_all yields outputs in input order regardless of completion order
        let results = join_all(documents.iter().map(|document| {
            generate_for_document(
                self.provider.as_ref(),
                api_key,
                &self.settings,
                prompt,
                document,
            )
        }))
        .await;

        let mut answers = Vec::with_capacity(results.len());
        for (document, result) in documents.iter().zip(results) {
            match result {
                Ok(answer) => answers.push(answer),
                Err(e) => {
                    error!("Generation failed for {}: {}", document.name, e);
                    return Err(e.into());
                }
            }
        }

        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::relay::testing::{document_text, MockProvider};
    use crate::utils::archive::tests::build_zip;

    fn settings() -> ModelSettings {
        ModelSettings {
            model: "gemini-2.0-flash".to_string(),
            max_output_tokens: Some(8192),
        }
    }

    fn input(file_name: &str, bytes: Vec<u8>) -> ZipRelayInput {
        ZipRelayInput {
            prompt: Some("Extract the totals".to_string()),
            api_key: Some("key".to_string()),
            file: Some(Document::new(file_name, bytes)),
        }
    }

    #[tokio::test]
    async fn preserves_archive_order_when_later_calls_finish_first() {
        // a.pdf is slowest, c.pdf fastest
        let provider = Arc::new(MockProvider::new(|request| {
            let text = document_text(request);
            let delay = match text.as_str() {
                "doc-a" => Duration::from_millis(120),
                "doc-b" => Duration::from_millis(60),
                _ => Duration::ZERO,
            };
            (delay, Ok(format!("result({})", text)))
        }));
        let relay = ZipRelay::new(provider.clone(), settings());
        let zip = build_zip(&[("a.pdf", "doc-a"), ("b.pdf", "doc-b"), ("c.pdf", "doc-c")]);

        let answers = relay.execute(input("batch.zip", zip)).await.unwrap();

        assert_eq!(answers, vec!["result(doc-a)", "result(doc-b)", "result(doc-c)"]);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn calls_run_concurrently() {
        let provider = Arc::new(MockProvider::new(|_| {
            (Duration::from_millis(200), Ok("ok".to_string()))
        }));
        let relay = ZipRelay::new(provider, settings());
        let zip = build_zip(&[
            ("1.pdf", "1"),
            ("2.pdf", "2"),
            ("3.pdf", "3"),
            ("4.pdf", "4"),
        ]);

        let started = Instant::now();
        let answers = relay.execute(input("batch.zip", zip)).await.unwrap();

        assert_eq!(answers.len(), 4);
        assert!(started.elapsed() < Duration::from_millis(700));
    }

    #[tokio::test]
    async fn one_failure_fails_the_batch() {
        let provider = Arc::new(MockProvider::new(|request| {
            if document_text(request) == "doc-b" {
                (Duration::ZERO, Err("document b rejected".to_string()))
            } else {
                (Duration::from_millis(20), Ok("fine".to_string()))
            }
        }));
        let relay = ZipRelay::new(provider.clone(), settings());
        let zip = build_zip(&[("a.pdf", "doc-a"), ("b.pdf", "doc-b"), ("c.pdf", "doc-c")]);

        let err = relay.execute(input("batch.zip", zip)).await.unwrap_err();

        assert!(matches!(err, RelayError::Provider(_)));
        assert_eq!(err.to_string(), "document b rejected");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn only_pdf_entries_are_relayed() {
        let provider = Arc::new(MockProvider::echoing_document());
        let relay = ZipRelay::new(provider.clone(), settings());
        let zip = build_zip(&[
            ("report.PDF", "report"),
            ("notes.txt", "notes"),
            ("nested/", ""),
        ]);

        let answers = relay.execute(input("Upload.ZIP", zip)).await.unwrap();

        assert_eq!(answers, vec!["report"]);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn archive_without_pdfs_is_a_validation_error() {
        let provider = Arc::new(MockProvider::replying("never"));
        let relay = ZipRelay::new(provider.clone(), settings());
        let zip = build_zip(&[("notes.txt", "notes")]);

        let err = relay.execute(input("batch.zip", zip)).await.unwrap_err();

        assert!(matches!(err, RelayError::Validation(_)));
        assert_eq!(err.to_string(), "The ZIP archive contains no PDFs.");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn wrong_extension_is_rejected() {
        let provider = Arc::new(MockProvider::replying("never"));
        let relay = ZipRelay::new(provider.clone(), settings());
        let zip = build_zip(&[("a.pdf", "doc-a")]);

        let err = relay.execute(input("batch.tar", zip)).await.unwrap_err();

        assert!(matches!(err, RelayError::Validation(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_archive_error() {
        let provider = Arc::new(MockProvider::replying("never"));
        let relay = ZipRelay::new(provider.clone(), settings());

        let err = relay
            .execute(input("batch.zip", b"not a zip at all".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Archive(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn missing_fields_fail_without_provider_call() {
        let provider = Arc::new(MockProvider::replying("never"));
        let relay = ZipRelay::new(provider.clone(), settings());

        let err = relay
            .execute(ZipRelayInput {
                prompt: Some("p".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Missing required field(s): apiKey, file.");
        assert_eq!(provider.calls(), 0);
    }
}
