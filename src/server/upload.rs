use std::collections::HashMap;

use axum::extract::Multipart;
use tracing::debug;

use super::types::ApiError;
use crate::utils::archive::Document;

/// Upload field names checked for the file, highest priority first.
pub const FILE_SLOTS: &[&str] = &["file", "document"];

/// A buffered multipart form: text fields plus file parts keyed by field name.
///
/// When a field name repeats, the first occurrence wins.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Document>,
}

impl UploadForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    debug!(
                        "Received file part '{}': {} ({} bytes)",
                        name,
                        file_name,
                        bytes.len()
                    );
                    form.files
                        .entry(name)
                        .or_insert_with(|| Document::new(file_name, bytes.to_vec()));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.entry(name).or_insert(value);
                }
            }
        }

        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    /// Returns the file in the first slot that holds one.
    pub fn file(&self, slots: &[&str]) -> Option<Document> {
        slots
            .iter()
            .find_map(|slot| self.files.get(*slot))
            .cloned()
    }

    #[cfg(test)]
    pub(crate) fn with_file(mut self, slot: &str, document: Document) -> Self {
        self.files.insert(slot.to_string(), document);
        self
    }
}
