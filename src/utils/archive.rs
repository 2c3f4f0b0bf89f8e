use std::io::{Cursor, Read};

use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

use super::content_guard::has_extension;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("The uploaded file is not a valid ZIP archive: {0}")]
    Format(#[from] zip::result::ZipError),

    #[error("Failed to read archive entry '{name}': {source}")]
    Entry {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive entry '{name}' exceeds the {limit} byte size limit")]
    TooLarge { name: String, limit: u64 },
}

/// A named PDF payload, either uploaded directly or pulled out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub content: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }
}

/// Largest decompressed size accepted for a single archive entry.
pub const MAX_DOCUMENT_SIZE: u64 = 100_000_000;

/// Extracts every non-directory entry whose name ends in `.pdf` (any case)
/// from an in-memory ZIP archive, in the archive's enumeration order.
///
/// An archive without matching entries yields an empty vector; callers decide
/// whether that is an error.
pub fn extract_documents(archive_bytes: &[u8]) -> Result<Vec<Document>, ArchiveError> {
    extract_documents_with_limit(archive_bytes, MAX_DOCUMENT_SIZE)
}

/// Same as [`extract_documents`], with an explicit per-entry size cap in bytes.
///
/// Entries are filtered by name from the central directory, so the data of
/// skipped entries is never opened or decompressed.
pub fn extract_documents_with_limit(
    archive_bytes: &[u8],
    max_entry_size: u64,
) -> Result<Vec<Document>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))?;
    let mut documents = Vec::new();

    for index in 0..archive.len() {
        let name = match archive.name_for_index(index) {
            Some(name) if !is_directory(name) && has_extension(name, "pdf") => name.to_string(),
            other => {
                debug!("Skipping archive entry: {}", other.unwrap_or("<unnamed>"));
                continue;
            }
        };

        let entry = archive.by_index(index)?;
        if entry.size() > max_entry_size {
            return Err(ArchiveError::TooLarge {
                name,
                limit: max_entry_size,
            });
        }

        // Declared sizes can lie; read at most one byte past the cap
        let mut content = Vec::new();
        entry
            .take(max_entry_size.saturating_add(1))
            .read_to_end(&mut content)
            .map_err(|source| ArchiveError::Entry {
                name: name.clone(),
                source,
            })?;

        if content.len() as u64 > max_entry_size {
            return Err(ArchiveError::TooLarge {
                name,
                limit: max_entry_size,
            });
        }

        debug!("Extracted {} ({} bytes)", name, content.len());
        documents.push(Document::new(name, content));
    }

    Ok(documents)
}

fn is_directory(name: &str) -> bool {
    name.ends_with('/') || name.ends_with('\\')
}
