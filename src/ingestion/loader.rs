//! Document loading: file → ordered pages.
//!
//! PDF and OCR extraction are external collaborators; this crate consumes
//! their output as paginated plain text. The reference loader reads UTF-8
//! files with form-feed (`\x0C`) page separators, the conventional output
//! of `pdftotext`-style extractors.

use std::path::Path;

use async_trait::async_trait;

use crate::models::Page;
use crate::types::RagError;

/// Turns a document path into its pages, in order, 1-based.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load_pages(&self, path: &Path) -> Result<Vec<Page>, RagError>;
}

/// Loads form-feed paginated plain text.
#[derive(Default)]
pub struct PlainTextLoader;

#[async_trait]
impl DocumentLoader for PlainTextLoader {
    async fn load_pages(&self, path: &Path) -> Result<Vec<Page>, RagError> {
        let source_id = file_name(path);
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| RagError::Io(format!("failed to read {}: {err}", path.display())))?;

        let pages = contents
            .split('\x0C')
            .enumerate()
            .map(|(i, text)| Page {
                source_id: source_id.clone(),
                page_number: (i + 1) as u32,
                raw_text: text.to_string(),
            })
            .collect();
        Ok(pages)
    }
}

/// Final path component as the source identifier.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
