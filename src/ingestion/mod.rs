//! Offline ingestion: documents → chunks → vectors → index.
//!
//! The pipeline walks each document page by page, chunks non-empty pages
//! semantically, tags every chunk with full provenance metadata, embeds the
//! chunk texts in bulk, and upserts fixed-size batches into the vector store
//! under the target namespace. Per-document failures are isolated: one bad
//! document never aborts the corpus run.

pub mod loader;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::chunking::SemanticChunker;
use crate::config::Settings;
use crate::embeddings::EmbeddingProvider;
use crate::models::ChunkMetadata;
use crate::stores::{VectorRecord, VectorStore};
use crate::types::RagError;

pub use loader::{DocumentLoader, PlainTextLoader};

/// Outcome of a corpus run: how much landed, what was skipped.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Chunks successfully upserted across all documents.
    pub total_chunks: usize,
    /// Documents that failed, with the error that stopped each one.
    pub failed_documents: Vec<(PathBuf, RagError)>,
}

/// Offline ingestion pipeline.
pub struct IngestionPipeline {
    loader: Arc<dyn DocumentLoader>,
    chunker: SemanticChunker,
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl IngestionPipeline {
    /// Builds the pipeline and prepares the index.
    ///
    /// Index setup is idempotent: connecting to an existing index succeeds;
    /// only a dimensionality conflict fails (fatally, as configuration).
    pub async fn new(
        settings: &Settings,
        loader: Arc<dyn DocumentLoader>,
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, RagError> {
        store.ensure_ready(embeddings.dimensions()).await?;
        Ok(Self {
            loader,
            chunker: SemanticChunker::new(Arc::clone(&embeddings)),
            embeddings,
            store,
            batch_size: settings.upsert_batch_size,
        })
    }

    /// Ingests every document, accumulating a running total and recording
    /// failed documents instead of aborting the run.
    pub async fn ingest_corpus(
        &self,
        document_paths: &[PathBuf],
        namespace: &str,
    ) -> Result<IngestReport, RagError> {
        let mut report = IngestReport::default();
        for path in document_paths {
            match self.ingest_document(path, namespace).await {
                Ok(count) => {
                    report.total_chunks += count;
                    tracing::info!(document = %path.display(), chunks = count, "ingested document");
                }
                Err(err) => {
                    tracing::warn!(document = %path.display(), error = %err, "document ingestion failed");
                    report.failed_documents.push((path.clone(), err));
                }
            }
        }
        tracing::info!(
            namespace,
            total_chunks = report.total_chunks,
            failed = report.failed_documents.len(),
            "corpus ingestion complete"
        );
        Ok(report)
    }

    /// Ingests a single document, returning the number of chunks upserted.
    pub async fn ingest_document(&self, path: &Path, namespace: &str) -> Result<usize, RagError> {
        let source_file = loader::file_name(path);
        let class_level = class_level_from_name(&source_file);
        let pages = self.loader.load_pages(path).await?;

        let mut records_pending: Vec<(String, ChunkMetadata)> = Vec::new();
        for page in &pages {
            if page.is_empty() {
                continue;
            }
            let chunks = self.chunker.chunk_page(page).await?;
            for (chunk_index, chunk_text) in chunks.into_iter().enumerate() {
                let chunk_id = Uuid::new_v4().to_string();
                let metadata = ChunkMetadata {
                    chunk_id: chunk_id.clone(),
                    chunk_text: chunk_text.clone(),
                    class_level: class_level.to_string(),
                    subject: "Science".to_string(),
                    page_number: page.page_number,
                    chunk_index,
                    source_file: source_file.clone(),
                    language: "English".to_string(),
                    indexed_at: Utc::now(),
                };
                records_pending.push((chunk_text, metadata));
            }
        }

        if records_pending.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = records_pending.iter().map(|(text, _)| text.clone()).collect();
        let vectors = self.embeddings.embed_batch(&texts).await?;
        if vectors.len() != records_pending.len() {
            return Err(RagError::Embedding(format!(
                "expected {} vectors, got {}",
                records_pending.len(),
                vectors.len()
            )));
        }

        let records: Vec<VectorRecord> = records_pending
            .into_iter()
            .zip(vectors)
            .map(|((_, metadata), vector)| VectorRecord {
                id: metadata.chunk_id.clone(),
                vector,
                metadata,
            })
            .collect();

        let total = records.len();
        for batch in records.chunks(self.batch_size) {
            self.store.upsert(namespace, batch.to_vec()).await?;
        }
        Ok(total)
    }
}

/// Derives a class tag from a document identifier.
///
/// A small fixed set of case-insensitive name patterns; anything unmatched is
/// `"Unknown"`. Never fails.
pub fn class_level_from_name(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.contains("class8") || lower.contains("classviii") {
        "Class VIII"
    } else if lower.contains("class9") || lower.contains("classix") {
        "Class IX"
    } else if lower.contains("class10") || lower.contains("classx") {
        "Class X"
    } else {
        "Unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_tag_patterns() {
        assert_eq!(class_level_from_name("ncert_class8_science.txt"), "Class VIII");
        assert_eq!(class_level_from_name("CLASSIX-biology.txt"), "Class IX");
        assert_eq!(class_level_from_name("Class10_physics.txt"), "Class X");
        assert_eq!(class_level_from_name("classx_chemistry.txt"), "Class X");
        assert_eq!(class_level_from_name("mystery_book.txt"), "Unknown");
    }

    #[test]
    fn class_tag_never_fails() {
        assert_eq!(class_level_from_name(""), "Unknown");
        assert_eq!(class_level_from_name("☃.pdf"), "Unknown");
    }
}
