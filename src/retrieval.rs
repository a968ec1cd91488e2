//! Online retrieval: query text → ranked, filtered grounding passages.

use std::sync::Arc;

use crate::config::Settings;
use crate::embeddings::EmbeddingProvider;
use crate::models::RetrievalMatch;
use crate::stores::{MetadataFilter, VectorStore};
use crate::types::RagError;

/// Retrieves grounding passages by dense-vector similarity.
pub struct Retriever {
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    namespace: String,
    similarity_threshold: f32,
}

impl Retriever {
    pub fn new(
        settings: &Settings,
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embeddings,
            store,
            namespace: settings.namespace.clone(),
            similarity_threshold: settings.similarity_threshold,
        }
    }

    /// Returns up to `top_k` passages relevant to `query`, highest similarity
    /// first.
    ///
    /// When `topic_name` is present it is prefixed onto the query to bias the
    /// embedding toward the topic. When `class_level` is present an equality
    /// filter is applied and the store is over-queried at `2 * top_k` to
    /// compensate for the reduced candidate pool. Matches below the
    /// similarity threshold are discarded as noise; an empty result is a
    /// valid outcome, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        topic_name: Option<&str>,
        class_level: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>, RagError> {
        let enhanced_query = match topic_name {
            Some(topic) => format!("{topic} {query}"),
            None => query.to_string(),
        };
        let query_vector = self.embeddings.embed(&enhanced_query).await?;

        let filter = class_level.map(MetadataFilter::class_level);
        let fetch_k = if filter.is_some() { top_k * 2 } else { top_k };

        let hits = self
            .store
            .query(&self.namespace, &query_vector, fetch_k, filter.as_ref())
            .await?;

        let matches: Vec<RetrievalMatch> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.similarity_threshold)
            .take(top_k)
            .map(|hit| RetrievalMatch {
                chunk_id: hit.id,
                text: hit.metadata.chunk_text,
                page_number: hit.metadata.page_number,
                source: hit.metadata.source_file,
                class_level: hit.metadata.class_level,
                score: hit.score,
            })
            .collect();

        tracing::debug!(
            query = %enhanced_query,
            class = ?class_level,
            requested = top_k,
            returned = matches.len(),
            "retrieval complete"
        );
        Ok(matches)
    }

    /// Topic-scoped search: synthesizes a query from the topic and class and
    /// delegates to [`retrieve`](Self::retrieve). Used when a direct user
    /// query yields no topically scoped passages.
    pub async fn search_by_topic(
        &self,
        topic_name: &str,
        class_level: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>, RagError> {
        let query = format!("{topic_name} {class_level}");
        self.retrieve(&query, Some(topic_name), Some(class_level), top_k)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::models::ChunkMetadata;
    use crate::stores::{InMemoryVectorStore, VectorRecord};
    use chrono::Utc;

    fn settings() -> Settings {
        Settings {
            api_key: "test".into(),
            api_base: "http://localhost".into(),
            chat_model: "gpt-4o-mini".into(),
            embedding_model: "mock".into(),
            embedding_dimensions: 32,
            namespace: "test-ns".into(),
            similarity_threshold: 0.25,
            upsert_batch_size: 100,
            max_retries: 3,
            mcq_option_count: 4,
            request_timeout_secs: 5,
        }
    }

    async fn store_with(provider: &MockEmbeddingProvider, entries: &[(&str, &str, &str)]) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.ensure_ready(provider.dimensions()).await.unwrap();
        let mut records = Vec::new();
        for (id, text, class) in entries {
            let vector = provider.embed(text).await.unwrap();
            records.push(VectorRecord {
                id: (*id).into(),
                vector,
                metadata: ChunkMetadata {
                    chunk_id: (*id).into(),
                    chunk_text: (*text).into(),
                    class_level: (*class).into(),
                    subject: "Science".into(),
                    page_number: 1,
                    chunk_index: 0,
                    source_file: "book.txt".into(),
                    language: "English".into(),
                    indexed_at: Utc::now(),
                },
            });
        }
        store.upsert("test-ns", records).await.unwrap();
        store
    }

    #[tokio::test]
    async fn exact_text_is_top_match_with_score_near_one() {
        let provider = MockEmbeddingProvider::new(32);
        let store = store_with(
            &provider,
            &[
                ("a", "photosynthesis in green plants", "Class IX"),
                ("b", "laws of motion and inertia", "Class IX"),
            ],
        )
        .await;

        let retriever = Retriever::new(&settings(), Arc::new(provider), store);
        let matches = retriever
            .retrieve("photosynthesis in green plants", None, None, 2)
            .await
            .unwrap();
        assert_eq!(matches[0].chunk_id, "a");
        assert!((matches[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn never_returns_below_threshold() {
        let provider = MockEmbeddingProvider::new(32);
        let store = store_with(
            &provider,
            &[
                ("a", "photosynthesis in green plants", "Class IX"),
                ("b", "completely unrelated verbiage", "Class IX"),
                ("c", "another orthogonal passage", "Class IX"),
            ],
        )
        .await;

        let retriever = Retriever::new(&settings(), Arc::new(provider), store);
        let matches = retriever
            .retrieve("photosynthesis in green plants", None, None, 3)
            .await
            .unwrap();
        assert!(matches.iter().all(|m| m.score >= 0.25));
    }

    #[tokio::test]
    async fn class_filter_restricts_and_result_truncates_to_top_k() {
        let provider = MockEmbeddingProvider::new(32);
        let text = "chemical reactions and equations";
        let store = store_with(
            &provider,
            &[
                ("v8", text, "Class VIII"),
                ("v9", text, "Class IX"),
                ("v10", text, "Class X"),
            ],
        )
        .await;

        let retriever = Retriever::new(&settings(), Arc::new(provider), store);
        let matches = retriever
            .retrieve(text, None, Some("Class IX"), 1)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].class_level, "Class IX");
    }

    #[tokio::test]
    async fn empty_index_yields_empty_not_error() {
        let provider = MockEmbeddingProvider::new(32);
        let store = Arc::new(InMemoryVectorStore::new());
        let retriever = Retriever::new(&settings(), Arc::new(provider), store);
        let matches = retriever
            .search_by_topic("Light and Reflection", "Class X", 5)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}
