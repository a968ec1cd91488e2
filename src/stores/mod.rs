//! Storage abstractions: the vector index and the keyed artifact stores.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorStore trait│
//!                  │ (namespaced ANN) │
//!                  └────────┬─────────┘
//!                           │
//!              ┌────────────┴────────────┐
//!              ▼                         ▼
//!     ┌─────────────────┐      ┌─────────────────┐
//!     │ InMemoryVector  │      │ SqliteVector    │
//!     │ Store (tests)   │      │ Store (vec ext) │
//!     └─────────────────┘      └─────────────────┘
//! ```
//!
//! Generated quizzes and evaluations live in a [`KeyedStore`], injected into
//! the generation service so lifecycle and concurrency are explicit rather
//! than hidden behind process-wide globals.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::ChunkMetadata;
use crate::types::RagError;

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// The persisted unit of the vector index: id, vector, and chunk metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A query hit with its cosine similarity score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Equality filter over indexed metadata fields.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub class_level: Option<String>,
    pub source_file: Option<String>,
}

impl MetadataFilter {
    pub fn class_level(value: impl Into<String>) -> Self {
        Self {
            class_level: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn source_file(value: impl Into<String>) -> Self {
        Self {
            source_file: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(class) = &self.class_level {
            if &metadata.class_level != class {
                return false;
            }
        }
        if let Some(source) = &self.source_file {
            if &metadata.source_file != source {
                return false;
            }
        }
        true
    }
}

/// Namespaced, metadata-filterable nearest-neighbor index.
///
/// Upsert is idempotent per id: writing the same id twice leaves exactly one
/// record. Queries rank by cosine similarity, highest first.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Prepares the index for the given dimensionality. Connecting to an
    /// index that already exists is the success path; a dimensionality
    /// conflict is a [`RagError::Config`].
    async fn ensure_ready(&self, dimensions: usize) -> Result<(), RagError>;

    /// Inserts or overwrites records by id within a namespace.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<(), RagError>;

    /// Returns the `top_k` nearest neighbors of `vector` within a namespace,
    /// optionally restricted by a metadata filter.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, RagError>;

    /// Total records in a namespace.
    async fn count(&self, namespace: &str) -> Result<usize, RagError>;
}

/// Keyed store for generated artifacts (quizzes, evaluations).
///
/// Backing implementations must support concurrent insert/lookup; the
/// in-process map below guards access with a read-write lock.
pub trait KeyedStore<T: Clone + Send + Sync>: Send + Sync {
    fn put(&self, id: &str, value: T);
    fn get(&self, id: &str) -> Option<T>;
    fn exists(&self, id: &str) -> bool;
}

/// In-process keyed store over a lock-guarded map.
pub struct InMemoryStore<T> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> KeyedStore<T> for InMemoryStore<T> {
    fn put(&self, id: &str, value: T) {
        self.entries.write().insert(id.to_string(), value);
    }

    fn get(&self, id: &str) -> Option<T> {
        self.entries.read().get(id).cloned()
    }

    fn exists(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metadata(class: &str, source: &str) -> ChunkMetadata {
        ChunkMetadata {
            chunk_id: "c1".into(),
            chunk_text: "text".into(),
            class_level: class.into(),
            subject: "Science".into(),
            page_number: 1,
            chunk_index: 0,
            source_file: source.into(),
            language: "English".into(),
            indexed_at: Utc::now(),
        }
    }

    #[test]
    fn filter_matches_on_equality() {
        let meta = metadata("Class IX", "class9_science.txt");
        assert!(MetadataFilter::class_level("Class IX").matches(&meta));
        assert!(!MetadataFilter::class_level("Class X").matches(&meta));
        assert!(MetadataFilter::source_file("class9_science.txt").matches(&meta));
        assert!(MetadataFilter::default().matches(&meta));
    }

    #[test]
    fn keyed_store_put_get_exists() {
        let store: InMemoryStore<String> = InMemoryStore::new();
        assert!(!store.exists("a"));
        assert!(store.get("a").is_none());

        store.put("a", "first".into());
        assert!(store.exists("a"));
        assert_eq!(store.get("a").as_deref(), Some("first"));

        store.put("a", "second".into());
        assert_eq!(store.get("a").as_deref(), Some("second"));
    }

    #[test]
    fn keyed_store_concurrent_access() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::<usize>::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    store.put(&format!("k{i}-{j}"), i * 100 + j);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("k3-42"), Some(342));
    }
}
