//! In-memory vector store: exact cosine scan over a namespaced map.
//!
//! Suitable for tests and small corpora; the scan is O(records) per query.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::chunking::cosine_similarity;
use crate::types::RagError;

use super::{MetadataFilter, ScoredRecord, VectorRecord, VectorStore};

#[derive(Default)]
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
    dimensions: RwLock<Option<usize>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_ready(&self, dimensions: usize) -> Result<(), RagError> {
        let mut guard = self.dimensions.write();
        match *guard {
            Some(existing) if existing != dimensions => Err(RagError::Config(format!(
                "index holds {existing}-dimensional vectors, requested {dimensions}"
            ))),
            Some(_) => Ok(()),
            None => {
                *guard = Some(dimensions);
                Ok(())
            }
        }
    }

    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<(), RagError> {
        let expected = *self.dimensions.read();
        if let Some(dims) = expected {
            if let Some(bad) = records.iter().find(|r| r.vector.len() != dims) {
                return Err(RagError::Config(format!(
                    "record '{}' has {} dimensions, index expects {dims}",
                    bad.id,
                    bad.vector.len()
                )));
            }
        }
        let mut guard = self.namespaces.write();
        let space = guard.entry(namespace.to_string()).or_default();
        for record in records {
            space.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, RagError> {
        let guard = self.namespaces.read();
        let Some(space) = guard.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredRecord> = space
            .values()
            .filter(|record| filter.is_none_or(|f| f.matches(&record.metadata)))
            .map(|record| ScoredRecord {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.vector),
                metadata: record.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self, namespace: &str) -> Result<usize, RagError> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .map_or(0, HashMap::len))
    }
}
