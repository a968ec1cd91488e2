//! Semantic chunking: splitting a page into topically coherent passages.
//!
//! Rather than fixed-size windows, the chunker embeds consecutive sentence
//! groups and splits where the semantic distance between neighbors spikes
//! above a percentile of the page's distance distribution. Downstream
//! retrieval quality depends on each chunk being self-contained and
//! on-topic, which character-count windows cannot guarantee.

pub mod segmenter;

use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::models::Page;
use crate::types::RagError;

/// Tunables for breakpoint detection.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Sentences per embedded unit.
    pub sentences_per_unit: usize,
    /// Distance percentile above which a boundary is inserted.
    pub breakpoint_percentile: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            sentences_per_unit: 3,
            breakpoint_percentile: 95.0,
        }
    }
}

/// Splits page text at embedding-distance breakpoints.
pub struct SemanticChunker {
    provider: Arc<dyn EmbeddingProvider>,
    config: ChunkingConfig,
}

impl SemanticChunker {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            config: ChunkingConfig::default(),
        }
    }

    pub fn with_config(provider: Arc<dyn EmbeddingProvider>, config: ChunkingConfig) -> Self {
        Self { provider, config }
    }

    /// Chunks one page into ordered passages.
    ///
    /// An empty or whitespace-only page yields zero chunks. A page shorter
    /// than two semantic units yields exactly one chunk equal to the whole
    /// page. An embedding failure fails the whole page; there is no silent
    /// fallback to a different splitting strategy.
    pub async fn chunk_page(&self, page: &Page) -> Result<Vec<String>, RagError> {
        if page.is_empty() {
            return Ok(Vec::new());
        }

        let sentences = segmenter::split_sentences(&page.raw_text);
        let units = segmenter::group_sentences(&sentences, self.config.sentences_per_unit);
        if units.len() <= 1 {
            return Ok(vec![page.raw_text.clone()]);
        }

        let embeddings = self
            .provider
            .embed_batch(&units)
            .await
            .map_err(|err| RagError::Chunking(err.to_string()))?;
        if embeddings.len() != units.len() {
            return Err(RagError::Chunking(format!(
                "expected {} unit embeddings, got {}",
                units.len(),
                embeddings.len()
            )));
        }

        let distances: Vec<f64> = embeddings
            .windows(2)
            .map(|pair| 1.0 - f64::from(cosine_similarity(&pair[0], &pair[1])))
            .collect();
        let threshold = percentile(&distances, self.config.breakpoint_percentile);

        let mut chunks = Vec::new();
        let mut current = String::new();
        for (i, unit) in units.iter().enumerate() {
            current.push_str(unit);
            let boundary = i < distances.len() && distances[i] > threshold;
            if boundary {
                chunks.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        tracing::debug!(
            source = %page.source_id,
            page = page.page_number,
            units = units.len(),
            chunks = chunks.len(),
            "chunked page"
        );
        Ok(chunks)
    }
}

/// Cosine similarity between two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Nearest-rank percentile over an unsorted sample.
fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return f64::INFINITY;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
