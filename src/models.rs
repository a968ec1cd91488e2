//! Domain types shared across ingestion, retrieval, and generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of a source document, produced by a loader and consumed once by
/// the chunker.
#[derive(Debug, Clone)]
pub struct Page {
    /// Source document identifier (typically the filename).
    pub source_id: String,
    /// 1-based page number.
    pub page_number: u32,
    /// Raw page text.
    pub raw_text: String,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.raw_text.trim().is_empty()
    }
}

/// Provenance and tagging carried by every indexed chunk.
///
/// `chunk_id` is assigned once during ingestion and never changes; re-ingesting
/// a corpus produces fresh ids and overwrites by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub chunk_text: String,
    pub class_level: String,
    pub subject: String,
    pub page_number: u32,
    pub chunk_index: usize,
    pub source_file: String,
    pub language: String,
    pub indexed_at: DateTime<Utc>,
}

/// Ephemeral retrieval result, ranked by similarity.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalMatch {
    pub chunk_id: String,
    pub text: String,
    pub page_number: u32,
    pub source: String,
    pub class_level: String,
    pub score: f32,
}

/// Citation forwarded with chat responses: where a context passage came from.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceCitation {
    pub page_number: u32,
    pub source: String,
    pub class_level: String,
}

impl From<&RetrievalMatch> for SourceCitation {
    fn from(m: &RetrievalMatch) -> Self {
        Self {
            page_number: m.page_number,
            source: m.source.clone(),
            class_level: m.class_level.clone(),
        }
    }
}

/// Question categories a quiz may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Mcq,
    FillBlank,
    ShortAnswer,
}

/// A single validated quiz question.
///
/// `options` is `Some` exactly when `kind` is [`QuestionKind::Mcq`], and then
/// holds exactly four entries with `correct_answer` among them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A generated quiz, stored for later evaluation. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub quiz_id: String,
    pub topic_id: String,
    pub topic_name: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

/// Verdict for one answered question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub is_correct: bool,
    pub feedback: String,
    pub needs_review: bool,
}

/// Outcome of evaluating a quiz submission. Immutable; retrievable by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub evaluation_id: String,
    pub quiz_id: String,
    pub total_questions: usize,
    pub correct_count: usize,
    pub score_percentage: f64,
    pub question_results: Vec<QuestionResult>,
    pub topics_to_review: Vec<String>,
    pub overall_feedback: String,
}

impl Evaluation {
    /// Score as a percentage, with the zero-question quiz defined as 0.
    pub fn percentage(correct: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            100.0 * correct as f64 / total as f64
        }
    }
}

/// Generated summary of a topic.
#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    pub topic_id: String,
    pub topic_name: String,
    pub summary: String,
    pub key_points: Vec<String>,
}

/// One turn of prior conversation carried into a chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_handles_zero_total() {
        assert_eq!(Evaluation::percentage(0, 0), 0.0);
        assert_eq!(Evaluation::percentage(3, 5), 60.0);
        assert_eq!(Evaluation::percentage(5, 5), 100.0);
    }

    #[test]
    fn question_kind_serializes_snake_case() {
        let json = serde_json::to_string(&QuestionKind::FillBlank).unwrap();
        assert_eq!(json, "\"fill_blank\"");
        let kind: QuestionKind = serde_json::from_str("\"short_answer\"").unwrap();
        assert_eq!(kind, QuestionKind::ShortAnswer);
    }
}
