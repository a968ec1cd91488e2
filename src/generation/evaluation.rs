//! Evaluation response parsing.
//!
//! The model returns a JSON verdict over the whole submission. Parsing is
//! conservative: unusable output degrades to an all-incorrect result with
//! generic feedback, and the numeric fields are recomputed locally so the
//! score always agrees with the counts.

use serde::Deserialize;

use crate::models::{Evaluation, QuestionResult};

#[derive(Deserialize)]
struct RawEvaluation {
    correct_count: Option<usize>,
    #[serde(default)]
    question_results: Vec<RawQuestionResult>,
    #[serde(default)]
    topics_to_review: Vec<String>,
    overall_feedback: Option<String>,
}

#[derive(Deserialize)]
struct RawQuestionResult {
    question_id: Option<String>,
    is_correct: Option<bool>,
    feedback: Option<String>,
    needs_review: Option<bool>,
}

/// Model verdict with the identifiers not yet assigned.
#[derive(Debug, Clone)]
pub struct ParsedEvaluation {
    pub total_questions: usize,
    pub correct_count: usize,
    pub score_percentage: f64,
    pub question_results: Vec<QuestionResult>,
    pub topics_to_review: Vec<String>,
    pub overall_feedback: String,
}

const FALLBACK_FEEDBACK: &str =
    "Evaluation completed. Please review your answers against the quiz.";

/// Parses an evaluation completion, never failing.
///
/// The reported `correct_count` is clamped to `total_questions` and the
/// percentage recomputed from the clamped counts. Malformed JSON yields the
/// conservative fallback: zero correct, no per-question verdicts, the topic
/// queued for review.
pub fn parse_evaluation(
    response: &str,
    topic_name: &str,
    total_questions: usize,
) -> ParsedEvaluation {
    let raw: RawEvaluation = match serde_json::from_str(response) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(error = %err, "evaluation response was not valid JSON, using fallback");
            return fallback(topic_name, total_questions);
        }
    };

    let correct_count = raw.correct_count.unwrap_or(0).min(total_questions);
    let question_results = raw
        .question_results
        .into_iter()
        .enumerate()
        .map(|(i, result)| QuestionResult {
            question_id: result
                .question_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("q{}", i + 1)),
            is_correct: result.is_correct.unwrap_or(false),
            feedback: result.feedback.unwrap_or_default(),
            needs_review: result.needs_review.unwrap_or(false),
        })
        .collect();

    ParsedEvaluation {
        total_questions,
        correct_count,
        score_percentage: Evaluation::percentage(correct_count, total_questions),
        question_results,
        topics_to_review: raw.topics_to_review,
        overall_feedback: raw
            .overall_feedback
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_FEEDBACK.to_string()),
    }
}

fn fallback(topic_name: &str, total_questions: usize) -> ParsedEvaluation {
    ParsedEvaluation {
        total_questions,
        correct_count: 0,
        score_percentage: Evaluation::percentage(0, total_questions),
        question_results: Vec::new(),
        topics_to_review: vec![topic_name.to_string()],
        overall_feedback: FALLBACK_FEEDBACK.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_evaluation() {
        let response = serde_json::json!({
            "total_questions": 2,
            "correct_count": 1,
            "score_percentage": 50.0,
            "question_results": [
                {"question_id": "q1", "is_correct": true, "feedback": "Correct.", "needs_review": false},
                {"question_id": "q2", "is_correct": false, "feedback": "Review reflection.", "needs_review": true}
            ],
            "topics_to_review": ["Reflection of light"],
            "overall_feedback": "Good effort."
        })
        .to_string();

        let parsed = parse_evaluation(&response, "Light", 2);
        assert_eq!(parsed.correct_count, 1);
        assert_eq!(parsed.score_percentage, 50.0);
        assert_eq!(parsed.question_results.len(), 2);
        assert_eq!(parsed.overall_feedback, "Good effort.");
    }

    #[test]
    fn correct_count_is_clamped_and_score_recomputed() {
        let response = serde_json::json!({
            "correct_count": 9,
            "score_percentage": 450.0,
            "question_results": [],
            "overall_feedback": "Confused model."
        })
        .to_string();

        let parsed = parse_evaluation(&response, "Light", 3);
        assert_eq!(parsed.correct_count, 3);
        assert_eq!(parsed.score_percentage, 100.0);
    }

    #[test]
    fn malformed_json_uses_conservative_fallback() {
        let parsed = parse_evaluation("not json at all", "Light", 4);
        assert_eq!(parsed.correct_count, 0);
        assert_eq!(parsed.score_percentage, 0.0);
        assert!(parsed.question_results.is_empty());
        assert_eq!(parsed.topics_to_review, vec!["Light".to_string()]);
        assert!(!parsed.overall_feedback.is_empty());
    }

    #[test]
    fn zero_question_quiz_scores_zero_without_panic() {
        let parsed = parse_evaluation("{}", "Light", 0);
        assert_eq!(parsed.correct_count, 0);
        assert_eq!(parsed.score_percentage, 0.0);
    }

    #[test]
    fn missing_result_ids_default_positionally() {
        let response = serde_json::json!({
            "correct_count": 1,
            "question_results": [
                {"is_correct": true, "feedback": "ok"}
            ]
        })
        .to_string();

        let parsed = parse_evaluation(&response, "Light", 1);
        assert_eq!(parsed.question_results[0].question_id, "q1");
    }
}
