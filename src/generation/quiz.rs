//! Quiz response parsing and shape validation.
//!
//! The model is asked for a JSON object with a `questions` array. Output that
//! fails to parse degrades to an empty question list; individual questions
//! that fail validation are dropped, except a missing `question_id`, which is
//! repaired to its positional default.

use serde::Deserialize;

use crate::models::{Question, QuestionKind};

#[derive(Deserialize)]
struct RawQuizPayload {
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    question_id: Option<String>,
    question_type: Option<String>,
    question: Option<String>,
    options: Option<Vec<String>>,
    correct_answer: Option<String>,
    explanation: Option<String>,
}

/// Parses a quiz completion into validated questions.
///
/// Malformed JSON yields an empty list, never an error; the caller decides
/// whether "no questions" is reportable. `mcq_option_count` is the exact
/// option count every multiple-choice question must carry.
pub fn parse_quiz_questions(response: &str, mcq_option_count: usize) -> Vec<Question> {
    let payload: RawQuizPayload = match serde_json::from_str(response) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "quiz response was not valid JSON, returning no questions");
            return Vec::new();
        }
    };

    payload
        .questions
        .into_iter()
        .enumerate()
        .filter_map(|(i, raw)| validate_question(raw, i + 1, mcq_option_count))
        .collect()
}

fn validate_question(raw: RawQuestion, position: usize, mcq_option_count: usize) -> Option<Question> {
    let kind = match raw.question_type.as_deref() {
        Some("mcq") => QuestionKind::Mcq,
        Some("fill_blank") => QuestionKind::FillBlank,
        Some("short_answer") => QuestionKind::ShortAnswer,
        other => {
            tracing::warn!(position, question_type = ?other, "dropping question with unknown type");
            return None;
        }
    };

    let prompt = raw.question.filter(|q| !q.trim().is_empty())?;
    let correct_answer = match raw.correct_answer.filter(|a| !a.trim().is_empty()) {
        Some(answer) => answer,
        None => {
            tracing::warn!(position, "dropping question without a correct answer");
            return None;
        }
    };

    let options = match kind {
        QuestionKind::Mcq => {
            let options = raw.options?;
            if options.len() != mcq_option_count || !options.contains(&correct_answer) {
                tracing::warn!(
                    position,
                    option_count = options.len(),
                    "dropping malformed multiple-choice question"
                );
                return None;
            }
            Some(options)
        }
        QuestionKind::FillBlank | QuestionKind::ShortAnswer => None,
    };

    let question_id = raw
        .question_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("q{position}"));

    Some(Question {
        question_id,
        kind,
        prompt,
        options,
        correct_answer,
        explanation: raw.explanation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_mixed_quiz() {
        let response = serde_json::json!({
            "questions": [
                {
                    "question_id": "q1",
                    "question_type": "mcq",
                    "question": "Which gas do plants absorb?",
                    "options": ["Oxygen", "Carbon dioxide", "Nitrogen", "Helium"],
                    "correct_answer": "Carbon dioxide",
                    "explanation": "Used in photosynthesis."
                },
                {
                    "question_id": "q2",
                    "question_type": "fill_blank",
                    "question": "The green pigment is _____.",
                    "correct_answer": "chlorophyll"
                }
            ]
        })
        .to_string();

        let questions = parse_quiz_questions(&response, 4);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].kind, QuestionKind::Mcq);
        assert_eq!(questions[1].options, None);
    }

    #[test]
    fn malformed_json_yields_empty_list() {
        assert!(parse_quiz_questions("I cannot create a quiz.", 4).is_empty());
        assert!(parse_quiz_questions("{\"questions\": \"oops\"", 4).is_empty());
    }

    #[test]
    fn missing_question_id_is_repaired_positionally() {
        let response = serde_json::json!({
            "questions": [
                {
                    "question_type": "short_answer",
                    "question": "Define inertia.",
                    "correct_answer": "Resistance of a body to change in motion."
                }
            ]
        })
        .to_string();

        let questions = parse_quiz_questions(&response, 4);
        assert_eq!(questions[0].question_id, "q1");
    }

    #[test]
    fn mcq_with_wrong_option_count_is_dropped() {
        let response = serde_json::json!({
            "questions": [
                {
                    "question_id": "q1",
                    "question_type": "mcq",
                    "question": "Pick one.",
                    "options": ["A", "B"],
                    "correct_answer": "A"
                }
            ]
        })
        .to_string();

        assert!(parse_quiz_questions(&response, 4).is_empty());
    }

    #[test]
    fn mcq_answer_must_be_among_options() {
        let response = serde_json::json!({
            "questions": [
                {
                    "question_id": "q1",
                    "question_type": "mcq",
                    "question": "Pick one.",
                    "options": ["A", "B", "C", "D"],
                    "correct_answer": "E"
                }
            ]
        })
        .to_string();

        assert!(parse_quiz_questions(&response, 4).is_empty());
    }

    #[test]
    fn missing_correct_answer_is_dropped() {
        let response = serde_json::json!({
            "questions": [
                {
                    "question_id": "q1",
                    "question_type": "short_answer",
                    "question": "Explain osmosis."
                }
            ]
        })
        .to_string();

        assert!(parse_quiz_questions(&response, 4).is_empty());
    }
}
