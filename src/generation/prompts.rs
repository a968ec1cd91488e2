//! Prompt assembly for the generation tasks.
//!
//! Every prompt follows the same shape: role, task, retrieved context as
//! `[Page N]: text` blocks, then explicit requirements and a response format
//! the parsers in the sibling modules rely on.

use std::fmt::Write;

use crate::models::{ChatTurn, Question, RetrievalMatch};

/// Joins the top `limit` retrieval matches into `[Page N]: text` blocks.
pub fn context_block(matches: &[RetrievalMatch], limit: usize) -> String {
    matches
        .iter()
        .take(limit)
        .map(|m| format!("[Page {}]: {}", m.page_number, m.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn summary_system() -> String {
    "You are a science teacher who writes clear, accurate study summaries \
     grounded strictly in the provided textbook material."
        .to_string()
}

pub fn summary_user(topic_name: &str, class_level: &str, context: &str) -> String {
    format!(
        "Summarize the topic \"{topic_name}\" for {class_level} students.\n\
         \n\
         Use only the textbook material below.\n\
         \n\
         Context:\n{context}\n\
         \n\
         Requirements:\n\
         - Write 200-300 words in clear, simple language for {class_level}.\n\
         - Organize the summary with logical paragraph breaks.\n\
         - Highlight important concepts and their definitions.\n\
         - Do not include information absent from the context.\n\
         - After the summary, list the 3-5 most important points, one per line.\n\
         \n\
         Respond exactly in this format:\n\
         SUMMARY:\n\
         <summary text>\n\
         KEY POINTS:\n\
         1. <first key point>\n\
         2. <second key point>"
    )
}

pub fn chat_system(topic_name: &str, context: &str) -> String {
    format!(
        "You are a knowledgeable and supportive science tutor answering student \
         questions about the topic \"{topic_name}\".\n\
         \n\
         Textbook context:\n{context}\n\
         \n\
         Guidelines:\n\
         - Answer from the context above whenever possible; say when you are \
         going beyond it.\n\
         - Use clear, step-by-step explanations in short paragraphs.\n\
         - Cite the textbook page number when referencing the context.\n\
         - If the question is unrelated to the curriculum, politely redirect \
         the student to curriculum topics.\n\
         - Begin directly with the answer, no preamble."
    )
}

pub fn quiz_system() -> String {
    "You are an expert quiz generator. Always respond with valid JSON only.".to_string()
}

pub fn quiz_user(
    topic_name: &str,
    class_level: &str,
    context: &str,
    num_mcq: usize,
    num_fill_blank: usize,
    num_short_answer: usize,
) -> String {
    format!(
        "Create an assessment quiz for {class_level} students on the topic \
         \"{topic_name}\", based only on the textbook material below.\n\
         \n\
         Context:\n{context}\n\
         \n\
         Generate exactly:\n\
         - {num_mcq} multiple-choice questions, each with 4 options\n\
         - {num_fill_blank} fill-in-the-blank questions\n\
         - {num_short_answer} short-answer questions (1-2 line answers)\n\
         \n\
         Respond with a JSON object of this shape:\n\
         {{\n\
           \"questions\": [\n\
             {{\"question_id\": \"q1\", \"question_type\": \"mcq\", \
         \"question\": \"...?\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \
         \"correct_answer\": \"A\", \"explanation\": \"...\"}},\n\
             {{\"question_id\": \"q2\", \"question_type\": \"fill_blank\", \
         \"question\": \"The process of _____ is important.\", \
         \"correct_answer\": \"...\", \"explanation\": \"...\"}},\n\
             {{\"question_id\": \"q3\", \"question_type\": \"short_answer\", \
         \"question\": \"Explain briefly...\", \"correct_answer\": \"...\", \
         \"explanation\": \"...\"}}\n\
           ]\n\
         }}\n\
         \n\
         Every question must be answerable from the context, appropriate for \
         {class_level}, and have one clear correct answer. For multiple-choice \
         questions the correct answer must appear verbatim among the options."
    )
}

pub fn evaluation_system() -> String {
    "You are a fair and helpful teacher evaluating student answers. \
     Always respond with valid JSON."
        .to_string()
}

pub fn evaluation_user(
    topic_name: &str,
    questions: &[Question],
    answers: &std::collections::HashMap<String, String>,
    extracted_text: Option<&str>,
) -> String {
    let mut blocks = String::new();
    for (i, question) in questions.iter().enumerate() {
        let student_answer = answers
            .get(&question.question_id)
            .map(String::as_str)
            .unwrap_or("");
        let _ = write!(
            blocks,
            "Q{n} [{id}]: {prompt}\n",
            n = i + 1,
            id = question.question_id,
            prompt = question.prompt
        );
        if let Some(options) = &question.options {
            let _ = writeln!(blocks, "Options: {}", options.join(" | "));
        }
        let _ = writeln!(blocks, "Correct: {}", question.correct_answer);
        let _ = writeln!(blocks, "Student: {student_answer}\n");
    }

    let ocr_note = match extracted_text {
        Some(text) if !text.trim().is_empty() => format!(
            "\nThe student also submitted a handwritten sheet. Its extracted \
             text follows; it may be noisy or lack question numbers, so match \
             answers to questions by content:\n{text}\n"
        ),
        _ => String::new(),
    };

    format!(
        "Evaluate the quiz answers below for the topic \"{topic_name}\".\n\
         {ocr_note}\n\
         For each question decide whether the student's answer is correct. \
         For short answers accept semantically equivalent phrasings. Give \
         specific feedback and suggest what to review when an answer is wrong.\n\
         \n\
         Questions and answers:\n{blocks}\n\
         Respond with a JSON object of this shape:\n\
         {{\n\
           \"total_questions\": {total},\n\
           \"correct_count\": 0,\n\
           \"score_percentage\": 0.0,\n\
           \"question_results\": [\n\
             {{\"question_id\": \"q1\", \"is_correct\": true, \
         \"feedback\": \"...\", \"needs_review\": false}}\n\
           ],\n\
           \"topics_to_review\": [\"...\"],\n\
           \"overall_feedback\": \"...\"\n\
         }}",
        total = questions.len()
    )
}

/// Formats prior conversation for the completion request, keeping only the
/// most recent `limit` turns.
pub fn recent_history(history: &[ChatTurn], limit: usize) -> &[ChatTurn] {
    let start = history.len().saturating_sub(limit);
    &history[start..]
}
