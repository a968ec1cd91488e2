//! Generation orchestration: retrieval context + model calls → typed artifacts.
//!
//! # Pipeline
//!
//! ```text
//!   topic/question ──▶ Retriever ──▶ context chunks
//!                                        │
//!                                        ▼
//!                              prompt assembly (prompts)
//!                                        │
//!                                        ▼
//!                               ChatClient (completion)
//!                                        │
//!                     ┌──────────────────┼──────────────────┐
//!                     ▼                  ▼                  ▼
//!               summary parse       quiz parse        evaluation parse
//!                     │                  │                  │
//!                     ▼                  ▼                  ▼
//!               TopicSummary     Quiz (stored)     Evaluation (stored)
//! ```
//!
//! Every task shares one degradation posture: transport and retrieval errors
//! propagate as [`RagError`], while malformed model output degrades to a
//! documented typed fallback instead of failing.

pub mod chat;
pub mod client;
pub mod evaluation;
pub mod prompts;
pub mod quiz;
pub mod summary;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::Settings;
use crate::models::{ChatTurn, Evaluation, Quiz, RetrievalMatch, SourceCitation, TopicSummary};
use crate::retrieval::Retriever;
use crate::stores::KeyedStore;
use crate::types::RagError;

pub use chat::{ChatReply, ChatStreamEvent};
pub use client::{ChatClient, ChatMessage, CompletionRequest, MockChatClient, OpenAiChatClient};
pub use quiz::parse_quiz_questions;
pub use summary::ParsedSummary;

// Per-task tuning. Context sizes count retrieval chunks fed to the prompt;
// the retrieval top_k values are what the store is asked for.
const SUMMARY_TOP_K: usize = 10;
const SUMMARY_CONTEXT_CHUNKS: usize = 5;
const SUMMARY_TEMPERATURE: f32 = 0.7;
const SUMMARY_MAX_TOKENS: u32 = 500;

const CHAT_TOP_K: usize = 5;
const CHAT_CONTEXT_CHUNKS: usize = 3;
const CHAT_TEMPERATURE: f32 = 0.7;
const CHAT_MAX_TOKENS: u32 = 500;

const QUIZ_TOP_K: usize = 15;
const QUIZ_CONTEXT_CHUNKS: usize = 10;
const QUIZ_TEMPERATURE: f32 = 0.8;
const QUIZ_MAX_TOKENS: u32 = 2000;

const EVALUATION_TEMPERATURE: f32 = 0.3;
const EVALUATION_MAX_TOKENS: u32 = 1500;

/// How many questions of each kind a quiz request asks for.
#[derive(Debug, Clone, Copy)]
pub struct QuestionCounts {
    pub mcq: usize,
    pub fill_blank: usize,
    pub short_answer: usize,
}

impl Default for QuestionCounts {
    fn default() -> Self {
        Self {
            mcq: 5,
            fill_blank: 3,
            short_answer: 2,
        }
    }
}

/// Orchestrates the generation tasks over injected collaborators.
///
/// Quiz and evaluation artifacts are written to the keyed stores on success
/// and retrievable by id afterwards; a quiz may be evaluated any number of
/// times.
pub struct GenerationService {
    retriever: Arc<Retriever>,
    client: Arc<dyn ChatClient>,
    quizzes: Arc<dyn KeyedStore<Quiz>>,
    evaluations: Arc<dyn KeyedStore<Evaluation>>,
    mcq_option_count: usize,
}

impl GenerationService {
    pub fn new(
        settings: &Settings,
        retriever: Arc<Retriever>,
        client: Arc<dyn ChatClient>,
        quizzes: Arc<dyn KeyedStore<Quiz>>,
        evaluations: Arc<dyn KeyedStore<Evaluation>>,
    ) -> Self {
        Self {
            retriever,
            client,
            quizzes,
            evaluations,
            mcq_option_count: settings.mcq_option_count,
        }
    }

    /// Generates a topic summary with 3-5 key points.
    ///
    /// A topic with no indexed content is [`RagError::NotFound`]; a model
    /// reply that ignores the response format degrades to the whole reply as
    /// the summary with no key points.
    pub async fn topic_summary(
        &self,
        topic_id: &str,
        topic_name: &str,
        class_level: &str,
    ) -> Result<TopicSummary, RagError> {
        let matches = self
            .retriever
            .search_by_topic(topic_name, class_level, SUMMARY_TOP_K)
            .await?;
        if matches.is_empty() {
            return Err(RagError::not_found("topic content", topic_name));
        }

        let context = prompts::context_block(&matches, SUMMARY_CONTEXT_CHUNKS);
        let response = self
            .client
            .complete(CompletionRequest {
                messages: vec![
                    ChatMessage::system(prompts::summary_system()),
                    ChatMessage::user(prompts::summary_user(topic_name, class_level, &context)),
                ],
                temperature: SUMMARY_TEMPERATURE,
                max_tokens: SUMMARY_MAX_TOKENS,
                json_response: false,
            })
            .await?;

        let parsed = summary::parse_summary(&response);
        if parsed.key_points.is_empty() {
            tracing::warn!(topic = topic_name, "summary reply had no parseable key points");
        }
        Ok(TopicSummary {
            topic_id: topic_id.to_string(),
            topic_name: topic_name.to_string(),
            summary: parsed.summary,
            key_points: parsed.key_points,
        })
    }

    /// Answers a question about a topic, returning the reply plus citations
    /// for the context passages it was grounded on.
    ///
    /// An empty retrieval is not an error here: the tutor still answers from
    /// general knowledge, with no citations.
    pub async fn chat(
        &self,
        topic_name: &str,
        class_level: Option<&str>,
        history: &[ChatTurn],
        question: &str,
    ) -> Result<ChatReply, RagError> {
        let matches = self
            .chat_context(topic_name, class_level, question)
            .await?;
        let sources = citations(&matches, CHAT_CONTEXT_CHUNKS);

        let context = prompts::context_block(&matches, CHAT_CONTEXT_CHUNKS);
        let messages = chat::build_messages(
            prompts::chat_system(topic_name, &context),
            history,
            question,
        );
        let reply = self
            .client
            .complete(CompletionRequest {
                messages,
                temperature: CHAT_TEMPERATURE,
                max_tokens: CHAT_MAX_TOKENS,
                json_response: false,
            })
            .await?;

        Ok(ChatReply { reply, sources })
    }

    /// Streaming variant of [`chat`](Self::chat): fragments in emission
    /// order, then a terminal [`ChatStreamEvent::Done`] with the full text
    /// and citations. Dropping the receiver cancels the upstream request.
    pub async fn chat_stream(
        &self,
        topic_name: &str,
        class_level: Option<&str>,
        history: &[ChatTurn],
        question: &str,
    ) -> Result<flume::Receiver<Result<ChatStreamEvent, RagError>>, RagError> {
        let matches = self
            .chat_context(topic_name, class_level, question)
            .await?;
        let sources = citations(&matches, CHAT_CONTEXT_CHUNKS);

        let context = prompts::context_block(&matches, CHAT_CONTEXT_CHUNKS);
        let messages = chat::build_messages(
            prompts::chat_system(topic_name, &context),
            history,
            question,
        );
        let fragments = self
            .client
            .complete_stream(CompletionRequest {
                messages,
                temperature: CHAT_TEMPERATURE,
                max_tokens: CHAT_MAX_TOKENS,
                json_response: false,
            })
            .await?;

        Ok(chat::into_event_stream(fragments, sources))
    }

    /// Generates and stores a quiz for a topic.
    ///
    /// A topic with no indexed content is [`RagError::NotFound`]. Malformed
    /// model output degrades to a quiz with no questions; invalid questions
    /// are dropped individually by the parser.
    pub async fn generate_quiz(
        &self,
        topic_id: &str,
        topic_name: &str,
        class_level: &str,
        counts: QuestionCounts,
    ) -> Result<Quiz, RagError> {
        let matches = self
            .retriever
            .search_by_topic(topic_name, class_level, QUIZ_TOP_K)
            .await?;
        if matches.is_empty() {
            return Err(RagError::not_found("topic content", topic_name));
        }

        let context = prompts::context_block(&matches, QUIZ_CONTEXT_CHUNKS);
        let response = self
            .client
            .complete(CompletionRequest {
                messages: vec![
                    ChatMessage::system(prompts::quiz_system()),
                    ChatMessage::user(prompts::quiz_user(
                        topic_name,
                        class_level,
                        &context,
                        counts.mcq,
                        counts.fill_blank,
                        counts.short_answer,
                    )),
                ],
                temperature: QUIZ_TEMPERATURE,
                max_tokens: QUIZ_MAX_TOKENS,
                json_response: true,
            })
            .await?;

        let questions = quiz::parse_quiz_questions(&response, self.mcq_option_count);
        let quiz = Quiz {
            quiz_id: Uuid::new_v4().to_string(),
            topic_id: topic_id.to_string(),
            topic_name: topic_name.to_string(),
            questions,
            created_at: Utc::now(),
        };
        self.quizzes.put(&quiz.quiz_id, quiz.clone());
        tracing::info!(
            quiz_id = %quiz.quiz_id,
            topic = topic_name,
            questions = quiz.questions.len(),
            "quiz generated"
        );
        Ok(quiz)
    }

    /// Looks up a stored quiz by id.
    pub fn get_quiz(&self, quiz_id: &str) -> Result<Quiz, RagError> {
        self.quizzes
            .get(quiz_id)
            .ok_or_else(|| RagError::not_found("quiz", quiz_id))
    }

    /// Evaluates a quiz submission and stores the result.
    ///
    /// `answers` maps question ids to the student's answers; `extracted_text`
    /// carries optional OCR output from a handwritten sheet. An unknown
    /// `quiz_id` is [`RagError::NotFound`]. Malformed model output degrades
    /// to the all-incorrect fallback with generic feedback.
    pub async fn evaluate(
        &self,
        quiz_id: &str,
        answers: &HashMap<String, String>,
        extracted_text: Option<&str>,
    ) -> Result<Evaluation, RagError> {
        let quiz = self.get_quiz(quiz_id)?;
        let response = self
            .client
            .complete(CompletionRequest {
                messages: vec![
                    ChatMessage::system(prompts::evaluation_system()),
                    ChatMessage::user(prompts::evaluation_user(
                        &quiz.topic_name,
                        &quiz.questions,
                        answers,
                        extracted_text,
                    )),
                ],
                temperature: EVALUATION_TEMPERATURE,
                max_tokens: EVALUATION_MAX_TOKENS,
                json_response: true,
            })
            .await?;

        let parsed =
            evaluation::parse_evaluation(&response, &quiz.topic_name, quiz.questions.len());
        let result = Evaluation {
            evaluation_id: Uuid::new_v4().to_string(),
            quiz_id: quiz_id.to_string(),
            total_questions: parsed.total_questions,
            correct_count: parsed.correct_count,
            score_percentage: parsed.score_percentage,
            question_results: parsed.question_results,
            topics_to_review: parsed.topics_to_review,
            overall_feedback: parsed.overall_feedback,
        };
        self.evaluations.put(&result.evaluation_id, result.clone());
        tracing::info!(
            evaluation_id = %result.evaluation_id,
            quiz_id,
            score = result.score_percentage,
            "evaluation stored"
        );
        Ok(result)
    }

    /// Looks up a stored evaluation by id.
    pub fn get_evaluation(&self, evaluation_id: &str) -> Result<Evaluation, RagError> {
        self.evaluations
            .get(evaluation_id)
            .ok_or_else(|| RagError::not_found("evaluation", evaluation_id))
    }

    /// Chat context: query-scoped retrieval first, then a broader topic
    /// search when the direct query surfaces nothing.
    async fn chat_context(
        &self,
        topic_name: &str,
        class_level: Option<&str>,
        question: &str,
    ) -> Result<Vec<RetrievalMatch>, RagError> {
        let matches = self
            .retriever
            .retrieve(question, Some(topic_name), class_level, CHAT_TOP_K)
            .await?;
        if !matches.is_empty() {
            return Ok(matches);
        }
        self.retriever
            .search_by_topic(
                topic_name,
                class_level.unwrap_or("Class VIII"),
                CHAT_TOP_K,
            )
            .await
    }
}

fn citations(matches: &[RetrievalMatch], limit: usize) -> Vec<SourceCitation> {
    matches.iter().take(limit).map(SourceCitation::from).collect()
}
