//! Retrieval-augmented content core for a curriculum Q&A and quiz
//! application.
//!
//! ```text
//! Offline:
//!   documents ──► ingestion::DocumentLoader ──► pages
//!                                 │
//!   pages ──► chunking::SemanticChunker ──► chunks + metadata
//!                                 │
//!   chunks ──► embeddings::EmbeddingProvider ──► vectors
//!                                 │
//!   vectors ──► stores::VectorStore (namespaced, filterable)
//!
//! Online:
//!   query ──► retrieval::Retriever ──► ranked context chunks
//!                                 │
//!   context ──► generation::GenerationService ──► summary / chat /
//!                                                 quiz / evaluation
//! ```
//!
//! HTTP routing, OCR, and upload handling live outside this crate; it
//! consumes extracted text and produces typed artifacts.

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod ingestion;
pub mod models;
pub mod retrieval;
pub mod stores;
pub mod types;

pub use chunking::{ChunkingConfig, SemanticChunker};
pub use config::Settings;
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, OpenAiEmbeddings};
pub use generation::{
    ChatClient, ChatReply, ChatStreamEvent, GenerationService, MockChatClient, OpenAiChatClient,
    QuestionCounts,
};
pub use ingestion::{DocumentLoader, IngestReport, IngestionPipeline, PlainTextLoader};
pub use models::{
    ChatTurn, ChunkMetadata, Evaluation, Page, Question, QuestionKind, QuestionResult, Quiz,
    RetrievalMatch, SourceCitation, TopicSummary,
};
pub use retrieval::Retriever;
pub use stores::{
    InMemoryStore, InMemoryVectorStore, KeyedStore, MetadataFilter, ScoredRecord,
    SqliteVectorStore, VectorRecord, VectorStore,
};
pub use types::RagError;
