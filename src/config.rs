//! Environment-driven configuration with fail-fast validation.
//!
//! All services are constructed from an explicit [`Settings`] value at process
//! startup. Missing credentials surface as [`RagError::Config`] before any
//! request is served; there are no lazily initialized singletons.

use std::env;

use crate::types::RagError;

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Application settings, loaded from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Settings {
    /// API key for the embedding and completion endpoints.
    pub api_key: String,
    /// Base URL for OpenAI-compatible endpoints.
    pub api_base: String,
    /// Chat completion model.
    pub chat_model: String,
    /// Embedding model.
    pub embedding_model: String,
    /// Fixed dimensionality of every vector in the index.
    pub embedding_dimensions: usize,
    /// Vector store namespace holding the corpus.
    pub namespace: String,
    /// Matches scoring below this are discarded as noise.
    pub similarity_threshold: f32,
    /// Records per upsert batch during ingestion.
    pub upsert_batch_size: usize,
    /// Bounded retry count for transient external-call failures.
    pub max_retries: usize,
    /// Required option count for multiple-choice questions.
    pub mcq_option_count: usize,
    /// Request timeout for external calls, in seconds.
    pub request_timeout_secs: u64,
}

impl Settings {
    /// Loads settings from the environment, reading `.env` when present.
    ///
    /// Fails fast with [`RagError::Config`] when required credentials are
    /// missing so that misconfiguration is caught at startup.
    pub fn from_env() -> Result<Self, RagError> {
        let _ = dotenvy::dotenv();

        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY is not set".into()))?;

        let settings = Self {
            api_key,
            api_base: env_or("OPENAI_API_BASE", DEFAULT_API_BASE),
            chat_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            embedding_model: env_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dimensions: env_parsed("OPENAI_EMBEDDING_DIMENSIONS", 512)?,
            namespace: env_or("INDEX_NAMESPACE", "ncert-science"),
            similarity_threshold: 0.25,
            upsert_batch_size: 100,
            max_retries: env_parsed("MAX_RETRIES", 3)?,
            mcq_option_count: 4,
            request_timeout_secs: 60,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Checks cross-field invariants shared by all construction paths.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.embedding_dimensions == 0 {
            return Err(RagError::Config(
                "embedding dimensions must be non-zero".into(),
            ));
        }
        if self.upsert_batch_size == 0 {
            return Err(RagError::Config("upsert batch size must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RagError::Config(format!(
                "similarity threshold {} outside [0, 1]",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T>(key: &str, default: T) -> Result<T, RagError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|err| RagError::Config(format!("invalid {key}: {err}"))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> Settings {
        Settings {
            api_key: "test-key".into(),
            api_base: DEFAULT_API_BASE.into(),
            chat_model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            embedding_dimensions: 512,
            namespace: "ncert-science".into(),
            similarity_threshold: 0.25,
            upsert_batch_size: 100,
            max_retries: 3,
            mcq_option_count: 4,
            request_timeout_secs: 60,
        }
    }

    #[test]
    fn validate_rejects_zero_dimensions() {
        let mut settings = base_settings();
        settings.embedding_dimensions = 0;
        assert!(matches!(settings.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut settings = base_settings();
        settings.similarity_threshold = 1.5;
        assert!(matches!(settings.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(base_settings().validate().is_ok());
    }
}
