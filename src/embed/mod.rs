//! Embedding service
//!
//! Text is turned into vectors by an [`Embedder`]; [`client::EmbeddingClient`]
//! calls a hosted embedding API.

pub mod client;

use async_trait::async_trait;
use thiserror::Error;

pub use client::EmbeddingClient;

/// Embed errors
#[derive(Error, Debug)]
pub enum EmbedError {
    /// API error from LLM provider
    #[error("LLM API error: {0}")]
    ApiError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Provider returned a different number of vectors than inputs
    #[error("Expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

pub type EmbedResult<T> = Result<T, EmbedError>;

/// Produces fixed-length vectors for text
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in order
    async fn embed_documents(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>>;

    /// Embed a single search query
    async fn embed_query(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            got => Err(EmbedError::CountMismatch { expected: 1, got }),
        }
    }
}
