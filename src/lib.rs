//! cinegraph
//!
//! Question answering over a movie knowledge graph held in Neo4j.
//!
//! # Architecture
//!
//! The crate glues together three external collaborators, each behind an
//! async trait so any backend (or a test double) can stand in:
//! - [`LanguageModel`]: text generation (OpenAI, Ollama, Gemini)
//! - [`GraphClient`]: Cypher execution (Neo4j HTTP API)
//! - [`Embedder`] + [`VectorStore`]: embeddings and nearest-neighbour search
//!
//! # Flows
//!
//! - Graph QA ([`GraphQaChain`]): question → Cypher → [`StatementGuard`] →
//!   records → answer
//! - Retrieve then generate ([`RetrievalPipeline`]): the graph chain's
//!   records become context for a generic question/context prompt
//! - Similarity search ([`GraphVectorStore`], [`InMemoryVectorStore`]):
//!   text → embedding → nearest plots
//!
//! ## Example Usage
//!
//! ```no_run
//! use cinegraph::{AppConfig, ChatClient, GraphQaChain, GraphSchema, Neo4jHttpClient};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None)?;
//! let graph = Arc::new(Neo4jHttpClient::new(&config.graph)?);
//! let schema = GraphSchema::introspect(graph.as_ref(), 10_000).await?;
//!
//! let chain = GraphQaChain::from_llm(
//!     Arc::new(ChatClient::new(&config.cypher_model)?),
//!     Arc::new(ChatClient::new(&config.answer_model)?),
//!     graph,
//!     schema,
//!     config.qa.clone(),
//! )?;
//!
//! let output = chain.invoke("How many movies are in the Sci-Fi genre?").await?;
//! println!("{}", output.answer.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod embed;
pub mod graph;
pub mod llm;
pub mod nlq;
pub mod prompt;
pub mod qa;
pub mod vector;

// Re-export main types for convenience
pub use config::{
    AppConfig, ConfigError, ConfigResult, EmbeddingConfig, GraphConfig, LLMProvider, ModelConfig, QaConfig,
    VectorIndexConfig,
};

pub use embed::{EmbeddingClient, EmbedError, EmbedResult, Embedder};

pub use graph::{
    GraphClient, GraphError, GraphResult, GraphSchema, Neo4jHttpClient, Record, TypeScope,
};

pub use llm::{ChatClient, ChatMessage, LLMError, LLMResult, LanguageModel};

pub use nlq::{CypherExample, CypherGenerator, GuardError, NLQError, StatementGuard, StatementPolicy};

pub use prompt::{PromptTemplate, TemplateError};

pub use qa::{GraphQaChain, QaError, QaOutput, QaResult, RetrievalPipeline, RetrievalState};

pub use vector::{Document, GraphVectorStore, InMemoryVectorStore, VectorError, VectorResult, VectorStore};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
