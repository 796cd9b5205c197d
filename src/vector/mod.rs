//! Vector similarity search
//!
//! [`VectorStore`] returns the documents whose embeddings are nearest to a
//! piece of text. Two stores are provided:
//! - [`GraphVectorStore`]: the graph database's own vector index
//! - [`InMemoryVectorStore`]: an HNSW index built in-process from embeddings
//!   already stored on graph nodes

pub mod graph_store;
pub mod index;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::embed::EmbedError;
use crate::graph::{GraphError, Record};

pub use graph_store::GraphVectorStore;
pub use index::{CosineDistance, VectorIndex};
pub use memory::InMemoryVectorStore;

/// Vector search errors
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Vector index '{0}' does not exist")]
    IndexNotFound(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Index error: {0}")]
    IndexError(String),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type VectorResult<T> = Result<T, VectorError>;

/// A search hit: the node's text plus its other properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: Record,
}

impl Document {
    pub fn new(page_content: impl Into<String>, metadata: Record) -> Self {
        Self { page_content: page_content.into(), metadata }
    }

    /// Build from a row with `text` and `metadata` columns.
    ///
    /// `hidden` keys (the text and embedding properties) are dropped from the
    /// metadata.
    pub fn from_row(row: &Record, hidden: &[&str]) -> VectorResult<Self> {
        let page_content = match row.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let mut metadata = match row.get("metadata") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Record::new(),
            Some(other) => {
                return Err(VectorError::IndexError(format!("Unexpected metadata value: {}", other)));
            }
        };
        metadata.retain(|key, _| !hidden.contains(&key.as_str()));

        Ok(Self { page_content, metadata })
    }

    /// Metadata value as a string, if present
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Nearest-neighbour search over embedded documents
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` documents nearest to `text`, closest first, with scores
    async fn similarity_search_with_score(&self, text: &str, k: usize) -> VectorResult<Vec<(Document, f32)>>;

    /// Up to `k` documents nearest to `text`, closest first
    async fn similarity_search(&self, text: &str, k: usize) -> VectorResult<Vec<Document>> {
        let hits = self.similarity_search_with_score(text, k).await?;
        Ok(hits.into_iter().map(|(doc, _)| doc).collect())
    }
}

/// Quote a property or label name for interpolation into Cypher
pub(crate) fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_from_row_hides_properties() {
        let row = match json!({
            "text": "A cowboy doll is profoundly threatened when a new spaceman figure supplants him.",
            "metadata": {"title": "Toy Story", "plot": null, "plotEmbedding": null, "released": "1995-11-22"},
            "score": 0.93
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let doc = Document::from_row(&row, &["plot", "plotEmbedding"]).unwrap();
        assert!(doc.page_content.starts_with("A cowboy doll"));
        assert_eq!(doc.meta_str("title"), Some("Toy Story"));
        assert!(!doc.metadata.contains_key("plot"));
        assert!(!doc.metadata.contains_key("plotEmbedding"));
    }

    #[test]
    fn test_document_null_text() {
        let mut row = Record::new();
        row.insert("text".to_string(), Value::Null);
        let doc = Document::from_row(&row, &[]).unwrap();
        assert_eq!(doc.page_content, "");
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("plotEmbedding"), "`plotEmbedding`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }
}
