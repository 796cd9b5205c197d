//! In-process vector store
//!
//! Loads nodes that already carry an embedding property and searches them
//! with a local HNSW index, for servers without a native vector index.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::config::VectorIndexConfig;
use crate::embed::Embedder;
use crate::graph::GraphClient;
use crate::vector::index::{cosine_score, VectorIndex};
use crate::vector::{quote_ident, Document, VectorError, VectorResult, VectorStore};

pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    index: VectorIndex,
    documents: Vec<Document>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let index = VectorIndex::new(embedder.dimensions());
        Self {
            embedder,
            index,
            documents: Vec::new(),
        }
    }

    /// Add a document with a precomputed embedding
    pub fn add(&mut self, document: Document, embedding: &Vec<f32>) -> VectorResult<()> {
        self.index.add(self.documents.len(), embedding)?;
        self.documents.push(document);
        Ok(())
    }

    /// Embed each document's content and add it
    pub async fn add_documents(&mut self, documents: Vec<Document>) -> VectorResult<()> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        for (document, embedding) in documents.into_iter().zip(embeddings.iter()) {
            self.add(document, embedding)?;
        }
        Ok(())
    }

    /// Build from the nodes described by `config` that have an embedding
    pub async fn load_from_graph(
        graph: &dyn GraphClient,
        embedder: Arc<dyn Embedder>,
        config: &VectorIndexConfig,
    ) -> VectorResult<Self> {
        let label = quote_ident(&config.node_label);
        let text = quote_ident(&config.text_property);
        let embedding = quote_ident(&config.embedding_property);
        let statement = format!(
            "MATCH (n:{label}) WHERE n.{embedding} IS NOT NULL\n\
             RETURN n.{text} AS text, n {{.*, {text}: Null, {embedding}: Null}} AS metadata, n.{embedding} AS embedding"
        );

        let rows = graph.query(&statement).await?;
        let hidden = [config.text_property.as_str(), config.embedding_property.as_str()];

        let mut store = Self::new(embedder);
        for row in &rows {
            let vector: Vec<f32> = match row.get("embedding") {
                Some(Value::Array(values)) => values
                    .iter()
                    .map(|v| v.as_f64().map(|f| f as f32))
                    .collect::<Option<_>>()
                    .ok_or_else(|| VectorError::IndexError("Embedding contains non-numeric values".to_string()))?,
                _ => return Err(VectorError::IndexError("Row has no embedding".to_string())),
            };
            store.add(Document::from_row(row, &hidden)?, &vector)?;
        }

        info!(label = %config.node_label, documents = store.len(), "Loaded local vector index");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn similarity_search_with_score(&self, text: &str, k: usize) -> VectorResult<Vec<(Document, f32)>> {
        let query = self.embedder.embed_query(text).await?;
        let neighbors = self.index.search(&query, k)?;

        Ok(neighbors
            .into_iter()
            .filter_map(|(id, distance)| {
                self.documents.get(id).map(|doc| (doc.clone(), cosine_score(distance)))
            })
            .collect())
    }
}
