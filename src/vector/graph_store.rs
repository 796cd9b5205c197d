//! Similarity search against the graph database's vector index

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::VectorIndexConfig;
use crate::embed::Embedder;
use crate::graph::{GraphClient, Record};
use crate::vector::{quote_ident, Document, VectorError, VectorResult, VectorStore};

const INDEX_INFO_QUERY: &str = "SHOW VECTOR INDEXES
YIELD name, labelsOrTypes, properties, options
WHERE name = $index_name
RETURN name, labelsOrTypes, properties, options";

/// Vector store backed by a named vector index on graph nodes
pub struct GraphVectorStore {
    graph: Arc<dyn GraphClient>,
    embedder: Arc<dyn Embedder>,
    config: VectorIndexConfig,
}

impl GraphVectorStore {
    /// Use the index described by `config` without checking it exists
    pub fn new(graph: Arc<dyn GraphClient>, embedder: Arc<dyn Embedder>, config: VectorIndexConfig) -> Self {
        Self { graph, embedder, config }
    }

    /// Attach to an index that must already exist.
    ///
    /// The indexed label and embedding property are taken from the index
    /// definition, and its dimension must match the embedder's.
    pub async fn from_existing_index(
        graph: Arc<dyn GraphClient>,
        embedder: Arc<dyn Embedder>,
        mut config: VectorIndexConfig,
    ) -> VectorResult<Self> {
        let rows = graph
            .query_with_params(INDEX_INFO_QUERY, Some(json!({ "index_name": config.index_name })))
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| VectorError::IndexNotFound(config.index_name.clone()))?;

        if let Some(label) = first_str(row, "labelsOrTypes") {
            config.node_label = label.to_string();
        }
        if let Some(property) = first_str(row, "properties") {
            config.embedding_property = property.to_string();
        }

        if let Some(dimensions) = index_dimensions(row) {
            if dimensions != embedder.dimensions() {
                return Err(VectorError::DimensionMismatch {
                    expected: dimensions,
                    got: embedder.dimensions(),
                });
            }
        }

        info!(
            index = %config.index_name,
            label = %config.node_label,
            property = %config.embedding_property,
            "Attached to vector index"
        );
        Ok(Self::new(graph, embedder, config))
    }

    pub fn config(&self) -> &VectorIndexConfig {
        &self.config
    }

    fn retrieval_query(&self) -> String {
        let text = quote_ident(&self.config.text_property);
        let embedding = quote_ident(&self.config.embedding_property);
        format!(
            "CALL db.index.vector.queryNodes($index, $k, $embedding) YIELD node, score\n\
             RETURN node.{text} AS text, node {{.*, {text}: Null, {embedding}: Null}} AS metadata, score\n\
             ORDER BY score DESC"
        )
    }

    /// Up to `k` nodes nearest to an already computed embedding
    pub async fn similarity_search_by_vector(
        &self,
        embedding: Vec<f32>,
        k: usize,
    ) -> VectorResult<Vec<(Document, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let params = json!({
            "index": self.config.index_name,
            "k": k,
            "embedding": embedding,
        });
        let rows = self.graph.query_with_params(&self.retrieval_query(), Some(params)).await?;
        debug!(index = %self.config.index_name, k, hits = rows.len(), "Vector search");

        let hidden = [self.config.text_property.as_str(), self.config.embedding_property.as_str()];
        rows.iter()
            .map(|row| {
                let doc = Document::from_row(row, &hidden)?;
                let score = row.get("score").and_then(Value::as_f64).unwrap_or_default() as f32;
                Ok((doc, score))
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for GraphVectorStore {
    async fn similarity_search_with_score(&self, text: &str, k: usize) -> VectorResult<Vec<(Document, f32)>> {
        let embedding = self.embedder.embed_query(text).await?;
        self.similarity_search_by_vector(embedding, k).await
    }
}

fn first_str<'a>(row: &'a Record, key: &str) -> Option<&'a str> {
    row.get(key)?.as_array()?.first()?.as_str()
}

fn index_dimensions(row: &Record) -> Option<usize> {
    let dims = row.get("options")?.get("indexConfig")?.get("vector.dimensions")?;
    dims.as_u64().map(|d| d as usize)
}
