//! Graph store access
//!
//! [`GraphClient`] is the unified interface for running Cypher against a
//! property graph. Implemented by:
//! - [`Neo4jHttpClient`]: Neo4j's HTTP transactional endpoint
//! - test doubles in the integration tests
//!
//! The schema description used to ground generated statements lives in
//! [`schema`].

pub mod remote;
pub mod schema;

use async_trait::async_trait;
use thiserror::Error;

pub use remote::{http_base_url, Neo4jHttpClient};
pub use schema::{GraphSchema, PropertyInfo, RelationshipPattern, TypeScope};

/// One result row: column name -> value
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Errors raised by a graph store
#[derive(Error, Debug)]
pub enum GraphError {
    /// Statement rejected or failed inside the database
    #[error("Query error [{code}]: {message}")]
    Query { code: String, message: String },

    /// Could not reach or authenticate with the database
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The server answered with something we could not interpret
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Executes Cypher statements and returns tabular records
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Execute `statement` with optional parameters (a JSON object)
    async fn query_with_params(
        &self,
        statement: &str,
        params: Option<serde_json::Value>,
    ) -> GraphResult<Vec<Record>>;

    /// Execute a statement without parameters
    async fn query(&self, statement: &str) -> GraphResult<Vec<Record>> {
        self.query_with_params(statement, None).await
    }
}
