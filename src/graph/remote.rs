//! Neo4jHttpClient: network client for a Neo4j server
//!
//! Statements go to the HTTP transactional endpoint
//! (`POST /db/{database}/tx/commit`) in auto-commit mode.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::GraphConfig;
use crate::graph::{GraphClient, GraphError, GraphResult, Record};

const BOLT_PORT: u16 = 7687;
const HTTP_PORT: u16 = 7474;
const HTTPS_PORT: u16 = 7473;

/// Network client for a Neo4j database over HTTP.
pub struct Neo4jHttpClient {
    http_base_url: String,
    database: String,
    username: String,
    password: String,
    http_client: Client,
}

impl Neo4jHttpClient {
    /// Create a client from connection settings.
    ///
    /// Bolt-style URIs are mapped onto the server's HTTP endpoint.
    pub fn new(config: &GraphConfig) -> GraphResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GraphError::ConnectionError(e.to_string()))?;

        Ok(Self {
            http_base_url: http_base_url(&config.uri)?,
            database: config.database().to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.http_base_url
    }

    fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.http_base_url, self.database)
    }
}

#[async_trait]
impl GraphClient for Neo4jHttpClient {
    async fn query_with_params(
        &self,
        statement: &str,
        params: Option<Value>,
    ) -> GraphResult<Vec<Record>> {
        let body = json!({
            "statements": [{
                "statement": statement,
                "parameters": params.unwrap_or_else(|| json!({})),
                "resultDataContents": ["row"],
            }]
        });

        debug!(database = %self.database, "Executing statement");
        let response = self
            .http_client
            .post(self.commit_url())
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| GraphError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GraphError::ConnectionError(format!(
                "Authentication failed for user {}",
                self.username
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GraphError::ProtocolError(format!("Server returned {}: {}", status, text)));
        }

        let body: Value = response.json().await?;
        parse_commit_response(body)
    }
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<RowData>,
}

#[derive(Deserialize)]
struct RowData {
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

/// Turn a transactional endpoint response into records.
///
/// Statement errors come back with HTTP 200 and a non-empty `errors` array.
pub(crate) fn parse_commit_response(body: Value) -> GraphResult<Vec<Record>> {
    let response: CommitResponse = serde_json::from_value(body)?;

    if let Some(error) = response.errors.into_iter().next() {
        return Err(GraphError::Query {
            code: error.code,
            message: error.message,
        });
    }

    let result = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| GraphError::ProtocolError("Response contained no statement result".to_string()))?;

    let mut records = Vec::with_capacity(result.data.len());
    for data in result.data {
        if data.row.len() != result.columns.len() {
            return Err(GraphError::ProtocolError(format!(
                "Row has {} values for {} columns",
                data.row.len(),
                result.columns.len()
            )));
        }
        records.push(result.columns.iter().cloned().zip(data.row).collect());
    }
    Ok(records)
}

/// Map a connection URI onto the server's HTTP base URL.
///
/// `neo4j://` and `bolt://` become `http://`, their `+s`/`+ssc` variants
/// become `https://`, and the Bolt port is swapped for the HTTP one.
/// `http(s)://` URIs pass through.
pub fn http_base_url(uri: &str) -> GraphResult<String> {
    let (scheme, rest) = uri
        .trim()
        .split_once("://")
        .ok_or_else(|| GraphError::ConnectionError(format!("Invalid connection URI: {}", uri)))?;
    let scheme = scheme.to_ascii_lowercase();

    if scheme == "http" || scheme == "https" {
        return Ok(format!("{}://{}", scheme, rest.trim_end_matches('/')));
    }

    let tls = match scheme.as_str() {
        "neo4j" | "bolt" => false,
        "neo4j+s" | "neo4j+ssc" | "bolt+s" | "bolt+ssc" => true,
        other => {
            return Err(GraphError::ConnectionError(format!("Unsupported URI scheme: {}", other)));
        }
    };

    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(GraphError::ConnectionError(format!("Missing host in URI: {}", uri)));
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host, Some(port)),
            Err(_) => (authority, None),
        },
        None => (authority, None),
    };

    let port = match (port, tls) {
        (Some(BOLT_PORT), false) | (None, false) => Some(HTTP_PORT),
        (Some(BOLT_PORT), true) => Some(HTTPS_PORT),
        (None, true) => None,
        (Some(other), _) => Some(other),
    };

    let http_scheme = if tls { "https" } else { "http" };
    Ok(match port {
        Some(port) => format!("{}://{}:{}", http_scheme, host, port),
        None => format!("{}://{}", http_scheme, host),
    })
}
