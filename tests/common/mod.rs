//! Collaborator doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use cinegraph::embed::EmbedResult;
use cinegraph::graph::GraphResult;
use cinegraph::llm::LLMResult;
use cinegraph::{ChatMessage, Embedder, GraphClient, GraphError, LanguageModel, Record};

/// Build a record from a JSON object literal
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

/// Replies with a fixed string and keeps every prompt it was given
pub struct StubModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl StubModel {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), prompts: Mutex::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> LLMResult<String> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.extend(messages.iter().map(|m| m.content.clone()));
        Ok(self.reply.clone())
    }
}

/// Returns fixed records (or a query error) and keeps every statement
pub struct StubGraph {
    outcome: Result<Vec<Record>, (String, String)>,
    statements: Mutex<Vec<String>>,
}

impl StubGraph {
    pub fn returning(records: Vec<Record>) -> Self {
        Self { outcome: Ok(records), statements: Mutex::new(Vec::new()) }
    }

    pub fn failing(code: &str, message: &str) -> Self {
        Self {
            outcome: Err((code.to_string(), message.to_string())),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphClient for StubGraph {
    async fn query_with_params(&self, statement: &str, _params: Option<Value>) -> GraphResult<Vec<Record>> {
        self.statements.lock().unwrap().push(statement.to_string());
        match &self.outcome {
            Ok(records) => Ok(records.clone()),
            Err((code, message)) => Err(GraphError::Query { code: code.clone(), message: message.clone() }),
        }
    }
}

/// Constant embeddings of a fixed width
pub struct StubEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_documents(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0; self.dimensions]).collect())
    }
}
