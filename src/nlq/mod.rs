//! Natural Language Querying (NLQ)
//!
//! Implements Text-to-Cypher translation using LLMs.

pub mod guard;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::llm::{LLMError, LanguageModel};
use crate::prompt::{self, PromptTemplate, TemplateError};

pub use guard::{extract_statement, referenced_types, GuardError, StatementGuard, StatementPolicy};

#[derive(Error, Debug)]
pub enum NLQError {
    #[error(transparent)]
    Model(#[from] LLMError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

pub type NLQResult<T> = Result<T, NLQError>;

/// A question paired with the statement that answers it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CypherExample {
    pub question: String,
    pub statement: String,
}

impl CypherExample {
    pub fn new(question: impl Into<String>, statement: impl Into<String>) -> Self {
        Self { question: question.into(), statement: statement.into() }
    }
}

/// Examples used when none are configured
pub fn default_examples() -> Vec<CypherExample> {
    vec![
        CypherExample::new(
            "When was The 39 Steps released?",
            "MATCH (m:Movie {title: \"39 Steps, The\"}) RETURN m.released",
        ),
        CypherExample::new(
            "Who acted in The Matrix?",
            "MATCH (p:Person)-[:ACTED_IN]->(m:Movie {title: \"Matrix, The\"}) RETURN p.name",
        ),
        CypherExample::new(
            "How many movies are in the Comedy genre?",
            "MATCH (m:Movie)-[:IN_GENRE]->(:Genre {name: \"Comedy\"}) RETURN count(m) AS count",
        ),
    ]
}

/// Question + schema -> Cypher, using a zero-temperature model
pub struct CypherGenerator {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    examples: Vec<CypherExample>,
}

impl CypherGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> NLQResult<Self> {
        Ok(Self {
            model,
            template: prompt::cypher_generation()?,
            examples: default_examples(),
        })
    }

    /// Replace the generation prompt; it must declare `schema`, `examples`
    /// and `question`
    pub fn with_template(mut self, template: PromptTemplate) -> NLQResult<Self> {
        let expected = ["examples", "question", "schema"];
        let declared: Vec<&str> = template.variables().collect();
        if let Some(missing) = expected.iter().find(|v| !declared.contains(*v)) {
            return Err(TemplateError::MissingValue {
                template: template.id(),
                variable: missing.to_string(),
            }
            .into());
        }
        self.template = template;
        Ok(self)
    }

    pub fn with_examples(mut self, examples: Vec<CypherExample>) -> Self {
        self.examples = examples;
        self
    }

    pub fn examples(&self) -> &[CypherExample] {
        &self.examples
    }

    /// Render the prompt sent to the model
    pub fn render_prompt(&self, question: &str, schema: &str) -> NLQResult<String> {
        let examples = if self.examples.is_empty() {
            "(none)".to_string()
        } else {
            self.examples
                .iter()
                .map(|e| format!("Question: {}\nCypher: {}", e.question, e.statement))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let mut values = HashMap::new();
        values.insert("schema", schema.to_string());
        values.insert("examples", examples);
        values.insert("question", question.to_string());
        Ok(self.template.render(&values)?)
    }

    /// Generate a statement for `question`.
    ///
    /// The response is not validated here; see [`StatementGuard`].
    pub async fn text_to_cypher(&self, question: &str, schema: &str) -> NLQResult<String> {
        let prompt = self.render_prompt(question, schema)?;
        debug!(template = %self.template.id(), model = %self.model.model_name(), "Generating Cypher");

        let response = self.model.complete(&prompt).await?;
        Ok(extract_statement(&response))
    }
}
