//! Graph question answering
//!
//! [`GraphQaChain`] runs one question through four steps, each awaited
//! before the next:
//!
//! 1. generate a Cypher statement from the question and the schema
//!    description (zero-temperature model)
//! 2. check it with the [`StatementGuard`]
//! 3. execute it against the graph
//! 4. render the answer prompt with the records and the question and ask the
//!    answer model
//!
//! Every failure aborts the run and surfaces as a [`QaError`]; nothing is
//! retried.

pub mod retriever;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::QaConfig;
use crate::graph::{GraphClient, GraphError, GraphSchema, Record, TypeScope};
use crate::llm::{LLMError, LanguageModel};
use crate::nlq::{CypherGenerator, GuardError, NLQError, StatementGuard};
use crate::prompt::{self, PromptTemplate, TemplateError};

pub use retriever::{RetrievalPipeline, RetrievalState};

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cypher generation failed: {0}")]
    Generation(#[from] NLQError),

    #[error("Generated statement rejected: {0}")]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Answer synthesis failed: {0}")]
    Model(#[from] LLMError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Could not serialize context: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type QaResult<T> = Result<T, QaError>;

/// Result of one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaOutput {
    /// Statement that was executed
    pub query: String,
    /// Records passed to synthesis (after `top_k`)
    pub context: Vec<Record>,
    /// Synthesized answer; `None` when the chain returns records directly
    pub answer: Option<String>,
}

/// Question -> Cypher -> records -> answer
pub struct GraphQaChain {
    generator: CypherGenerator,
    answer_model: Arc<dyn LanguageModel>,
    graph: Arc<dyn GraphClient>,
    schema: GraphSchema,
    guard: StatementGuard,
    qa_template: PromptTemplate,
    options: QaConfig,
}

impl GraphQaChain {
    /// Build a chain from its collaborators.
    ///
    /// Executing model-generated statements must be switched on with
    /// `allow_dangerous_requests`. The schema is narrowed to the configured
    /// include/exclude types once, here.
    pub fn from_llm(
        cypher_model: Arc<dyn LanguageModel>,
        answer_model: Arc<dyn LanguageModel>,
        graph: Arc<dyn GraphClient>,
        schema: GraphSchema,
        options: QaConfig,
    ) -> QaResult<Self> {
        if !options.allow_dangerous_requests {
            return Err(QaError::Config(
                "executing generated Cypher requires allow_dangerous_requests = true; \
                 restrict the database user to the data the chain may read"
                    .to_string(),
            ));
        }
        if !options.include_types.is_empty() && !options.exclude_types.is_empty() {
            return Err(QaError::Config(
                "include_types and exclude_types cannot both be set".to_string(),
            ));
        }

        let scope = TypeScope::from_lists(&options.include_types, &options.exclude_types);
        let schema = schema.filtered(&scope);
        let guard = StatementGuard::new(options.policy, scope);

        let mut generator = CypherGenerator::new(cypher_model)?;
        if !options.examples.is_empty() {
            generator = generator.with_examples(options.examples.clone());
        }

        Ok(Self {
            generator,
            answer_model,
            graph,
            schema,
            guard,
            qa_template: prompt::cypher_qa()?,
            options,
        })
    }

    /// Replace the generation prompt
    pub fn with_cypher_template(mut self, template: PromptTemplate) -> QaResult<Self> {
        self.generator = self.generator.with_template(template)?;
        Ok(self)
    }

    /// Replace the answer prompt; it must declare `context` and `question`
    pub fn with_qa_template(mut self, template: PromptTemplate) -> QaResult<Self> {
        for variable in ["context", "question"] {
            if !template.variables().any(|v| v == variable) {
                return Err(TemplateError::MissingValue {
                    template: template.id(),
                    variable: variable.to_string(),
                }
                .into());
            }
        }
        self.qa_template = template;
        Ok(self)
    }

    pub fn with_return_direct(mut self, return_direct: bool) -> Self {
        self.options.return_direct = return_direct;
        self
    }

    pub fn options(&self) -> &QaConfig {
        &self.options
    }

    /// Schema text embedded in the generation prompt
    pub fn schema_description(&self) -> String {
        self.schema.describe()
    }

    /// Answer one question
    pub async fn invoke(&self, question: &str) -> QaResult<QaOutput> {
        let statement = self
            .generator
            .text_to_cypher(question, &self.schema_description())
            .await?;
        if self.options.verbose {
            info!(statement = %statement, "Generated Cypher");
        } else {
            debug!(statement = %statement, "Generated Cypher");
        }

        self.guard.check(&statement)?;

        let mut context = self.graph.query(&statement).await?;
        if let Some(top_k) = self.options.top_k {
            context.truncate(top_k);
        }
        if self.options.verbose {
            info!(records = context.len(), context = %serde_json::Value::from(context.clone()), "Full context");
        }

        if self.options.return_direct {
            return Ok(QaOutput { query: statement, context, answer: None });
        }

        let answer = self.synthesize(question, &context).await?;
        Ok(QaOutput { query: statement, context, answer: Some(answer) })
    }

    async fn synthesize(&self, question: &str, context: &[Record]) -> QaResult<String> {
        let mut values = HashMap::new();
        values.insert("context", serde_json::to_string(context)?);
        values.insert("question", question.to_string());
        let prompt = self.qa_template.render(&values)?;

        debug!(template = %self.qa_template.id(), model = %self.answer_model.model_name(), "Synthesizing answer");
        Ok(self.answer_model.complete(&prompt).await?)
    }
}
