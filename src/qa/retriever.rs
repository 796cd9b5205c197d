//! Retrieve-then-generate
//!
//! The graph chain runs with `return_direct` so its records become the
//! context of a second, generic question/context prompt.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{GraphQaChain, QaError, QaResult};
use crate::graph::Record;
use crate::llm::LanguageModel;
use crate::prompt::{self, PromptTemplate};

/// Everything the pipeline produced for one question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalState {
    pub question: String,
    pub query: String,
    pub context: Vec<Record>,
    pub answer: String,
}

pub struct RetrievalPipeline {
    retriever: GraphQaChain,
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
}

impl RetrievalPipeline {
    pub fn new(retriever: GraphQaChain, model: Arc<dyn LanguageModel>) -> QaResult<Self> {
        Ok(Self {
            retriever: retriever.with_return_direct(true),
            model,
            template: prompt::context_qa()?,
        })
    }

    /// Fetch context for `question`
    pub async fn retrieve(&self, question: &str) -> QaResult<(String, Vec<Record>)> {
        let output = self.retriever.invoke(question).await?;
        Ok((output.query, output.context))
    }

    /// Answer `question` from already retrieved records
    pub async fn generate(&self, question: &str, context: &[Record]) -> QaResult<String> {
        let context = context
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(QaError::from)?
            .join("\n");

        let mut values = HashMap::new();
        values.insert("context", context);
        values.insert("question", question.to_string());
        let prompt = self.template.render(&values)?;

        debug!(template = %self.template.id(), model = %self.model.model_name(), "Generating from context");
        Ok(self.model.complete(&prompt).await?)
    }

    pub async fn invoke(&self, question: &str) -> QaResult<RetrievalState> {
        let (query, context) = self.retrieve(question).await?;
        let answer = self.generate(question, &context).await?;
        Ok(RetrievalState {
            question: question.to_string(),
            query,
            context,
            answer,
        })
    }
}
