//! Built-in prompts

use super::{PromptTemplate, TemplateResult};

const CYPHER_GENERATION: &str = "Task: Generate a Cypher statement to query a graph database.
Instructions:
Use only the node labels, relationship types and properties provided in the schema.
Do not use any other relationship types or properties that are not provided.
For movie titles that begin with an article, move the article to the end,
for example \"The 39 Steps\" becomes \"39 Steps, The\".

Schema:
{schema}

Examples:
{examples}

Note: Do not include any explanations or apologies in your responses.
Do not respond to any questions that might ask anything other than for you to construct a Cypher statement.
Do not include any text except the generated Cypher statement.

The question is:
{question}";

const CYPHER_QA: &str = "You are an assistant that helps to form nice and human understandable answers.
The information part contains the provided information that you must use to construct an answer.
The provided information is authoritative; never doubt it or try to use your internal knowledge to correct it.
Make the answer sound like a response to the question. Do not mention that you based the result on the given information.
If the provided information is empty, say that you don't know the answer.

Information:
{context}

Question: {question}
Helpful Answer:";

const CONTEXT_QA: &str = "Use the following pieces of context to answer the question at the end.
If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}

Answer:";

/// Question + schema + few-shot examples -> a single Cypher statement
pub fn cypher_generation() -> TemplateResult<PromptTemplate> {
    PromptTemplate::new("cypher_generation", 1, CYPHER_GENERATION, &["schema", "examples", "question"])
}

/// Question + query records -> natural-language answer
pub fn cypher_qa() -> TemplateResult<PromptTemplate> {
    PromptTemplate::new("cypher_qa", 1, CYPHER_QA, &["context", "question"])
}

/// Generic retrieve-then-generate prompt
pub fn context_qa() -> TemplateResult<PromptTemplate> {
    PromptTemplate::new("context_qa", 1, CONTEXT_QA, &["context", "question"])
}
