//! Prompt templates
//!
//! Templates are named and versioned, and declare the variables they expect.
//! Placeholders are written `{name}`; a literal brace is written `{{` or `}}`.
//! Declarations are checked against the text when a template is built, and the
//! supplied values are checked against the declarations when it is rendered.

pub mod library;

use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;
use thiserror::Error;

pub use library::{cypher_generation, cypher_qa, context_qa};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template {template} uses undeclared variable '{variable}'")]
    Undeclared { template: String, variable: String },

    #[error("Template {template} declares '{variable}' but never uses it")]
    Unused { template: String, variable: String },

    #[error("Template {template} is missing a value for '{variable}'")]
    MissingValue { template: String, variable: String },

    #[error("Template {template} received unknown variable '{variable}'")]
    UnknownValue { template: String, variable: String },
}

pub type TemplateResult<T> = Result<T, TemplateError>;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// A named, versioned prompt with declared substitution variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    version: u32,
    text: String,
    variables: BTreeSet<String>,
}

impl PromptTemplate {
    /// Build a template, checking that `variables` matches the placeholders in `text`
    pub fn new(
        name: impl Into<String>,
        version: u32,
        text: impl Into<String>,
        variables: &[&str],
    ) -> TemplateResult<Self> {
        let name = name.into();
        let text = text.into();
        let declared: BTreeSet<String> = variables.iter().map(|v| v.to_string()).collect();
        let used = Self::placeholders(&text);

        if let Some(variable) = used.difference(&declared).next() {
            return Err(TemplateError::Undeclared { template: name, variable: variable.clone() });
        }
        if let Some(variable) = declared.difference(&used).next() {
            return Err(TemplateError::Unused { template: name, variable: variable.clone() });
        }

        Ok(Self { name, version, text, variables: declared })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// `name@vN`, used in logs
    pub fn id(&self) -> String {
        format!("{}@v{}", self.name, self.version)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    /// Substitute every declared variable.
    ///
    /// Values are inserted verbatim and never rescanned for placeholders.
    pub fn render(&self, values: &HashMap<&str, String>) -> TemplateResult<String> {
        for key in values.keys() {
            if !self.variables.contains(*key) {
                return Err(TemplateError::UnknownValue {
                    template: self.id(),
                    variable: key.to_string(),
                });
            }
        }
        for variable in &self.variables {
            if !values.contains_key(variable.as_str()) {
                return Err(TemplateError::MissingValue {
                    template: self.id(),
                    variable: variable.clone(),
                });
            }
        }

        let rendered = placeholder_regex().replace_all(&self.text, |caps: &Captures| {
            match caps.get(1) {
                Some(var) => values[var.as_str()].clone(),
                None if &caps[0] == "{{" => "{".to_string(),
                None => "}".to_string(),
            }
        });
        Ok(rendered.into_owned())
    }

    fn placeholders(text: &str) -> BTreeSet<String> {
        placeholder_regex()
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }
}
