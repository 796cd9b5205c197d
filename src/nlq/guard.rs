//! Boundary between model-generated text and the graph store
//!
//! [`extract_statement`] pulls a statement out of a model response and
//! [`StatementGuard`] decides whether it may run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::iter::Peekable;
use std::str::Chars;
use std::sync::OnceLock;
use thiserror::Error;

use crate::graph::TypeScope;

/// Which statements may be executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementPolicy {
    /// Reject anything that can modify the graph
    #[default]
    ReadOnly,
    /// Execute whatever was generated
    AllowWrites,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Generated statement is empty")]
    Empty,

    #[error("Generated statement contains write operation '{0}'")]
    WriteOperation(String),

    #[error("Generated statement references out-of-scope type '{0}'")]
    OutOfScope(String),
}

/// Procedures a read-only statement may call (lowercase)
const READ_PROCEDURES: &[&str] = &[
    "db.labels",
    "db.relationshiptypes",
    "db.propertykeys",
    "db.index.vector.querynodes",
    "db.index.vector.queryrelationships",
    "db.index.fulltext.querynodes",
    "db.index.fulltext.queryrelationships",
];

/// Procedure namespaces that only read (lowercase)
const READ_PROCEDURE_PREFIXES: &[&str] = &["db.schema.", "apoc.meta."];

const IDENT: &str = r"`?[A-Za-z_][A-Za-z0-9_]*`?";

struct Patterns {
    write_clause: Regex,
    procedure_call: Regex,
    node_labels: Regex,
    rel_types: Regex,
    label_predicate: Regex,
    literal_in_labels: Regex,
    literal_equals_fn: Regex,
    fn_compared: Regex,
    type_function: Regex,
    placeholder: Regex,
    name: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("guard pattern is valid");
        Patterns {
            write_clause: compile(
                r"(?i)(?:^|[^.\w])(CREATE|MERGE|SET|DELETE|DETACH|REMOVE|DROP|FOREACH|LOAD\s+CSV)\b",
            ),
            procedure_call: compile(
                r"(?i)(?:^|[^.\w`])CALL\b\s*(\{|(?:`[^`]*`|\w+)(?:\s*\.\s*(?:`[^`]*`|\w+))*)?",
            ),
            node_labels: compile(&format!(
                r"\(\s*(?:[A-Za-z_][A-Za-z0-9_]*)?\s*((?::\s*{IDENT}\s*)+)"
            )),
            rel_types: compile(&format!(
                r"\[\s*(?:[A-Za-z_][A-Za-z0-9_]*)?\s*:\s*({IDENT}(?:\s*\|\s*:?\s*{IDENT})*)"
            )),
            label_predicate: compile(&format!(
                r"(?i)\b(?:WHERE|AND|OR|NOT|XOR)\s+\(?\s*[A-Za-z_][A-Za-z0-9_]*((?::{IDENT})+)"
            )),
            literal_in_labels: compile(r"(?i)('\d+')\s+IN\s+labels\s*\("),
            literal_equals_fn: compile(r"(?i)('\d+')\s*(?:=|<>)\s*(?:labels|type)\s*\("),
            fn_compared: compile(
                r"(?i)\b(?:labels|type)\s*\([^()]*\)\s*(?:=|<>|IN|CONTAINS|STARTS\s+WITH|ENDS\s+WITH)\s*\[?((?:\s*'\d+'\s*,?)+)",
            ),
            type_function: compile(r"(?i)\b(?:labels|type)\s*\("),
            placeholder: compile(r"'(\d+)'"),
            name: compile(r"[A-Za-z_][A-Za-z0-9_]*"),
        }
    })
}

/// A statement with its quoted parts taken out, scanned in one pass
struct Masked {
    /// String literals replaced by `'<index>'`, comments removed
    code: String,
    /// `code` with backtick-quoted names emptied
    bare: String,
    literals: Vec<String>,
}

impl Masked {
    fn new(statement: &str) -> Self {
        let mut masked = Masked { code: String::new(), bare: String::new(), literals: Vec::new() };
        let mut chars = statement.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\'' | '"' => {
                    let placeholder = format!("'{}'", masked.literals.len());
                    masked.literals.push(read_literal(&mut chars, c));
                    masked.push_both(&placeholder);
                }
                '`' => {
                    let name = read_quoted_name(&mut chars);
                    masked.code.push('`');
                    masked.code.push_str(&name.replace('`', "``"));
                    masked.code.push('`');
                    masked.bare.push_str("``");
                }
                '/' if chars.peek() == Some(&'/') => {
                    for n in chars.by_ref() {
                        if n == '\n' {
                            break;
                        }
                    }
                    masked.push_both("\n");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut prev = '\0';
                    for n in chars.by_ref() {
                        if prev == '*' && n == '/' {
                            break;
                        }
                        prev = n;
                    }
                    masked.push_both(" ");
                }
                _ => {
                    masked.code.push(c);
                    masked.bare.push(c);
                }
            }
        }
        masked
    }

    fn push_both(&mut self, s: &str) {
        self.code.push_str(s);
        self.bare.push_str(s);
    }

    fn literal(&self, placeholder: &str) -> Option<&str> {
        let index: usize = placeholder.trim_matches('\'').parse().ok()?;
        self.literals.get(index).map(String::as_str)
    }
}

fn read_literal(chars: &mut Peekable<Chars<'_>>, quote: char) -> String {
    let mut text = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    text.push(escaped);
                }
            }
            c if c == quote => break,
            c => text.push(c),
        }
    }
    text
}

/// Backtick-quoted name; a doubled backtick stands for one backtick
fn read_quoted_name(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(c) = chars.next() {
        if c == '`' {
            if chars.peek() == Some(&'`') {
                chars.next();
                name.push('`');
            } else {
                break;
            }
        } else {
            name.push(c);
        }
    }
    name
}

fn is_read_procedure(name: &str) -> bool {
    READ_PROCEDURES.contains(&name) || READ_PROCEDURE_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Take the statement out of a model response.
///
/// A fenced code block yields its body; any other response is returned
/// byte-for-byte.
pub fn extract_statement(response: &str) -> String {
    let Some(start) = response.find("```") else {
        return response.to_string();
    };

    let after_fence = &response[start + 3..];
    // Skip language tag (e.g. "cypher\n")
    let code_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[code_start..];
    match body.find("```") {
        Some(end) => body[..end].trim().to_string(),
        None => body.trim().to_string(),
    }
}

/// Validates statements before execution.
///
/// Under [`StatementPolicy::ReadOnly`] write clauses are rejected and `CALL`
/// may only name a known read procedure (`db.schema.*`, `db.labels`, vector
/// and fulltext index queries, `apoc.meta.*`).
///
/// Type scoping sees labels and relationship types written in patterns and
/// label predicates, plus string literals compared directly with `labels()`
/// or `type()`. With an exclude scope, any literal naming an excluded type
/// is rejected once `labels()` or `type()` appears. Names built at runtime
/// (parameters, string concatenation) are not seen.
#[derive(Debug, Clone, Default)]
pub struct StatementGuard {
    policy: StatementPolicy,
    scope: TypeScope,
}

impl StatementGuard {
    pub fn new(policy: StatementPolicy, scope: TypeScope) -> Self {
        Self { policy, scope }
    }

    pub fn policy(&self) -> StatementPolicy {
        self.policy
    }

    /// Accept or reject `statement`; never rewrites it
    pub fn check(&self, statement: &str) -> Result<(), GuardError> {
        if statement.trim().is_empty() {
            return Err(GuardError::Empty);
        }

        let masked = Masked::new(statement);

        if self.policy == StatementPolicy::ReadOnly {
            check_procedures(&masked)?;
            if let Some(caps) = patterns().write_clause.captures(&masked.bare) {
                let keyword = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
                return Err(GuardError::WriteOperation(keyword.to_uppercase()));
            }
        }

        if !self.scope.is_all() {
            for name in types_in(&masked.code) {
                if !self.scope.allows(&name) {
                    return Err(GuardError::OutOfScope(name));
                }
            }
            for name in compared_type_literals(&masked, &self.scope) {
                if !self.scope.allows(&name) {
                    return Err(GuardError::OutOfScope(name));
                }
            }
        }

        Ok(())
    }
}

fn check_procedures(masked: &Masked) -> Result<(), GuardError> {
    for caps in patterns().procedure_call.captures_iter(&masked.code) {
        let Some(target) = caps.get(1) else {
            return Err(GuardError::WriteOperation("CALL".to_string()));
        };
        if target.as_str() == "{" {
            // Subquery; its clauses are scanned with the rest
            continue;
        }

        let name: String = target
            .as_str()
            .chars()
            .filter(|c| *c != '`' && !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if !is_read_procedure(&name) {
            return Err(GuardError::WriteOperation(name));
        }
    }
    Ok(())
}

/// Literals compared with `labels()` / `type()`
fn compared_type_literals(masked: &Masked, scope: &TypeScope) -> Vec<String> {
    let p = patterns();
    let mut placeholders: Vec<&str> = Vec::new();

    for re in [&p.literal_in_labels, &p.literal_equals_fn] {
        for caps in re.captures_iter(&masked.code) {
            if let Some(m) = caps.get(1) {
                placeholders.push(m.as_str());
            }
        }
    }
    for caps in p.fn_compared.captures_iter(&masked.code) {
        if let Some(list) = caps.get(1) {
            placeholders.extend(p.placeholder.find_iter(list.as_str()).map(|m| m.as_str()));
        }
    }

    let mut names: Vec<String> = placeholders
        .into_iter()
        .filter_map(|ph| masked.literal(ph))
        .map(str::to_string)
        .collect();

    if let TypeScope::Exclude(excluded) = scope {
        if p.type_function.is_match(&masked.code) {
            names.extend(masked.literals.iter().filter(|l| excluded.contains(l.as_str())).cloned());
        }
    }
    names
}

/// Labels and relationship types named in node/relationship patterns and
/// label predicates, in order of appearance
pub fn referenced_types(statement: &str) -> Vec<String> {
    types_in(&Masked::new(statement).code)
}

fn types_in(code: &str) -> Vec<String> {
    let p = patterns();
    let mut found: Vec<(usize, String)> = Vec::new();

    for re in [&p.node_labels, &p.rel_types, &p.label_predicate] {
        for caps in re.captures_iter(code) {
            let group = &caps[1];
            let offset = caps.get(1).map(|m| m.start()).unwrap_or_default();
            for name in p.name.find_iter(group) {
                found.push((offset + name.start(), name.as_str().to_string()));
            }
        }
    }

    found.sort();
    let mut names = Vec::new();
    for (_, name) in found {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
