//! Schema description
//!
//! Summarises node labels, relationship types and their properties so a
//! language model can be told what the graph looks like. The summary can be
//! narrowed with a [`TypeScope`] before it is rendered.

use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::graph::{GraphClient, GraphError, GraphResult, Record};

const NODE_PROPERTIES_QUERY: &str = "CALL db.schema.nodeTypeProperties()
YIELD nodeLabels, propertyName, propertyTypes
UNWIND nodeLabels AS label
RETURN label, propertyName AS property, propertyTypes AS types";

const REL_PROPERTIES_QUERY: &str = "CALL db.schema.relTypeProperties()
YIELD relType, propertyName, propertyTypes
RETURN relType AS type, propertyName AS property, propertyTypes AS types";

const RELATIONSHIPS_QUERY: &str = "MATCH (a)-[r]->(b)
WITH a, r, b LIMIT $sample
UNWIND labels(a) AS start
UNWIND labels(b) AS end
RETURN DISTINCT start, type(r) AS type, end";

/// Number of relationships sampled to discover patterns
pub const DEFAULT_RELATIONSHIP_SAMPLE: usize = 10_000;

/// Which labels and relationship types are visible
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TypeScope {
    #[default]
    All,
    Include(BTreeSet<String>),
    Exclude(BTreeSet<String>),
}

impl TypeScope {
    /// Build from include/exclude lists; an include list takes precedence
    pub fn from_lists(include: &[String], exclude: &[String]) -> Self {
        if !include.is_empty() {
            TypeScope::Include(include.iter().cloned().collect())
        } else if !exclude.is_empty() {
            TypeScope::Exclude(exclude.iter().cloned().collect())
        } else {
            TypeScope::All
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        match self {
            TypeScope::All => true,
            TypeScope::Include(names) => names.contains(name),
            TypeScope::Exclude(names) => !names.contains(name),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, TypeScope::All)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    /// Display type, e.g. `STRING`, `INTEGER`, `LIST`
    pub type_name: String,
}

/// `(:start)-[:rel_type]->(:end)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RelationshipPattern {
    pub start: String,
    pub rel_type: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSchema {
    pub node_properties: BTreeMap<String, Vec<PropertyInfo>>,
    pub rel_properties: BTreeMap<String, Vec<PropertyInfo>>,
    pub relationships: BTreeSet<RelationshipPattern>,
}

impl GraphSchema {
    /// Read the schema from a live graph
    pub async fn introspect(graph: &dyn GraphClient, sample: usize) -> GraphResult<Self> {
        let nodes = graph.query(NODE_PROPERTIES_QUERY).await?;
        let rels = graph.query(REL_PROPERTIES_QUERY).await?;
        let patterns = graph
            .query_with_params(RELATIONSHIPS_QUERY, Some(json!({ "sample": sample })))
            .await?;

        let schema = Self::from_records(&nodes, &rels, &patterns)?;
        debug!(
            labels = schema.node_properties.len(),
            rel_types = schema.rel_properties.len(),
            patterns = schema.relationships.len(),
            "Introspected graph schema"
        );
        Ok(schema)
    }

    /// Assemble a schema from the rows of the three introspection queries
    pub fn from_records(nodes: &[Record], rels: &[Record], patterns: &[Record]) -> GraphResult<Self> {
        let mut schema = GraphSchema::default();

        for row in nodes {
            let label = required_str(row, "label")?;
            let props = schema.node_properties.entry(label.to_string()).or_default();
            if let Some(prop) = property_info(row) {
                props.push(prop);
            }
        }

        for row in rels {
            let rel_type = clean_rel_type(required_str(row, "type")?);
            let props = schema.rel_properties.entry(rel_type).or_default();
            if let Some(prop) = property_info(row) {
                props.push(prop);
            }
        }

        for row in patterns {
            schema.relationships.insert(RelationshipPattern {
                start: required_str(row, "start")?.to_string(),
                rel_type: required_str(row, "type")?.to_string(),
                end: required_str(row, "end")?.to_string(),
            });
        }

        Ok(schema)
    }

    /// Copy of the schema restricted to `scope`.
    ///
    /// A relationship pattern survives only if its start label, type and end
    /// label are all in scope.
    pub fn filtered(&self, scope: &TypeScope) -> Self {
        if scope.is_all() {
            return self.clone();
        }

        GraphSchema {
            node_properties: self
                .node_properties
                .iter()
                .filter(|(label, _)| scope.allows(label))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            rel_properties: self
                .rel_properties
                .iter()
                .filter(|(rel_type, _)| scope.allows(rel_type))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            relationships: self
                .relationships
                .iter()
                .filter(|p| scope.allows(&p.start) && scope.allows(&p.rel_type) && scope.allows(&p.end))
                .cloned()
                .collect(),
        }
    }

    /// Render the text handed to the query generator
    pub fn describe(&self) -> String {
        let mut out = String::from("Node properties:\n");
        for (label, props) in &self.node_properties {
            out.push_str(&format!("{} {}\n", label, format_props(props)));
        }

        out.push_str("Relationship properties:\n");
        for (rel_type, props) in self.rel_properties.iter().filter(|(_, p)| !p.is_empty()) {
            out.push_str(&format!("{} {}\n", rel_type, format_props(props)));
        }

        out.push_str("The relationships:\n");
        for p in &self.relationships {
            out.push_str(&format!("(:{})-[:{}]->(:{})\n", p.start, p.rel_type, p.end));
        }

        out.trim_end().to_string()
    }
}

fn format_props(props: &[PropertyInfo]) -> String {
    let inner: Vec<String> = props
        .iter()
        .map(|p| format!("{}: {}", p.name, p.type_name))
        .collect();
    format!("{{{}}}", inner.join(", "))
}

fn required_str<'a>(row: &'a Record, key: &str) -> GraphResult<&'a str> {
    row.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| GraphError::ProtocolError(format!("Schema row is missing '{}'", key)))
}

fn property_info(row: &Record) -> Option<PropertyInfo> {
    let name = row.get("property")?.as_str()?.to_string();
    let types: Vec<&str> = row
        .get("types")
        .and_then(Value::as_array)
        .map(|types| types.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut names: Vec<&'static str> = types.iter().map(|t| display_type(t)).collect();
    names.dedup();
    let type_name = if names.is_empty() { "ANY".to_string() } else { names.join("|") };

    Some(PropertyInfo { name, type_name })
}

/// `:\`ACTED_IN\`` -> `ACTED_IN`
fn clean_rel_type(raw: &str) -> String {
    raw.trim_start_matches(':').trim_matches('`').to_string()
}

fn display_type(neo4j_type: &str) -> &'static str {
    match neo4j_type {
        "String" => "STRING",
        "Long" | "Integer" => "INTEGER",
        "Double" | "Float" => "FLOAT",
        "Boolean" => "BOOLEAN",
        "Date" => "DATE",
        "DateTime" | "LocalDateTime" => "DATE_TIME",
        "Point" => "POINT",
        t if t.ends_with("Array") => "LIST",
        _ => "ANY",
    }
}
