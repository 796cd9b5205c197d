//! Runtime configuration
//!
//! A single [`AppConfig`] is assembled per process: built-in defaults, then an
//! optional YAML file, then environment variables (a `.env` file in the
//! working directory is loaded first). The result is passed by reference into
//! every step; nothing is held in process-wide state.

use crate::nlq::{CypherExample, StatementPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming an optional YAML config file
pub const CONFIG_PATH_VAR: &str = "CINEGRAPH_CONFIG";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// LLM Provider options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProvider {
    OpenAI,
    Ollama,
    Gemini,
}

impl LLMProvider {
    /// Default API base URL for the provider
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI => "https://api.openai.com/v1",
            LLMProvider::Ollama => "http://localhost:11434",
            LLMProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Environment variable holding the provider's API key, if it needs one
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            LLMProvider::OpenAI => Some("OPENAI_API_KEY"),
            LLMProvider::Gemini => Some("GEMINI_API_KEY"),
            LLMProvider::Ollama => None,
        }
    }
}

/// Chat model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// The LLM provider to use
    pub provider: LLMProvider,
    /// Model name (e.g., "gpt-4o", "llama3")
    pub model: String,
    /// API Key (loaded from the provider's env var if None)
    pub api_key: Option<String>,
    /// API Base URL (optional, provider default otherwise)
    pub api_base_url: Option<String>,
    /// Sampling temperature; None leaves the provider default
    pub temperature: Option<f32>,
    /// System prompt sent ahead of every request
    pub system_prompt: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            model: "gpt-4o".to_string(),
            api_key: None,
            api_base_url: None,
            temperature: None,
            system_prompt: None,
        }
    }
}

impl ModelConfig {
    /// Same model pinned to temperature 0, for deterministic Cypher output
    pub fn deterministic(mut self) -> Self {
        self.temperature = Some(0.0);
        self
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: LLMProvider,
    /// Model name (e.g., "text-embedding-ada-002")
    pub model: String,
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    /// Vector dimension produced by the model
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            model: "text-embedding-ada-002".to_string(),
            api_key: None,
            api_base_url: None,
            dimensions: 1536,
        }
    }
}

/// Graph store connection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    /// Connection URI (`neo4j+s://...`, `bolt://...` or `http(s)://...`)
    pub uri: String,
    pub username: String,
    pub password: String,
    /// Database name; `neo4j` when unset
    pub database: Option<String>,
}

impl GraphConfig {
    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or("neo4j")
    }
}

/// Existing vector index holding node embeddings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorIndexConfig {
    pub index_name: String,
    /// Label of the indexed nodes
    pub node_label: String,
    /// Node property holding the text content
    pub text_property: String,
    /// Node property holding the embedding
    pub embedding_property: String,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            index_name: "moviePlots".to_string(),
            node_label: "Movie".to_string(),
            text_property: "plot".to_string(),
            embedding_property: "plotEmbedding".to_string(),
        }
    }
}

/// Options for the question-answering chain
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QaConfig {
    /// Opt-in to executing model-generated statements
    pub allow_dangerous_requests: bool,
    /// Which statements the guard lets through
    pub policy: StatementPolicy,
    /// Return the query records instead of a synthesized answer
    pub return_direct: bool,
    /// Truncate context to this many records before synthesis
    pub top_k: Option<usize>,
    /// Restrict the schema to these labels / relationship types
    pub include_types: Vec<String>,
    /// Remove these labels / relationship types from the schema
    pub exclude_types: Vec<String>,
    /// Few-shot examples embedded in the generation prompt
    pub examples: Vec<CypherExample>,
    /// Log generated statements and full context
    pub verbose: bool,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub graph: GraphConfig,
    /// Model used for answer synthesis
    pub answer_model: ModelConfig,
    /// Model used for Cypher generation
    pub cypher_model: ModelConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorIndexConfig,
    pub qa: QaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            answer_model: ModelConfig::default(),
            cypher_model: ModelConfig::default().deterministic(),
            embedding: EmbeddingConfig::default(),
            vector: VectorIndexConfig::default(),
            qa: QaConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration for this process.
    ///
    /// `path` wins over `CINEGRAPH_CONFIG`; with neither, defaults are used
    /// before the environment overlay.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_file.display());
        }

        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_VAR).ok().map(Into::into));

        let mut config = match file {
            Some(file) => {
                info!("Reading configuration from {}", file.display());
                Self::from_yaml_file(&file)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document; missing sections keep their defaults.
    ///
    /// A `cypher_model` section without a temperature stays at 0.
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        if config.cypher_model.temperature.is_none() {
            config.cypher_model.temperature = Some(0.0);
        }
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Overlay environment settings using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Some(username) = lookup("NEO4J_USERNAME") {
            self.graph.username = username;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.graph.password = password;
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            self.graph.database = Some(database);
        }

        for model in [&mut self.answer_model, &mut self.cypher_model] {
            if model.api_key.is_none() {
                model.api_key = model.provider.api_key_var().and_then(&lookup);
            }
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = self.embedding.provider.api_key_var().and_then(&lookup);
        }
    }

    /// Check settings every run needs
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("NEO4J_URI", &self.graph.uri),
            ("NEO4J_USERNAME", &self.graph.username),
            ("NEO4J_PASSWORD", &self.graph.password),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name.to_string()));
            }
        }

        if !self.qa.include_types.is_empty() && !self.qa.exclude_types.is_empty() {
            return Err(ConfigError::Invalid(
                "include_types and exclude_types cannot both be set".to_string(),
            ));
        }

        if self.embedding.dimensions == 0 {
            return Err(ConfigError::Invalid("embedding dimensions must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults_pin_cypher_model_temperature() {
        let config = AppConfig::default();
        assert_eq!(config.cypher_model.temperature, Some(0.0));
        assert_eq!(config.answer_model.temperature, None);
        assert_eq!(config.vector.index_name, "moviePlots");
        assert_eq!(config.graph.database(), "neo4j");
    }

    #[test]
    fn test_env_overlay() {
        let vars = env(&[
            ("NEO4J_URI", "neo4j+s://demo.example.com"),
            ("NEO4J_USERNAME", "movies"),
            ("NEO4J_PASSWORD", "secret"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).cloned());

        assert_eq!(config.graph.uri, "neo4j+s://demo.example.com");
        assert_eq!(config.graph.username, "movies");
        assert_eq!(config.answer_model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.cypher_model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_credentials_fail_fast() {
        let vars = env(&[("NEO4J_URI", "bolt://localhost:7687"), ("NEO4J_USERNAME", "neo4j")]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).cloned());

        match config.validate() {
            Err(ConfigError::Missing(name)) => assert_eq!(name, "NEO4J_PASSWORD"),
            other => panic!("expected missing password, got {:?}", other),
        }
    }

    #[test]
    fn test_yaml_partial_sections() {
        let yaml = r#"
cypher_model:
  provider: Ollama
  model: llama3
qa:
  allow_dangerous_requests: true
  exclude_types: [User, RATED]
  examples:
    - question: "Who directed Heat?"
      statement: "MATCH (p:Person)-[:DIRECTED]->(:Movie {title: 'Heat'}) RETURN p.name"
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cypher_model.provider, LLMProvider::Ollama);
        assert_eq!(config.cypher_model.model, "llama3");
        // Sections not mentioned keep their defaults
        assert_eq!(config.answer_model.model, "gpt-4o");
        assert_eq!(config.embedding.dimensions, 1536);
        assert!(config.qa.allow_dangerous_requests);
        assert_eq!(config.qa.exclude_types, vec!["User", "RATED"]);
        assert_eq!(config.qa.examples.len(), 1);
        assert_eq!(config.qa.policy, StatementPolicy::ReadOnly);
        assert_eq!(config.cypher_model.temperature, Some(0.0));
        assert_eq!(config.answer_model.temperature, None);
    }

    #[test]
    fn test_cypher_model_temperature_kept_when_set() {
        let config = AppConfig::from_yaml_str("cypher_model:\n  model: gpt-4o-mini\n  temperature: 0.2\n").unwrap();
        assert_eq!(config.cypher_model.model, "gpt-4o-mini");
        assert_eq!(config.cypher_model.temperature, Some(0.2));
    }

    #[test]
    fn test_include_and_exclude_conflict() {
        let mut config = AppConfig::default();
        config.graph = GraphConfig {
            uri: "http://localhost:7474".to_string(),
            username: "neo4j".to_string(),
            password: "pw".to_string(),
            database: None,
        };
        config.qa.include_types = vec!["Movie".to_string()];
        config.qa.exclude_types = vec!["User".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cinegraph.yaml");
        std::fs::write(
            &path,
            "graph:\n  uri: http://localhost:7474\n  username: neo4j\n  password: pw\n  database: movies\n",
        )
        .unwrap();

        let config = AppConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.graph.database(), "movies");
        assert!(config.validate().is_ok());
    }
}
