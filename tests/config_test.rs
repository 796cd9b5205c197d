use cinegraph::{AppConfig, LLMProvider, StatementPolicy};
use std::io::Write;

const YAML: &str = r#"
graph:
  uri: neo4j+s://demo.neo4jlabs.com
  username: recommendations
  password: recommendations
  database: recommendations
answer_model:
  provider: Ollama
  model: llama3
qa:
  allow_dangerous_requests: true
  policy: ReadOnly
  exclude_types: [User, RATED]
  examples:
    - question: How many movies are there?
      statement: MATCH (m:Movie) RETURN count(m)
"#;

#[test]
fn test_load_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(YAML.as_bytes()).unwrap();

    let config = AppConfig::from_yaml_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.graph.database(), "recommendations");
    assert_eq!(config.answer_model.provider, LLMProvider::Ollama);
    assert_eq!(config.cypher_model.temperature, Some(0.0));
    assert!(config.qa.allow_dangerous_requests);
    assert_eq!(config.qa.policy, StatementPolicy::ReadOnly);
    assert_eq!(config.qa.exclude_types, vec!["User", "RATED"]);
    assert_eq!(config.qa.examples.len(), 1);
    assert_eq!(config.vector.index_name, "moviePlots");
}

#[test]
fn test_env_overrides_file() {
    let mut config = AppConfig::from_yaml_str(YAML).unwrap();
    config.apply_env(|key| match key {
        "NEO4J_URI" => Some("bolt://localhost:7687".to_string()),
        "NEO4J_PASSWORD" => Some("secret".to_string()),
        _ => None,
    });

    assert_eq!(config.graph.uri, "bolt://localhost:7687");
    assert_eq!(config.graph.username, "recommendations");
    assert_eq!(config.graph.password, "secret");
}

#[test]
fn test_cypher_model_section_stays_deterministic() {
    let config = AppConfig::from_yaml_str("cypher_model:\n  model: gpt-4o-mini\n").unwrap();
    assert_eq!(config.cypher_model.model, "gpt-4o-mini");
    assert_eq!(config.cypher_model.temperature, Some(0.0));
}
