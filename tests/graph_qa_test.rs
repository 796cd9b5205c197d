mod common;

use cinegraph::graph::{GraphSchema, PropertyInfo, RelationshipPattern};
use cinegraph::{GraphError, GraphQaChain, GuardError, QaConfig, QaError, RetrievalPipeline};
use common::{record, StubGraph, StubModel};
use serde_json::json;
use std::sync::Arc;

const SCI_FI_QUESTION: &str = "How many movies are in the Sci-Fi genre?";
const SCI_FI_CYPHER: &str = "MATCH (m:Movie)-[:IN_GENRE]->(:Genre {name: \"Sci-Fi\"}) RETURN count(m) AS count";

fn options() -> QaConfig {
    QaConfig { allow_dangerous_requests: true, ..QaConfig::default() }
}

fn movie_schema() -> GraphSchema {
    let mut schema = GraphSchema::default();
    schema.node_properties.insert(
        "Movie".to_string(),
        vec![PropertyInfo { name: "title".to_string(), type_name: "STRING".to_string() }],
    );
    schema.node_properties.insert(
        "Genre".to_string(),
        vec![PropertyInfo { name: "name".to_string(), type_name: "STRING".to_string() }],
    );
    schema.node_properties.insert(
        "User".to_string(),
        vec![PropertyInfo { name: "userId".to_string(), type_name: "STRING".to_string() }],
    );
    schema.relationships.insert(RelationshipPattern {
        start: "Movie".to_string(),
        rel_type: "IN_GENRE".to_string(),
        end: "Genre".to_string(),
    });
    schema.relationships.insert(RelationshipPattern {
        start: "User".to_string(),
        rel_type: "RATED".to_string(),
        end: "Movie".to_string(),
    });
    schema
}

#[tokio::test]
async fn test_sci_fi_count_end_to_end() {
    let cypher_model = Arc::new(StubModel::new(SCI_FI_CYPHER));
    let answer_model = Arc::new(StubModel::new("There are 42 movies in the Sci-Fi genre."));
    let graph = Arc::new(StubGraph::returning(vec![record(json!({"count": 42}))]));

    let chain = GraphQaChain::from_llm(
        cypher_model.clone(),
        answer_model.clone(),
        graph.clone(),
        movie_schema(),
        options(),
    )
    .unwrap();

    let output = chain.invoke(SCI_FI_QUESTION).await.unwrap();
    assert!(output.answer.unwrap().contains("42"));
    assert_eq!(output.query, SCI_FI_CYPHER);

    let generation = cypher_model.prompts();
    assert_eq!(generation.len(), 1);
    assert!(generation[0].contains("(:Movie)-[:IN_GENRE]->(:Genre)"));
    assert!(generation[0].contains(SCI_FI_QUESTION));

    let synthesis = answer_model.prompts();
    assert_eq!(synthesis.len(), 1);
    assert!(synthesis[0].contains("[{\"count\":42}]"));
}

#[tokio::test]
async fn test_generated_statement_executed_verbatim() {
    let responses = [
        "MATCH (m:Movie) RETURN m.title LIMIT 5",
        "  MATCH (p:Person)-[:DIRECTED]->(m:Movie)\nWHERE m.title = 'Heat'\nRETURN p.name  ",
        "MATCH (m:Movie {title: \"39 Steps, The\"}) RETURN m.released",
    ];

    for response in responses {
        let graph = Arc::new(StubGraph::returning(vec![]));
        let chain = GraphQaChain::from_llm(
            Arc::new(StubModel::new(response)),
            Arc::new(StubModel::new("I don't know.")),
            graph.clone(),
            GraphSchema::default(),
            options(),
        )
        .unwrap();

        chain.invoke("anything").await.unwrap();
        assert_eq!(graph.statements(), vec![response.to_string()]);
    }
}

#[tokio::test]
async fn test_synthesis_receives_question_and_exact_context() {
    let rows = vec![
        record(json!({"actor": "Tom Cruise", "role": "Ethan Hunt"})),
        record(json!({"actor": "Jon Voight", "role": "Jim Phelps"})),
    ];
    let answer_model = Arc::new(StubModel::new("Tom Cruise and Jon Voight."));
    let question = "Who acted in Mission: Impossible, and as whom?";

    let chain = GraphQaChain::from_llm(
        Arc::new(StubModel::new("MATCH (p:Person)-[r:ACTED_IN]->(m:Movie) RETURN p.name AS actor, r.role AS role")),
        answer_model.clone(),
        Arc::new(StubGraph::returning(rows.clone())),
        GraphSchema::default(),
        options(),
    )
    .unwrap();

    let output = chain.invoke(question).await.unwrap();
    assert_eq!(output.context, rows);

    let prompt = &answer_model.prompts()[0];
    assert!(prompt.contains(&serde_json::to_string(&rows).unwrap()));
    assert!(prompt.contains(&format!("Question: {}", question)));
}

#[tokio::test]
async fn test_graph_error_propagates_unchanged() {
    let answer_model = Arc::new(StubModel::new("unused"));
    let chain = GraphQaChain::from_llm(
        Arc::new(StubModel::new("MATCH (m:Movie RETURN m")),
        answer_model.clone(),
        Arc::new(StubGraph::failing("Neo.ClientError.Statement.SyntaxError", "Invalid input 'RETURN'")),
        GraphSchema::default(),
        options(),
    )
    .unwrap();

    match chain.invoke("Broken").await {
        Err(QaError::Graph(GraphError::Query { code, message })) => {
            assert_eq!(code, "Neo.ClientError.Statement.SyntaxError");
            assert_eq!(message, "Invalid input 'RETURN'");
        }
        other => panic!("expected graph error, got {:?}", other),
    }
    assert!(answer_model.prompts().is_empty());
}

#[tokio::test]
async fn test_chain_refuses_without_opt_in() {
    let result = GraphQaChain::from_llm(
        Arc::new(StubModel::new("")),
        Arc::new(StubModel::new("")),
        Arc::new(StubGraph::returning(vec![])),
        GraphSchema::default(),
        QaConfig::default(),
    );
    assert!(matches!(result, Err(QaError::Config(_))));
}

#[tokio::test]
async fn test_read_only_guard_blocks_writes() {
    let graph = Arc::new(StubGraph::returning(vec![]));
    let chain = GraphQaChain::from_llm(
        Arc::new(StubModel::new("MATCH (m:Movie {title: 'Heat'}) SET m.rating = 10")),
        Arc::new(StubModel::new("")),
        graph.clone(),
        GraphSchema::default(),
        options(),
    )
    .unwrap();

    let result = chain.invoke("Rate Heat ten").await;
    assert!(matches!(result, Err(QaError::Guard(GuardError::WriteOperation(ref k))) if k == "SET"));
    assert!(graph.statements().is_empty());
}

#[tokio::test]
async fn test_exclude_types_narrow_schema_and_statements() {
    let cypher_model = Arc::new(StubModel::new("MATCH (u:User)-[:RATED]->(m:Movie) RETURN count(u)"));
    let graph = Arc::new(StubGraph::returning(vec![]));
    let scoped = QaConfig {
        exclude_types: vec!["User".to_string(), "RATED".to_string()],
        ..options()
    };

    let chain = GraphQaChain::from_llm(
        cypher_model.clone(),
        Arc::new(StubModel::new("")),
        graph.clone(),
        movie_schema(),
        scoped,
    )
    .unwrap();

    let description = chain.schema_description();
    assert!(description.contains("Movie"));
    assert!(!description.contains("User"));
    assert!(!description.contains("RATED"));

    let result = chain.invoke("How many users rated movies?").await;
    assert!(matches!(result, Err(QaError::Guard(GuardError::OutOfScope(ref t))) if t == "User"));
    assert!(graph.statements().is_empty());
}

#[tokio::test]
async fn test_retrieve_then_generate() {
    let titles = vec![
        record(json!({"title": "Big"})),
        record(json!({"title": "Forrest Gump"})),
        record(json!({"title": "Cast Away"})),
    ];
    let model = Arc::new(StubModel::new("Tom Hanks acted in Big, Forrest Gump and Cast Away."));

    let chain = GraphQaChain::from_llm(
        Arc::new(StubModel::new(
            "MATCH (:Person {name: \"Tom Hanks\"})-[:ACTED_IN]->(m:Movie) RETURN m.title AS title",
        )),
        Arc::new(StubModel::new("unused")),
        Arc::new(StubGraph::returning(titles.clone())),
        GraphSchema::default(),
        options(),
    )
    .unwrap();
    let pipeline = RetrievalPipeline::new(chain, model.clone()).unwrap();

    let state = pipeline.invoke("What movies has Tom Hanks acted in?").await.unwrap();
    assert_eq!(state.question, "What movies has Tom Hanks acted in?");
    assert_eq!(state.context, titles);
    assert!(state.answer.contains("Forrest Gump"));

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("{\"title\":\"Forrest Gump\"}"));
}
