mod common;

use cinegraph::{Document, GraphVectorStore, InMemoryVectorStore, VectorIndexConfig, VectorStore};
use common::{record, StubEmbedder, StubGraph};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_toys_come_alive_returns_three_titles_in_order() {
    let rows = vec![
        record(json!({"text": "A cowboy doll...", "metadata": {"title": "Toy Story", "plot": null, "plotEmbedding": null}, "score": 0.94})),
        record(json!({"text": "Woody is stolen...", "metadata": {"title": "Toy Story 2", "plot": null, "plotEmbedding": null}, "score": 0.93})),
        record(json!({"text": "Action figures...", "metadata": {"title": "Small Soldiers", "plot": null, "plotEmbedding": null}, "score": 0.92})),
    ];
    let graph = Arc::new(StubGraph::returning(rows));
    let store = GraphVectorStore::new(graph.clone(), Arc::new(StubEmbedder { dimensions: 8 }), VectorIndexConfig::default());

    let docs: Vec<Document> = store.similarity_search("Toys come alive", 3).await.unwrap();
    let titles: Vec<&str> = docs.iter().filter_map(|d| d.meta_str("title")).collect();
    assert_eq!(titles, vec!["Toy Story", "Toy Story 2", "Small Soldiers"]);
    assert_eq!(docs[0].page_content, "A cowboy doll...");

    let statements = graph.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("CALL db.index.vector.queryNodes($index, $k, $embedding)"));
}

#[tokio::test]
async fn test_fewer_hits_than_k_returned_as_is() {
    let rows = vec![record(json!({
        "text": "A magical board game unleashes a jungle.",
        "metadata": {"title": "Jumanji", "plot": null, "plotEmbedding": null},
        "score": 0.9
    }))];
    let graph = Arc::new(StubGraph::returning(rows));
    let store = GraphVectorStore::new(graph, Arc::new(StubEmbedder { dimensions: 8 }), VectorIndexConfig::default());

    let results = store.similarity_search_with_score("board game", 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0.meta_str("title"), Some("Jumanji"));
    assert!((results[0].1 - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn test_local_store_toys_come_alive() {
    let rows = vec![
        record(json!({"text": "A cowboy doll...", "metadata": {"title": "Toy Story"}, "embedding": [1.0, 1.0, 1.0, 1.0]})),
        record(json!({"text": "Woody is stolen...", "metadata": {"title": "Toy Story 2"}, "embedding": [1.0, 1.0, 1.0, 0.8]})),
        record(json!({"text": "Action figures...", "metadata": {"title": "Small Soldiers"}, "embedding": [1.0, 1.0, 0.5, 0.5]})),
        record(json!({"text": "A shark attacks.", "metadata": {"title": "Jaws"}, "embedding": [-1.0, -1.0, 0.5, -1.0]})),
    ];
    let store = InMemoryVectorStore::load_from_graph(
        &StubGraph::returning(rows),
        Arc::new(StubEmbedder { dimensions: 4 }),
        &VectorIndexConfig::default(),
    )
    .await
    .unwrap();

    let docs = store.similarity_search("Toys come alive", 3).await.unwrap();
    let titles: Vec<&str> = docs.iter().filter_map(|d| d.meta_str("title")).collect();
    assert_eq!(titles, vec!["Toy Story", "Toy Story 2", "Small Soldiers"]);
}

#[tokio::test]
async fn test_zero_k_skips_the_index() {
    let graph = Arc::new(StubGraph::returning(vec![]));
    let store = GraphVectorStore::new(graph.clone(), Arc::new(StubEmbedder { dimensions: 8 }), VectorIndexConfig::default());

    assert!(store.similarity_search("anything", 0).await.unwrap().is_empty());
    assert!(graph.statements().is_empty());
}

#[tokio::test]
async fn test_local_store_from_graph_embeddings() {
    let rows = vec![
        record(json!({"text": "Toys come to life.", "metadata": {"title": "Toy Story"}, "embedding": [1.0, 1.0, 1.0, 1.0]})),
        record(json!({"text": "A shark attacks.", "metadata": {"title": "Jaws"}, "embedding": [-1.0, -1.0, 0.5, -1.0]})),
    ];
    let graph = StubGraph::returning(rows);

    let store = InMemoryVectorStore::load_from_graph(
        &graph,
        Arc::new(StubEmbedder { dimensions: 4 }),
        &VectorIndexConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(store.len(), 2);

    let hits = store.similarity_search_with_score("Toys come alive", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.meta_str("title"), Some("Toy Story"));
    assert!(hits[0].1 > 0.99);
}
