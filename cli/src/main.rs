//! cinegraph CLI: ask questions of a Neo4j movie graph
//!
//! Every subcommand is one linear pass: load configuration, build the
//! collaborators it needs, run, print.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};

use cinegraph::graph::schema::DEFAULT_RELATIONSHIP_SAMPLE;
use cinegraph::{
    AppConfig, ChatClient, Document, EmbeddingClient, GraphClient, GraphQaChain, GraphSchema, GraphVectorStore,
    InMemoryVectorStore, Neo4jHttpClient, Record, RetrievalPipeline, RetrievalState, VectorStore,
};

const DEFAULT_QUERY: &str = "MATCH (m:Movie {title: 'Mission: Impossible'})<-[r:ACTED_IN]-(p:Person)
RETURN p.name AS actor, r.role AS role";

#[derive(Parser)]
#[command(name = "cinegraph", version, about = "Question answering over a Neo4j movie graph")]
struct Cli {
    /// YAML configuration file (overrides CINEGRAPH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Debug logging, including generated statements and full context
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Execute model-generated Cypher (`ask`, `retrieve`); use a database
    /// user restricted to what the model may read
    #[arg(long, global = true, env = "CINEGRAPH_ALLOW_DANGEROUS_REQUESTS")]
    allow_dangerous_requests: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a Cypher statement as written
    Query {
        #[arg(default_value = DEFAULT_QUERY)]
        cypher: String,
    },
    /// Answer a question: generate Cypher, run it, synthesize an answer
    Ask {
        #[arg(default_value = "How many movies are in the Sci-Fi genre?")]
        question: String,
    },
    /// Retrieve records for a question, then answer from them
    Retrieve {
        #[arg(default_value = "What movies has Tom Hanks acted in?")]
        question: String,
    },
    /// Find movies whose plots are most similar to some text
    Similar {
        #[arg(default_value = "Toys come alive")]
        text: String,

        /// Number of results
        #[arg(short, default_value_t = 3)]
        k: usize,

        /// Search an in-process index loaded from the stored embeddings
        #[arg(long)]
        local: bool,
    },
    /// Print the schema description given to the model
    Schema,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.verbose {
        config.qa.verbose = true;
    }
    if cli.allow_dangerous_requests {
        config.qa.allow_dangerous_requests = true;
    }

    let graph: Arc<dyn GraphClient> = Arc::new(Neo4jHttpClient::new(&config.graph)?);
    debug!(uri = %config.graph.uri, database = %config.graph.database(), "Graph client ready");

    match cli.command {
        Commands::Query { cypher } => run_query(graph.as_ref(), &cypher, &cli.format).await,
        Commands::Ask { question } => run_ask(&config, graph, &question, &cli.format).await,
        Commands::Retrieve { question } => run_retrieve(&config, graph, &question, &cli.format).await,
        Commands::Similar { text, k, local } => run_similar(&config, graph, &text, k, local, &cli.format).await,
        Commands::Schema => run_schema(graph.as_ref()).await,
    }
}

async fn run_query(graph: &dyn GraphClient, cypher: &str, format: &OutputFormat) -> Result<()> {
    let records = graph.query(cypher).await?;
    print_records(&records, format)
}

async fn build_chain(config: &AppConfig, graph: Arc<dyn GraphClient>) -> Result<GraphQaChain> {
    let schema = GraphSchema::introspect(graph.as_ref(), DEFAULT_RELATIONSHIP_SAMPLE)
        .await
        .context("reading graph schema")?;
    let cypher_model = Arc::new(ChatClient::new(&config.cypher_model)?);
    let answer_model = Arc::new(ChatClient::new(&config.answer_model)?);

    Ok(GraphQaChain::from_llm(cypher_model, answer_model, graph, schema, config.qa.clone())?)
}

async fn run_ask(config: &AppConfig, graph: Arc<dyn GraphClient>, question: &str, format: &OutputFormat) -> Result<()> {
    let chain = build_chain(config, graph).await?;
    let output = chain.invoke(question).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Table => match &output.answer {
            Some(answer) => println!("{}", answer),
            None => print_records(&output.context, format)?,
        },
    }
    Ok(())
}

async fn run_retrieve(
    config: &AppConfig,
    graph: Arc<dyn GraphClient>,
    question: &str,
    format: &OutputFormat,
) -> Result<()> {
    let chain = build_chain(config, graph).await?;
    let model = Arc::new(ChatClient::new(&config.answer_model)?);
    let pipeline = RetrievalPipeline::new(chain, model)?;
    let state = pipeline.invoke(question).await?;

    println!("{}", render_retrieval(&state, format)?);
    Ok(())
}

fn render_retrieval(state: &RetrievalState, format: &OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(state)?,
        OutputFormat::Table => format!(
            "Answer: {}\nContext:\n{}",
            state.answer,
            render_records(&state.context, format)?
        ),
    })
}

async fn run_similar(
    config: &AppConfig,
    graph: Arc<dyn GraphClient>,
    text: &str,
    k: usize,
    local: bool,
    format: &OutputFormat,
) -> Result<()> {
    let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);

    let store: Box<dyn VectorStore> = if local {
        Box::new(InMemoryVectorStore::load_from_graph(graph.as_ref(), embedder, &config.vector).await?)
    } else {
        Box::new(GraphVectorStore::from_existing_index(graph, embedder, config.vector.clone()).await?)
    };

    let hits = store.similarity_search_with_score(text, k).await?;
    print_documents(&hits, format)
}

async fn run_schema(graph: &dyn GraphClient) -> Result<()> {
    let schema = GraphSchema::introspect(graph, DEFAULT_RELATIONSHIP_SAMPLE).await?;
    println!("{}", schema.describe());
    Ok(())
}

fn print_records(records: &[Record], format: &OutputFormat) -> Result<()> {
    println!("{}", render_records(records, format)?);
    Ok(())
}

fn render_records(records: &[Record], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Table => {
            let mut columns: Vec<&String> = Vec::new();
            for key in records.iter().flat_map(|r| r.keys()) {
                if !columns.contains(&key) {
                    columns.push(key);
                }
            }
            if columns.is_empty() {
                return Ok("(no results)".to_string());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(&columns);

            for record in records {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|c| record.get(c.as_str()).map(format_table_value).unwrap_or_default())
                    .collect();
                table.add_row(cells);
            }

            Ok(format!("{}\n{} row(s)", table, records.len()))
        }
    }
}

fn print_documents(hits: &[(Document, f32)], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let docs: Vec<Value> = hits
                .iter()
                .map(|(doc, score)| {
                    serde_json::json!({
                        "page_content": doc.page_content,
                        "metadata": doc.metadata,
                        "score": score,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
        OutputFormat::Table => {
            if hits.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["title", "plot", "score"]);
            for (doc, score) in hits {
                table.add_row(vec![
                    doc.meta_str("title").unwrap_or("").to_string(),
                    doc.page_content.clone(),
                    format!("{:.4}", score),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}

fn format_table_value(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(v).unwrap_or_default(),
    }
}
