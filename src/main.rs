use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use graph_rag::config::{default_data_dir, AppConfig, BuildOptions, StoreFormat};
use graph_rag::graph::{CentralityMetric, GraphBuilder, KnowledgeGraph};
use graph_rag::storage::{open_store, GraphStore, JsonGraphStore};
use graph_rag::types::{CorpusDocument, RelationKind};

#[derive(Parser)]
#[command(name = "graph-rag")]
#[command(about = "Knowledge graph construction and graph-enhanced retrieval")]
struct Cli {
    #[arg(long, env, default_value_os_t = default_data_dir())]
    data_dir: PathBuf,

    /// Snapshot format: redb or json
    #[arg(long, env = "GRAPH_STORE", default_value = "redb")]
    store: String,

    /// JSON concept table ({"concept-id": ["trigger", ...]})
    #[arg(long, env = "CONCEPTS_FILE")]
    concepts: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and save the graph from a JSONL corpus, one {"id", "text"} per line
    Build {
        #[arg(long)]
        corpus: PathBuf,

        #[arg(long)]
        no_cooccurrence: bool,

        #[arg(long)]
        no_hierarchy: bool,

        #[arg(long, env, default_value = "256")]
        batch_size: usize,
    },
    /// Print the statistics report
    Stats,
    /// Entities reachable from ENTITY
    Neighbors {
        entity: String,

        #[arg(long, default_value = "1")]
        depth: usize,

        #[arg(long)]
        kind: Option<String>,
    },
    /// Shortest path between two entities
    Path {
        source: String,
        target: String,

        #[arg(long)]
        kind: Option<String>,
    },
    /// Centrality leaderboard (betweenness and closeness are O(V*E))
    Central {
        #[arg(long, default_value = "pagerank")]
        metric: String,

        #[arg(long, default_value = "20")]
        top_k: usize,
    },
    /// Copy the saved graph into a directory of JSON tables
    ExportJson {
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig {
        data_dir: cli.data_dir,
        log_level: cli.log_level,
        store_format: cli.store.parse::<StoreFormat>()?,
        concepts_path: cli.concepts,
        ..AppConfig::default()
    };
    let store = open_store(config.store_format, &config.graph_dir());

    match cli.command {
        Command::Build {
            corpus,
            no_cooccurrence,
            no_hierarchy,
            batch_size,
        } => {
            let options = BuildOptions {
                enable_cooccurrence: !no_cooccurrence,
                enable_hierarchy: !no_hierarchy,
                batch_size,
            };
            let mut builder = GraphBuilder::with_concepts(options, config.load_concepts()?);
            let malformed = ingest_jsonl(&corpus, &mut builder)?;
            let (graph, report) = builder.finish()?;
            let meta = store.save(&graph).await?;

            print_json(&serde_json::json!({
                "report": report,
                "malformed_lines": malformed,
                "snapshot": meta,
            }))?;
        }
        Command::Stats => {
            let graph = store.load().await?;
            print_json(&graph.statistics())?;
        }
        Command::Neighbors {
            entity,
            depth,
            kind,
        } => {
            let graph = store.load().await?;
            let kind = parse_kind(kind)?;
            print_json(&graph.neighbors(&entity, kind, depth)?)?;
        }
        Command::Path {
            source,
            target,
            kind,
        } => {
            let graph = store.load().await?;
            let kind = parse_kind(kind)?;
            match graph.shortest_path(&source, &target, kind) {
                Some(path) => print_json(&path)?,
                None => {
                    tracing::info!(%source, %target, "No path");
                    print_json(&serde_json::Value::Null)?;
                }
            }
        }
        Command::Central { metric, top_k } => {
            let graph = store.load().await?;
            let metric: CentralityMetric = metric.parse()?;
            print_json(&graph.central_entities(metric, top_k))?;
        }
        Command::ExportJson { out } => {
            let graph: KnowledgeGraph = store.load().await?;
            let meta = JsonGraphStore::new(&out).save(&graph).await?;
            print_json(&meta)?;
        }
    }

    Ok(())
}

/// Stream the corpus into the builder in `batch_size` chunks. Returns the
/// number of lines that were not a `{"id", "text"}` object.
fn ingest_jsonl(path: &Path, builder: &mut GraphBuilder) -> anyhow::Result<usize> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let batch_size = builder.options().batch_size.max(1);

    let mut batch: Vec<CorpusDocument> = Vec::with_capacity(batch_size);
    let mut malformed = 0;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CorpusDocument>(&line) {
            Ok(doc) => batch.push(doc),
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "Skipping malformed corpus line");
                malformed += 1;
            }
        }
        if batch.len() >= batch_size {
            builder.ingest_batch(&batch);
            batch.clear();
        }
    }
    if !batch.is_empty() {
        builder.ingest_batch(&batch);
    }
    Ok(malformed)
}

fn parse_kind(kind: Option<String>) -> anyhow::Result<Option<RelationKind>> {
    Ok(kind.map(|k| k.parse::<RelationKind>()).transpose()?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
