mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::SearchMemConfig;
use futures_util::StreamExt;
use searchmem_azure::{
    normalize_index_name, AzureSchemaCompiler, AzureSearchMemory, IndexSchemaCompiler,
};
use searchmem_core::{EmbeddingGenerator, MemoryDb, MemoryDbSchema, MemoryFilter, MemoryRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "searchmem", about = "SearchMem — vector memory on Azure AI Search")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "searchmem.toml")]
    config: PathBuf,

    /// Log as JSON lines (overrides config)
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List index names
    Indexes,
    /// Create an index for memory records
    CreateIndex {
        index: String,
        /// Vector size (defaults to the embedding dimension)
        #[arg(long)]
        vector_size: Option<usize>,
        /// Create from a custom TOML schema instead
        #[arg(long, conflicts_with = "vector_size")]
        schema: Option<PathBuf>,
    },
    /// Delete an index and its records
    DeleteIndex { index: String },
    /// Embed a text and store it as a record
    Upsert {
        index: String,
        id: String,
        text: String,
        /// Tag as key=value, repeatable
        #[arg(long = "tag", value_parser = parse_pair)]
        tags: Vec<(String, String)>,
    },
    /// Find the records most similar to a query
    Search {
        index: String,
        query: String,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
        #[arg(long, default_value_t = 0.0)]
        min_relevance: f64,
        /// Required tag as key=value, repeatable
        #[arg(long = "tag", value_parser = parse_pair)]
        tags: Vec<(String, String)>,
        #[arg(long)]
        with_embeddings: bool,
    },
    /// List records, optionally filtered by tag
    List {
        index: String,
        /// 0 lists everything
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(long = "tag", value_parser = parse_pair)]
        tags: Vec<(String, String)>,
        #[arg(long)]
        with_embeddings: bool,
    },
    /// Delete one record
    Delete { index: String, id: String },
    /// Print the engine index definition compiled from a TOML schema
    Schema { index: String, file: PathBuf },
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

fn tag_filters(tags: Vec<(String, String)>) -> Vec<MemoryFilter> {
    if tags.is_empty() {
        return Vec::new();
    }
    let filter = tags
        .into_iter()
        .fold(MemoryFilter::new(), |f, (key, value)| f.by_tag(key, value));
    vec![filter]
}

async fn read_schema(path: &Path) -> anyhow::Result<MemoryDbSchema> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read schema file '{}'", path.display()))?;
    Ok(toml::from_str(&raw)?)
}

/// Embeds `text` unless `token` fires first.
async fn embed_text(
    embedder: &dyn EmbeddingGenerator,
    text: &str,
    token: &CancellationToken,
) -> anyhow::Result<Vec<f32>> {
    tokio::select! {
        biased;
        () = token.cancelled() => anyhow::bail!("Embedding cancelled"),
        vector = embedder.generate(text) => Ok(vector?),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_record(record: &MemoryRecord, score: Option<f64>) {
    match score {
        Some(score) => println!("{score:.4}  {}", record.id),
        None => println!("{}", record.id),
    }
    for (key, value) in record.tags.pairs() {
        println!("    {key}={value}");
    }
    if let Some(text) = record.payload.get("text") {
        println!("    {text}");
    }
    if !record.vector.is_empty() {
        println!("    vector[{}]", record.vector.len());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Compiling a schema needs no service.
    if let Commands::Schema { index, file } = &cli.command {
        let schema = read_schema(file).await?;
        let definition = AzureSchemaCompiler.compile(&normalize_index_name(index)?, &schema)?;
        println!("{}", serde_json::to_string_pretty(&definition)?);
        return Ok(());
    }

    let config = SearchMemConfig::load(&cli.config).await?;
    init_tracing(cli.json_logs || config.logging.json);

    let embedder = config.embedding.build()?;
    let dimension = embedder.dimension();
    let memory = AzureSearchMemory::new(&config.search, Some(Arc::clone(&embedder)))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });
    let token = cancel.clone();
    let cancel = Some(cancel);

    match cli.command {
        Commands::Indexes => {
            let names = memory.get_indexes(cancel).await?;
            if names.is_empty() {
                println!("No indexes.");
            }
            for name in names {
                println!("{name}");
            }
        }
        Commands::CreateIndex {
            index,
            vector_size,
            schema,
        } => {
            match schema {
                Some(path) => {
                    let schema = read_schema(&path).await?;
                    memory.create_index_with_schema(&index, &schema, cancel).await?;
                }
                None => {
                    let size = vector_size.unwrap_or(dimension);
                    memory.create_index(&index, size, cancel).await?;
                }
            }
            info!(index = %index, "Index ready");
        }
        Commands::DeleteIndex { index } => {
            memory.delete_index(&index, cancel).await?;
        }
        Commands::Upsert {
            index,
            id,
            text,
            tags,
        } => {
            let vector = embed_text(embedder.as_ref(), &text, &token).await?;
            let record = tags
                .into_iter()
                .fold(MemoryRecord::new(id, vector), |r, (key, value)| {
                    r.with_tag(key, value)
                })
                .with_payload("text", text);
            let id = memory.upsert(&index, record, cancel).await?;
            println!("{id}");
        }
        Commands::Search {
            index,
            query,
            limit,
            min_relevance,
            tags,
            with_embeddings,
        } => {
            let filters = tag_filters(tags);
            let mut results = memory.get_similar_list(
                &index,
                &query,
                &filters,
                min_relevance,
                limit,
                with_embeddings,
                cancel,
            );
            let mut count = 0usize;
            while let Some(item) = results.next().await {
                let (record, score) = item?;
                print_record(&record, Some(score));
                count += 1;
            }
            println!("\nTotal: {count} result(s)");
        }
        Commands::List {
            index,
            limit,
            tags,
            with_embeddings,
        } => {
            let filters = tag_filters(tags);
            let mut records = memory.get_list(&index, &filters, limit, with_embeddings, cancel);
            let mut count = 0usize;
            while let Some(record) = records.next().await {
                print_record(&record?, None);
                count += 1;
            }
            println!("\nTotal: {count} record(s)");
        }
        Commands::Delete { index, id } => {
            memory
                .delete(&index, &MemoryRecord::new(id, Vec::new()), cancel)
                .await?;
        }
        Commands::Schema { .. } => {}
    }

    Ok(())
}
