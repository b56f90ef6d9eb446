use clap::{Parser, Subcommand};
use member_qa_embed::{EmbedConfig, FastEmbedProvider, config::DEFAULT_MODEL_NAME};
use member_qa_retriever::{
    MessageIndex, RetrievalConfig, Retriever,
    ingest::{
        DEFAULT_FETCH_LIMIT, DEFAULT_FETCH_TIMEOUT, DEFAULT_SOURCE_URL, FileMessageSource,
        HttpMessageSource, MessageSource, refresh_index,
    },
    retrieval::retriever::{DEFAULT_THRESHOLD, DEFAULT_TOP_K},
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Build a member message index and query it from the command line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Messages endpoint to fetch from
    #[arg(long, default_value = DEFAULT_SOURCE_URL, global = true)]
    source: String,

    /// Read messages from a saved JSON document instead of the endpoint
    #[arg(long, global = true, conflicts_with = "source")]
    file: Option<PathBuf>,

    /// Maximum number of records to fetch
    #[arg(long, default_value_t = DEFAULT_FETCH_LIMIT, global = true)]
    limit: usize,

    /// Embedding model name
    #[arg(long, default_value = DEFAULT_MODEL_NAME, global = true)]
    model: String,

    /// Directory for downloaded model files
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index and print its status
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Retrieve the messages most relevant to a question
    Search {
        /// Natural-language question
        question: String,
        /// Maximum number of results
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Minimum similarity, exclusive
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct SearchHit {
    speaker: String,
    text: String,
    similarity: f32,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut embed_config = EmbedConfig::new(&args.model);
    if let Some(cache_dir) = &args.cache_dir {
        embed_config = embed_config.with_cache_dir(cache_dir);
    }
    let provider = FastEmbedProvider::create(embed_config).await?;
    let index = Arc::new(MessageIndex::new(Arc::new(provider)));

    let source: Box<dyn MessageSource> = match &args.file {
        Some(path) => Box::new(FileMessageSource::new(path)),
        None => Box::new(HttpMessageSource::new(&args.source, DEFAULT_FETCH_TIMEOUT)?),
    };
    let outcome = refresh_index(source.as_ref(), &index, args.limit).await?;

    match args.command {
        Commands::Stats { format } => {
            let status = index.status().await;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                }
                OutputFormat::Summary => println!("{}", status.summary()),
                OutputFormat::Full => {
                    println!("Index Status:");
                    println!("  State: {}", status.state);
                    println!("  Indexed messages: {}", status.indexed_messages);
                    println!("  Skipped records: {}", outcome.skipped);
                    println!("  Provider: {}", status.provider);
                    println!("  Embedding dimension: {}", status.embedding_dimension);
                    println!("  Rebuilds: {}", status.rebuilds);
                    if let Some(built_at) = status.last_built_at {
                        println!("  Last built: {}", built_at.to_rfc3339());
                    }
                }
            }
            Ok(())
        }
        Commands::Search {
            question,
            top_k,
            threshold,
            format,
        } => {
            let retriever = Retriever::new(index, RetrievalConfig { top_k, threshold });
            let result = retriever
                .retrieve_scored(&question, top_k, threshold)
                .await?;

            match format {
                OutputFormat::Json => {
                    let hits: Vec<SearchHit> = result
                        .iter()
                        .map(|hit| SearchHit {
                            speaker: hit.message.speaker.clone(),
                            text: hit.message.text.clone(),
                            similarity: hit.score,
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&hits)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} relevant messages:", result.len());
                    for hit in result.iter() {
                        println!("  Similarity: {:.3} | {}", hit.score, hit.message);
                    }
                }
                OutputFormat::Full => {
                    println!("{}", result.render());
                }
            }
            Ok(())
        }
    }
}
