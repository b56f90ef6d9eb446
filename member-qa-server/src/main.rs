use anyhow::Result;
use clap::Parser;
use member_qa_server::{ServerConfig, run_server};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Answer questions about member messages over HTTP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8000
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// Member messages endpoint
    #[arg(long, value_name = "URL")]
    source_url: Option<String>,

    /// Generation API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.source_url {
        config.source.url = url;
    }
    if args.api_key.is_some() {
        config.generation.api_key = args.api_key;
    }

    run_server(config).await
}
