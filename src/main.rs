//! # Wikidex CLI (`wikidex`)
//!
//! The `wikidex` binary drives the ingestion pipeline, an interactive chat
//! session, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! wikidex --config ./config/wikidex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wikidex sync` | Ingest new and changed pages from the wiki |
//! | `wikidex chat` | Interactive Q&A over the indexed corpus |
//! | `wikidex serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest the configured default space
//! wikidex sync --config ./config/wikidex.toml
//!
//! # Ingest a specific space
//! wikidex sync --space OPS --config ./config/wikidex.toml
//!
//! # Re-sync and then chat
//! wikidex chat --sync --config ./config/wikidex.toml
//!
//! # Start the HTTP server
//! wikidex serve --config ./config/wikidex.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use wikidex::answer::ChatPipeline;
use wikidex::config::{load_config, Config};
use wikidex::fetch::{PageSource, WikiClient};
use wikidex::ingest::run_ingest;
use wikidex::llm::OpenAiChat;
use wikidex::retrieve::HybridRetriever;
use wikidex::server::run_server;
use wikidex::store::{SimilarityStore, SqliteStore};

/// Wikidex CLI — incremental wiki ingestion and hybrid retrieval for
/// knowledge-base Q&A.
#[derive(Parser)]
#[command(
    name = "wikidex",
    about = "Wikidex — incremental wiki ingestion and hybrid retrieval for knowledge-base Q&A",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wikidex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest new and changed pages from the wiki.
    ///
    /// Fetches every page in the space, fingerprints the cleaned content,
    /// and embeds only pages that are new or changed since the last run.
    Sync {
        /// Space to ingest; the configured default when omitted.
        #[arg(long)]
        space: Option<String>,
    },

    /// Interactive Q&A over the indexed corpus.
    Chat {
        /// Run an ingestion pass before the first question.
        #[arg(long)]
        sync: bool,
    },

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// query, ingest, and document endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Sync { space } => {
            let space = space.unwrap_or_else(|| config.wiki.space_key.clone());
            let (source, store) = build_backends(&config).await?;
            let outcome = run_ingest(&config, &space, source.as_ref(), store).await?;
            println!(
                "Sync complete for space '{}': {} page(s) embedded or updated.",
                space, outcome.updated
            );
        }
        Commands::Chat { sync } => {
            let (source, store) = build_backends(&config).await?;
            if sync {
                let space = config.wiki.space_key.clone();
                let outcome =
                    run_ingest(&config, &space, source.as_ref(), store.clone()).await?;
                println!("Synced: {} page(s) embedded or updated.", outcome.updated);
            }
            let pipeline = build_pipeline(&config, store)?;
            run_chat(&pipeline).await?;
        }
        Commands::Serve => {
            let (source, store) = build_backends(&config).await?;
            let pipeline = Arc::new(build_pipeline(&config, store.clone())?);
            run_server(&config, source, store, pipeline).await?;
        }
    }

    Ok(())
}

async fn build_backends(
    config: &Config,
) -> Result<(Arc<dyn PageSource>, Arc<dyn SimilarityStore>)> {
    let source: Arc<dyn PageSource> = Arc::new(WikiClient::new(&config.wiki)?);
    let store: Arc<dyn SimilarityStore> =
        Arc::new(SqliteStore::connect(&config.store, config.embedding.clone()).await?);
    Ok((source, store))
}

fn build_pipeline(config: &Config, store: Arc<dyn SimilarityStore>) -> Result<ChatPipeline> {
    let retriever = HybridRetriever::new(store, config.retrieval.top_k);
    let synthesizer = Arc::new(OpenAiChat::new(config.llm.clone())?);
    Ok(ChatPipeline::new(retriever, synthesizer))
}

/// Read questions from stdin until `exit` or end of input.
async fn run_chat(pipeline: &ChatPipeline) -> Result<()> {
    println!("Ask a question about the knowledge base. Type 'exit' to quit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        let answer = pipeline.answer(question).await;
        println!("{}\n", answer);
    }

    Ok(())
}
