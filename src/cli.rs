use crate::config::{Config, api_key_from_env};
use crate::embeddings::OpenAiEmbedder;
use crate::indexer::SemanticIndexer;
use crate::models::Provider;
use crate::search;
use crate::store::VectorStore;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "session-search")]
#[command(about = "Semantic search over local assistant session transcripts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Embed new and changed sessions into the vector index
    Index,
    /// Rank indexed sessions against a free-text query
    Search {
        /// Search query
        query: String,
        /// Results limit (clamped to 1..=50)
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Show vector index statistics
    Status,
}

pub async fn run_cli() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Index => run_index(&config).await,
        Commands::Search { query, limit } => run_search(&config, &query, limit).await,
        Commands::Status => show_status(&config),
    }
}

async fn run_index(config: &Config) -> Result<()> {
    // Credential check comes before any file I/O so a misconfigured run
    // fails without partial side effects.
    let embedder = OpenAiEmbedder::new(
        api_key_from_env(),
        config.embedding.model.clone(),
        config.embed_timeout(),
    )?;

    let store = VectorStore::new(config.embeddings_file()?);
    let indexer = SemanticIndexer::new(
        &store,
        config.index_sources()?,
        config.normalize_limits(),
        config.embed_delay(),
        &embedder,
    );
    let stats = indexer.run().await?;

    println!(
        "Scanned {} sessions: {} embedded, {} unchanged, {} errors, {} records written.",
        stats.scanned, stats.embedded, stats.skipped, stats.errors, stats.wrote
    );
    Ok(())
}

async fn run_search(config: &Config, query: &str, limit: usize) -> Result<()> {
    let embedder = OpenAiEmbedder::new(
        api_key_from_env(),
        config.embedding.model.clone(),
        config.embed_timeout(),
    )?;

    let store = VectorStore::new(config.embeddings_file()?);
    let hits = search::semantic_search(&store, &embedder, query, Some(limit)).await?;

    if hits.is_empty() {
        println!("No results found. Run 'session-search index' first.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{}] {} (score: {:.3})",
            i + 1,
            hit.provider,
            hit.rel_path,
            hit.score
        );
        println!("   {}", hit.session_path);
    }
    Ok(())
}

fn show_status(config: &Config) -> Result<()> {
    let store = VectorStore::new(config.embeddings_file()?);
    let records = store.load()?;

    println!("Vector index: {}", store.path().display());
    println!("Total records: {}", records.len());

    for provider in Provider::ALL {
        let count = records.values().filter(|rec| rec.provider == provider).count();
        println!("  {provider}: {count}");
    }

    if records.is_empty() {
        println!("Index is empty. Run 'session-search index' to build it.");
    }
    Ok(())
}
