mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sibyl_llm::{ChatOptions, openai::OpenAiProvider};
use sibyl_pipeline::document::{SplitterConfig, TextSplitter};
use sibyl_pipeline::runner::{RetryPolicy, SqliteStepLog, StepLog, StepRunner};
use sibyl_pipeline::{IngestRequest, IngestionPipeline, QueryPipeline, QueryRequest};
use sibyl_store::{QdrantStore, VectorStore};

use config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "sibyl",
    version,
    about = "Ingest documents and ask questions grounded in them"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "sibyl.toml", env = "SIBYL_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chunk, embed, and index a document.
    Ingest {
        /// Document to ingest.
        path: PathBuf,

        /// Stable identity for the document; defaults to the file name.
        #[arg(long)]
        source_id: Option<String>,

        /// Run identifier. Reusing an id resumes that run instead of
        /// starting over.
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Answer a question from the indexed documents.
    Query {
        question: String,

        /// Number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<u64>,

        #[arg(long)]
        run_id: Option<String>,
    },
    /// Write a default configuration file.
    Init,
}

const DEFAULT_CONFIG: &str = include_str!("../sibyl.toml");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if matches!(cli.command, Command::Init) {
        return init_config(&cli.config);
    }
    let config = Config::load(&cli.config)?;
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    let provider = Arc::new(create_provider(&config)?);
    let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(
        &config.store.qdrant_url,
        &config.store.collection,
        config.llm.dimensions,
    )?);
    let log: Arc<dyn StepLog> = Arc::new(SqliteStepLog::new(&config.runner.sqlite_path).await?);
    let retry = RetryPolicy {
        max_retries: config.runner.max_retries,
        base_delay: Duration::from_secs(config.runner.base_delay_secs),
    };

    match cli.command {
        Command::Ingest {
            path,
            source_id,
            run_id,
        } => {
            let splitter = TextSplitter::new(SplitterConfig {
                chunk_size: config.chunking.chunk_size,
                chunk_overlap: config.chunking.chunk_overlap,
            })?;
            let pipeline = IngestionPipeline::new(splitter, provider, store);

            let mut request = IngestRequest::new(path);
            if let Some(id) = source_id {
                request = request.with_source_id(id);
            }

            let runner =
                StepRunner::new(log, resolve_run_id(run_id, "ingest")).with_retry_policy(retry);
            let result = pipeline.run(&runner, &request).await?;
            println!(
                "ingested {} chunk(s) from {} (run {})",
                result.ingested,
                request.resolve_source_id()?,
                runner.run_id()
            );
        }
        Command::Query {
            question,
            top_k,
            run_id,
        } => {
            let pipeline = QueryPipeline::new(provider, store).with_chat_options(ChatOptions {
                temperature: config.query.temperature,
                max_tokens: config.query.max_tokens,
            });

            let request =
                QueryRequest::new(question).with_top_k(top_k.unwrap_or(config.query.top_k));

            let runner = query_runner(log, resolve_run_id(run_id, "query"));
            let answer = pipeline.run(&runner, &request).await?;

            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!();
                println!(
                    "({} context(s) from: {})",
                    answer.num_contexts,
                    answer.sources.join(", ")
                );
            }
        }
        // Handled before provider wiring.
        Command::Init => {}
    }

    Ok(())
}

fn init_config(path: &std::path::Path) -> anyhow::Result<()> {
    anyhow::ensure!(!path.exists(), "{} already exists", path.display());
    std::fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

/// Query failures surface directly to the caller, who may simply re-issue
/// the question; only ingestion retries transient errors in place.
fn query_runner(log: Arc<dyn StepLog>, run_id: String) -> StepRunner {
    StepRunner::new(log, run_id).with_retry_policy(RetryPolicy::none())
}

fn create_provider(config: &Config) -> anyhow::Result<OpenAiProvider> {
    let api_key = config
        .secrets
        .openai_api_key
        .as_ref()
        .context("SIBYL_OPENAI_API_KEY not set")?
        .expose()
        .to_owned();
    Ok(OpenAiProvider::new(
        api_key,
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.embedding_model.clone(),
    ))
}

fn resolve_run_id(explicit: Option<String>, kind: &str) -> String {
    explicit.unwrap_or_else(|| format!("{kind}-{}", uuid::Uuid::new_v4()))
}
