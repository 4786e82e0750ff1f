use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_embed_core::{
    ApiKey, CharacterNgramEmbedder, ChunkingConfig, EmbeddingProvider, EmbeddingSettings,
    FailurePolicy, IngestionPipeline, LopdfExtractor, OpenAiEmbeddingClient, PipelineConfig,
    RetryPolicy, RunReport, VectorStore,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-embed", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    /// OpenAI-compatible /embeddings endpoint.
    Openai,
    /// Local character n-gram hashing, no network.
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and embed every PDF in a folder and replace the vector store.
    Ingest {
        /// Folder that directly contains the PDFs.
        #[arg(long, default_value = pdf_embed_core::config::DEFAULT_INPUT_DIR)]
        input_dir: PathBuf,
        /// Vector store file to replace.
        #[arg(long, default_value = pdf_embed_core::config::DEFAULT_OUTPUT_PATH)]
        output: PathBuf,
        /// Chunk size in characters.
        #[arg(long, default_value_t = pdf_embed_core::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Characters shared by consecutive chunks.
        #[arg(long, default_value_t = pdf_embed_core::DEFAULT_CHUNK_OVERLAP)]
        overlap: usize,
        #[arg(long, value_enum, default_value = "openai")]
        provider: Provider,
        /// Embedding model identifier.
        #[arg(long, default_value = pdf_embed_core::config::DEFAULT_EMBEDDING_MODEL)]
        model: String,
        /// Base URL of the embedding API.
        #[arg(
            long,
            env = "OPENAI_BASE_URL",
            default_value = pdf_embed_core::config::DEFAULT_EMBEDDING_BASE_URL
        )]
        base_url: String,
        /// API credential for the embedding service.
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Maximum chunks per embedding request.
        #[arg(long, default_value_t = pdf_embed_core::config::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        /// Maximum characters per embedding request.
        #[arg(long, default_value_t = pdf_embed_core::config::DEFAULT_MAX_BATCH_CHARS)]
        max_batch_chars: usize,
        /// Per-request timeout in seconds.
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
        /// Attempts per batch, including the first.
        #[arg(long, default_value = "4")]
        max_attempts: u32,
        /// Abort on the first failing document instead of skipping it.
        #[arg(long, default_value_t = false)]
        fail_fast: bool,
    },
    /// Load a vector store and print what it contains.
    Inspect {
        #[arg(long, default_value = pdf_embed_core::config::DEFAULT_OUTPUT_PATH)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-embed boot"
    );

    match cli.command {
        Command::Ingest {
            input_dir,
            output,
            chunk_size,
            overlap,
            provider,
            model,
            base_url,
            api_key,
            batch_size,
            max_batch_chars,
            timeout_secs,
            max_attempts,
            fail_fast,
        } => {
            let config = PipelineConfig {
                input_dir,
                output_path: output,
                chunking: ChunkingConfig::new(chunk_size, overlap),
                embedding: EmbeddingSettings {
                    model,
                    base_url,
                    batch_size,
                    max_batch_chars,
                    request_timeout: Duration::from_secs(timeout_secs),
                    retry: RetryPolicy::new(max_attempts),
                },
                failure_policy: if fail_fast {
                    FailurePolicy::FailFast
                } else {
                    FailurePolicy::SkipDocument
                },
            };

            let provider: Box<dyn EmbeddingProvider> = match provider {
                Provider::Openai => {
                    let api_key = ApiKey::new(api_key.unwrap_or_default())?;
                    Box::new(OpenAiEmbeddingClient::new(&config.embedding, api_key)?)
                }
                Provider::Ngram => Box::new(CharacterNgramEmbedder::default()),
            };

            let pipeline = IngestionPipeline::new(config, LopdfExtractor, provider);
            let report = tokio::select! {
                result = pipeline.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    anyhow::bail!("interrupted; vector store left untouched");
                }
            };

            print_summary(&report);
        }
        Command::Inspect { output } => {
            let snapshot = VectorStore::new(&output).load()?;

            println!("store: {}", output.display());
            println!(
                "model={} dimensions={} records={} generated_at={}",
                snapshot.model,
                snapshot.dimensions,
                snapshot.records.len(),
                snapshot.generated_at.to_rfc3339()
            );
            for (source, count) in snapshot.counts_by_source() {
                println!("  {source}: {count} chunk(s)");
            }
        }
    }

    Ok(())
}

fn print_summary(report: &RunReport) {
    for warning in &report.warnings {
        warn!(%warning, "ingestion warning");
        println!("warning: {warning}");
    }

    for skipped in &report.skipped {
        println!("skipped: {} ({})", skipped.path.display(), skipped.reason);
    }

    println!(
        "documents: {} discovered, {} processed, {} skipped",
        report.discovered,
        report.processed.len(),
        report.skipped.len()
    );
    println!("chunks embedded: {}", report.chunks_embedded);
    if report.store_written {
        println!("vector store replaced: {}", report.output_path.display());
    } else {
        println!("vector store unchanged: {}", report.output_path.display());
    }
}
