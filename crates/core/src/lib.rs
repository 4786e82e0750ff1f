pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod openai;
pub mod orchestrator;
pub mod retry;
pub mod store;

pub use chunking::{
    build_chunks, split_text, ChunkSpan, ChunkSpans, ChunkingConfig, DEFAULT_CHUNK_OVERLAP,
    DEFAULT_CHUNK_SIZE,
};
pub use config::{ApiKey, EmbeddingSettings, FailurePolicy, PipelineConfig};
pub use embeddings::{
    plan_batches, BatchEmbedder, BatchLimits, CharacterNgramEmbedder, EmbeddingProvider,
    DEFAULT_NGRAM_DIMENSIONS,
};
pub use error::{
    ConfigError, Corruption, EmbeddingError, ExtractionError, PipelineError, StoreCorruptError,
    StoreError,
};
pub use extractor::{extract_document_text, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{describe_document, digest_file, discover_pdf_files};
pub use models::{
    ChunkMetadata, ProcessedDocument, RunReport, RunWarning, SkippedDocument, SourceDocument,
    TextChunk, VectorRecord, VectorStoreSnapshot,
};
pub use openai::OpenAiEmbeddingClient;
pub use orchestrator::IngestionPipeline;
pub use retry::{with_retry, RetryPolicy, Retryable};
pub use store::{validate_snapshot, VectorStore};
