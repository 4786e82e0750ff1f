use crate::chunking::build_chunks;
use crate::config::{FailurePolicy, PipelineConfig};
use crate::embeddings::{BatchEmbedder, EmbeddingProvider};
use crate::error::{EmbeddingError, PipelineError};
use crate::extractor::PdfExtractor;
use crate::ingest::{describe_document, discover_pdf_files};
use crate::models::{
    ProcessedDocument, RunReport, RunWarning, SkippedDocument, VectorRecord, VectorStoreSnapshot,
};
use crate::store::VectorStore;
use std::path::Path;
use tracing::{info, warn};

/// Drives extraction, chunking, embedding and persistence for one input
/// directory. Documents are processed one at a time in file-name order and
/// the store is written once, at the end of the run.
pub struct IngestionPipeline<X, P> {
    config: PipelineConfig,
    extractor: X,
    embedder: BatchEmbedder<P>,
    store: VectorStore,
}

impl<X, P> IngestionPipeline<X, P>
where
    X: PdfExtractor,
    P: EmbeddingProvider,
{
    pub fn new(config: PipelineConfig, extractor: X, provider: P) -> Self {
        let embedder = BatchEmbedder::from_settings(provider, &config.embedding);
        let store = VectorStore::new(config.output_path.clone());
        Self {
            config,
            extractor,
            embedder,
            store,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        self.config.validate()?;

        let files = discover_pdf_files(&self.config.input_dir)?;
        let mut report = RunReport {
            discovered: files.len(),
            processed: Vec::new(),
            skipped: Vec::new(),
            chunks_embedded: 0,
            output_path: self.config.output_path.clone(),
            store_written: false,
            warnings: Vec::new(),
        };

        if files.is_empty() {
            let warning = RunWarning::NoInput {
                input_dir: self.config.input_dir.clone(),
            };
            warn!(%warning, "nothing to ingest");
            report.warnings.push(warning);

            if !self.store.exists() {
                self.store.save(&VectorStoreSnapshot::empty(self.embedder.model()))?;
                report.store_written = true;
            }
            return Ok(report);
        }

        info!(
            input_dir = %self.config.input_dir.display(),
            documents = files.len(),
            "starting ingestion"
        );

        let mut records = Vec::new();
        let mut dimensions: Option<usize> = None;

        for path in &files {
            let outcome = self.process_document(path).await.and_then(|document_records| {
                check_dimensions(&mut dimensions, &document_records, path)?;
                Ok(document_records)
            });

            match outcome {
                Ok(document_records) => {
                    let filename = file_name(path);
                    info!(file = %filename, chunks = document_records.len(), "document embedded");
                    report.chunks_embedded += document_records.len();
                    report.processed.push(ProcessedDocument {
                        filename,
                        chunk_count: document_records.len(),
                    });
                    records.extend(document_records);
                }
                Err(error) => match self.config.failure_policy {
                    FailurePolicy::FailFast => return Err(error),
                    FailurePolicy::SkipDocument => {
                        warn!(file = %path.display(), error = %error, "skipping document");
                        report.skipped.push(SkippedDocument {
                            path: path.clone(),
                            reason: error.to_string(),
                        });
                    }
                },
            }
        }

        if report.processed.is_empty() {
            return Err(PipelineError::AllDocumentsFailed {
                count: report.skipped.len(),
            });
        }

        let snapshot = VectorStoreSnapshot::new(
            self.embedder.model(),
            dimensions.unwrap_or(0),
            records,
        );
        self.store.save(&snapshot)?;
        report.store_written = true;

        info!(
            output = %self.config.output_path.display(),
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            chunks = report.chunks_embedded,
            "vector store replaced"
        );

        Ok(report)
    }

    async fn process_document(&self, path: &Path) -> Result<Vec<VectorRecord>, PipelineError> {
        let document = describe_document(path)?;
        let text = self.extractor.extract_text(path)?;
        let chunks = build_chunks(&document, &text, self.config.chunking)?;
        info!(file = %document.filename, chunks = chunks.len(), "document chunked");

        let inputs = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
        let vectors = self
            .embedder
            .embed_all(&inputs)
            .await
            .map_err(|error| PipelineError::Embedding {
                source_filename: document.filename.clone(),
                error,
            })?;

        let total_chunks = chunks.len() as u64;
        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord::from_chunk(chunk, vector, total_chunks))
            .collect())
    }
}

fn check_dimensions(
    dimensions: &mut Option<usize>,
    records: &[VectorRecord],
    path: &Path,
) -> Result<(), PipelineError> {
    let Some(first) = records.first() else {
        return Ok(());
    };

    let expected = *dimensions.get_or_insert(first.embedding.len());
    if first.embedding.len() != expected {
        return Err(PipelineError::Embedding {
            source_filename: file_name(path),
            error: EmbeddingError::DimensionMismatch {
                expected,
                actual: first.embedding.len(),
            },
        });
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
