use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Identity of one input PDF. The extracted text is never kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub filename: String,
    pub source_path: PathBuf,
    pub checksum: String,
}

/// A contiguous span of a document's text. Offsets count chars, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub chunk_id: String,
    pub source_filename: String,
    pub source_checksum: String,
    pub chunk_index: u64,
    pub start_offset: usize,
    pub end_offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_filename: String,
    pub source_checksum: String,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl VectorRecord {
    pub fn from_chunk(chunk: TextChunk, embedding: Vec<f32>, total_chunks: u64) -> Self {
        Self {
            id: chunk.chunk_id,
            text: chunk.text,
            embedding,
            metadata: ChunkMetadata {
                source_filename: chunk.source_filename,
                source_checksum: chunk.source_checksum,
                chunk_index: chunk.chunk_index,
                total_chunks,
                start_offset: chunk.start_offset,
                end_offset: chunk.end_offset,
            },
        }
    }
}

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Everything one pipeline run produced, persisted as a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreSnapshot {
    pub format_version: u32,
    pub model: String,
    pub dimensions: usize,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<VectorRecord>,
}

impl VectorStoreSnapshot {
    pub fn new(model: impl Into<String>, dimensions: usize, records: Vec<VectorRecord>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            model: model.into(),
            dimensions,
            generated_at: Utc::now(),
            records,
        }
    }

    pub fn empty(model: impl Into<String>) -> Self {
        Self::new(model, 0, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record counts per source, in the order sources first appear.
    pub fn counts_by_source(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for record in &self.records {
            match counts
                .iter_mut()
                .find(|(name, _)| *name == record.metadata.source_filename)
            {
                Some((_, count)) => *count += 1,
                None => counts.push((record.metadata.source_filename.clone(), 1)),
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedDocument {
    pub filename: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

/// Non-fatal conditions surfaced in the end-of-run summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunWarning {
    #[error("no pdf files found in {}", .input_dir.display())]
    NoInput { input_dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub discovered: usize,
    pub processed: Vec<ProcessedDocument>,
    pub skipped: Vec<SkippedDocument>,
    pub chunks_embedded: usize,
    pub output_path: PathBuf,
    pub store_written: bool,
    pub warnings: Vec<RunWarning>,
}
