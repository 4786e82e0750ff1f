use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing API credential for embedding provider {0}")]
    MissingCredential(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid embedding settings: {0}")]
    InvalidEmbeddingSettings(String),

    #[error("input directory is not readable: {path}: {reason}")]
    InvalidInputDir { path: PathBuf, reason: String },

    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("http client setup failed: {0}")]
    HttpClient(String),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pdf parse error in {path}: {details}")]
    PdfParse { path: PathBuf, details: String },

    #[error("text extraction failed on page {page} of {path}: {details}")]
    PageText {
        path: PathBuf,
        page: u32,
        details: String,
    },
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding service unreachable: {0}")]
    Unreachable(String),

    #[error("embedding request timed out")]
    Timeout,

    #[error("embedding service rate limited the request ({status}): {body}")]
    RateLimited { status: u16, body: String },

    #[error("embedding service failed ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("embedding service rejected credentials ({status})")]
    Unauthorized { status: u16 },

    #[error("embedding request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("embedding request could not be built: {0}")]
    InvalidRequest(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding service returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Transient failures are retried; everything else propagates at once.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_)
            | Self::Timeout
            | Self::RateLimited { .. }
            | Self::Server { .. } => true,
            Self::Unauthorized { .. }
            | Self::Rejected { .. }
            | Self::InvalidRequest(_)
            | Self::InvalidResponse(_)
            | Self::CountMismatch { .. }
            | Self::DimensionMismatch { .. } => false,
        }
    }
}

/// Only network-level failures map to transient variants. Builder errors
/// (an unusable header value, a bad URL) and redirect errors repeat on every
/// attempt.
impl From<reqwest::Error> for EmbeddingError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else if error.is_connect() || error.is_request() || error.is_body() {
            Self::Unreachable(error.to_string())
        } else {
            Self::InvalidResponse(error.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Corruption {
    #[error("file does not exist")]
    Missing,

    #[error("file is empty")]
    Empty,

    #[error("file is unreadable: {0}")]
    Unreadable(String),

    #[error("malformed snapshot: {0}")]
    Malformed(String),

    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u32),

    #[error("structural validation failed: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
#[error("vector store {path} is unusable: {kind}")]
pub struct StoreCorruptError {
    pub path: PathBuf,
    pub kind: Corruption,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("refusing to write invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("embedding failed for {source_filename}: {error}")]
    Embedding {
        source_filename: String,
        #[source]
        error: EmbeddingError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("all {count} discovered documents failed; store left untouched")]
    AllDocumentsFailed { count: usize },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
