use crate::chunking::ChunkingConfig;
use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BATCH_SIZE: usize = 64;
pub const DEFAULT_MAX_BATCH_CHARS: usize = 100_000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_INPUT_DIR: &str = "data/pdf";
pub const DEFAULT_OUTPUT_PATH: &str = "data/vectors.json";

/// Secret credential for the embedding service. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(ConfigError::MissingCredential("openai".to_string()));
        }
        Ok(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failing document, leave it out of the store and continue.
    #[default]
    SkipDocument,
    /// Abort the run on the first failing document.
    FailFast,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub model: String,
    pub base_url: String,
    pub batch_size: usize,
    /// Upper bound on the summed length of one request's inputs.
    pub max_batch_chars: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_batch_chars: DEFAULT_MAX_BATCH_CHARS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl EmbeddingSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidEmbeddingSettings(
                "model identifier is empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidEmbeddingSettings(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_batch_chars == 0 {
            return Err(ConfigError::InvalidEmbeddingSettings(
                "max_batch_chars must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidEmbeddingSettings(
                "request_timeout must be non-zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidEmbeddingSettings(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let base = format!("{}/", self.base_url.trim_end_matches('/'));
        Ok(Url::parse(&base)?.join("embeddings")?)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingSettings::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_path: output_path.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;
        self.embedding.validate()?;

        if self.output_path.as_os_str().is_empty() || self.output_path.file_name().is_none() {
            return Err(ConfigError::InvalidOutputPath(format!(
                "output path has no file name: {}",
                self.output_path.display()
            )));
        }
        if self.output_path.is_dir() {
            return Err(ConfigError::InvalidOutputPath(format!(
                "output path is a directory: {}",
                self.output_path.display()
            )));
        }

        match std::fs::metadata(&self.input_dir) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(ConfigError::InvalidInputDir {
                path: self.input_dir.clone(),
                reason: "not a directory".to_string(),
            }),
            Err(error) => Err(ConfigError::InvalidInputDir {
                path: self.input_dir.clone(),
                reason: error.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn api_key_debug_is_redacted() -> Result<(), ConfigError> {
        let key = ApiKey::new("sk-secret-value")?;
        assert_eq!(format!("{key:?}"), "ApiKey(<redacted>)");
        assert_eq!(key.expose(), "sk-secret-value");
        Ok(())
    }

    #[test]
    fn blank_api_key_is_rejected() {
        assert!(matches!(
            ApiKey::new("   "),
            Err(ConfigError::MissingCredential(_))
        ));
    }

    #[test]
    fn endpoint_appends_embeddings_path() -> Result<(), ConfigError> {
        let mut settings = EmbeddingSettings::default();
        assert_eq!(
            settings.endpoint()?.as_str(),
            "https://api.openai.com/v1/embeddings"
        );

        settings.base_url = "http://127.0.0.1:8080/".to_string();
        assert_eq!(settings.endpoint()?.as_str(), "http://127.0.0.1:8080/embeddings");
        Ok(())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunking.chunk_size, 1_000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.failure_policy, FailurePolicy::SkipDocument);
    }

    #[test]
    fn validation_rejects_missing_input_dir() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config = PipelineConfig::new(dir.path().join("absent"), dir.path().join("out.json"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidInputDir { .. })
        ));
        Ok(())
    }

    #[test]
    fn validation_rejects_overlap_not_below_chunk_size() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut config = PipelineConfig::new(dir.path(), dir.path().join("out.json"));
        config.chunking = ChunkingConfig::new(100, 100);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChunkConfig(_))
        ));
        Ok(())
    }
}
