use crate::config::EmbeddingSettings;
use crate::error::EmbeddingError;
use crate::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use std::ops::Range;

pub const DEFAULT_NGRAM_DIMENSIONS: usize = 128;

/// Remote (or local) capability that turns a batch of texts into vectors.
///
/// Implementations must return one vector per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[async_trait]
impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(inputs).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_items: usize,
    pub max_chars: usize,
}

impl From<&EmbeddingSettings> for BatchLimits {
    fn from(settings: &EmbeddingSettings) -> Self {
        Self {
            max_items: settings.batch_size,
            max_chars: settings.max_batch_chars,
        }
    }
}

/// Groups consecutive inputs into batches bounded by item count and total
/// chars. An input longer than `max_chars` is sent alone.
pub fn plan_batches(inputs: &[&str], limits: BatchLimits) -> Vec<Range<usize>> {
    let max_items = limits.max_items.max(1);
    let mut batches = Vec::new();
    let mut start = 0;
    let mut chars = 0;

    for (position, input) in inputs.iter().enumerate() {
        let length = input.chars().count();
        let batch_len = position - start;
        let full = batch_len >= max_items || (batch_len > 0 && chars + length > limits.max_chars);

        if full {
            batches.push(start..position);
            start = position;
            chars = 0;
        }
        chars += length;
    }

    if start < inputs.len() {
        batches.push(start..inputs.len());
    }

    batches
}

/// Drives a provider over any number of inputs: plans batches, sends them one
/// at a time, retries transient failures and checks every response's shape.
pub struct BatchEmbedder<P> {
    provider: P,
    limits: BatchLimits,
    retry: RetryPolicy,
}

impl<P: EmbeddingProvider> BatchEmbedder<P> {
    pub fn new(provider: P, limits: BatchLimits, retry: RetryPolicy) -> Self {
        Self {
            provider,
            limits,
            retry,
        }
    }

    pub fn from_settings(provider: P, settings: &EmbeddingSettings) -> Self {
        Self::new(provider, BatchLimits::from(settings), settings.retry)
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns `vectors[i]` for `inputs[i]`. Any batch whose response has the
    /// wrong count or inconsistent dimensions fails the whole call.
    pub async fn embed_all(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(inputs.len());
        let mut dimensions: Option<usize> = None;

        for range in plan_batches(inputs, self.limits) {
            let batch = &inputs[range.clone()];
            tracing::debug!(
                model = self.provider.model(),
                first = range.start,
                size = batch.len(),
                "embedding batch"
            );

            let embedded = with_retry(&self.retry, || self.provider.embed_batch(batch)).await?;

            if embedded.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: embedded.len(),
                });
            }

            for vector in &embedded {
                if vector.is_empty() {
                    return Err(EmbeddingError::InvalidResponse(
                        "embedding vector is empty".to_string(),
                    ));
                }
                let expected = *dimensions.get_or_insert(vector.len());
                if vector.len() != expected {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
            }

            vectors.extend(embedded);
        }

        Ok(vectors)
    }
}

/// Deterministic offline embedder: hashed character trigram counts, L2
/// normalized.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_NGRAM_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            let mut buffer = [0u8; 4];
            for ch in window {
                for byte in ch.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for CharacterNgramEmbedder {
    fn model(&self) -> &str {
        "character-ngram"
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(inputs.iter().map(|input| self.embed_text(input)).collect())
    }
}
