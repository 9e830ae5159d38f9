//! Embedding abstraction over the configured LLM service.
//!
//! Enum dispatch, no trait objects. The `Llm` variant targets the embedding
//! profile and prefers the batched array endpoint; if the server rejects
//! batching, it falls back to a bounded per-text pool. The `Noop` variant
//! produces deterministic hashed vectors for offline runs and tests.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use ai_llm_service::LlmServiceProfiles;
use ai_llm_service::error_handler::{AiLlmError, ProviderErrorKind};

use crate::errors::StoreError;

/// Concurrency of the per-text fallback pool.
const FALLBACK_CONCURRENCY: usize = 8;

/// Embedding backend.
#[derive(Clone)]
pub enum Embedder {
    /// Embed via the service's embedding profile.
    Llm(Arc<LlmServiceProfiles>),
    /// Deterministic hashed vectors of the given dimension. No network.
    Noop { dim: usize },
}

impl Embedder {
    /// Embeds one text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        match self {
            Embedder::Llm(profiles) => Ok(profiles.embed(text).await?),
            Embedder::Noop { dim } => Ok(hashed_vector(text, *dim)),
        }
    }

    /// Embeds a batch of texts, preserving input order.
    ///
    /// The batched array endpoint is tried first; a 4xx rejection falls back
    /// to per-text embedding through a bounded pool.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        match self {
            Embedder::Llm(profiles) => match profiles.embed_batch(texts).await {
                Ok(vectors) if vectors.len() == texts.len() => Ok(vectors),
                Ok(vectors) => Err(StoreError::Parse(format!(
                    "embedding batch returned {} vectors for {} inputs",
                    vectors.len(),
                    texts.len()
                ))),
                Err(err) if batch_unsupported(&err) => {
                    warn!(error = %err, "batch embedding rejected; falling back to per-text pool");
                    self.embed_each(profiles, texts).await
                }
                Err(err) => Err(err.into()),
            },
            Embedder::Noop { dim } => Ok(texts.iter().map(|t| hashed_vector(t, *dim)).collect()),
        }
    }

    async fn embed_each(
        &self,
        profiles: &Arc<LlmServiceProfiles>,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, StoreError> {
        debug!(texts = texts.len(), concurrency = FALLBACK_CONCURRENCY, "embedding per text");

        let results: Vec<(usize, Vec<f32>)> = stream::iter(texts.iter().enumerate())
            .map(|(i, text)| {
                let profiles = profiles.clone();
                async move {
                    let v = profiles.embed(text).await?;
                    Ok::<(usize, Vec<f32>), AiLlmError>((i, v))
                }
            })
            .buffer_unordered(FALLBACK_CONCURRENCY)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, AiLlmError>>()?;

        let mut out = vec![Vec::new(); texts.len()];
        for (i, v) in results {
            out[i] = v;
        }
        Ok(out)
    }
}

/// Whether a provider failure means "this server does not take batches".
fn batch_unsupported(err: &AiLlmError) -> bool {
    match err {
        AiLlmError::Provider(p) => match &p.kind {
            ProviderErrorKind::HttpStatus(h) => h.status.is_client_error(),
            _ => false,
        },
        _ => false,
    }
}

/// Deterministic pseudo-embedding: digest bytes cycled into `dim` floats,
/// L2-normalized. Identical text always maps to the identical vector.
fn hashed_vector(text: &str, dim: usize) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    let mut v: Vec<f32> = (0..dim)
        .map(|i| {
            let byte = digest[i % digest.len()];
            let salt = (i / digest.len()) as f32;
            f32::from(byte) - 128.0 + salt
        })
        .collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_embedder_is_deterministic() {
        let embedder = Embedder::Noop { dim: 16 };
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        let c = embedder.embed("other").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn noop_batch_matches_single() {
        let embedder = Embedder::Noop { dim: 8 };
        let batch = embedder
            .embed_batch(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(batch[0], embedder.embed("one").await.unwrap());
        assert_eq!(batch[1], embedder.embed("two").await.unwrap());
    }
}
