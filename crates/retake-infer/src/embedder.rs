//! Embedding engine trait.

use async_trait::async_trait;

use retake_core::Result;
use retake_store::StoredEmbedding;

/// Trait for embedding backends.
///
/// Round summaries and queries must go through the same backend; the
/// `version` tag is how the index tells vector spaces apart.
#[async_trait]
pub trait EmbedderBackend: Send + Sync {
    /// Generate an embedding for a text string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Version tag identifying the vector space, e.g. `hash-v1/384`.
    fn version(&self) -> String;

    /// Embed and tag with this backend's version.
    async fn embed_tagged(&self, text: &str) -> Result<StoredEmbedding> {
        Ok(StoredEmbedding {
            version: self.version(),
            vector: self.embed(text).await?,
        })
    }
}
