//! Vector index abstraction
//!
//! Each domain is one collection. Implementations:
//! - [`ChromaStore`]: HTTP client for a Chroma server
//! - [`MemoryVectorStore`]: in-process store for tests and offline runs

mod chroma;
mod memory;

pub use chroma::ChromaStore;
pub use memory::MemoryVectorStore;

use crate::config::{EmbeddingConfig, VectorStoreConfig};
use crate::embeddings::{Embedder, HashEmbedder, OpenAIEmbedder};
use crate::errors::{AppError, Result};
use crate::models::Chunk;
use async_trait::async_trait;
use std::sync::Arc;

/// Nearest-neighbour hit: chunk and raw embedding distance (lower is closer)
pub type VectorHit = (Chunk, f64);

/// Persistent vector index partitioned by domain
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add chunks to a domain collection, creating it if needed. Returns count added.
    async fn add(&self, domain: &str, chunks: &[Chunk]) -> Result<usize>;

    /// Up to `k` nearest chunks to `text`.
    ///
    /// Fails with [`AppError::DomainNotFound`] when the collection is absent.
    async fn query(&self, domain: &str, text: &str, k: usize) -> Result<Vec<VectorHit>>;

    /// Names of all domain collections
    async fn list_domains(&self) -> Result<Vec<String>>;

    /// Number of chunks in a domain; 0 when absent
    async fn count(&self, domain: &str) -> Result<usize>;

    /// Release outbound connections
    async fn close(&self) {}
}

/// Build the configured vector store
pub fn build_vector_store(
    store: &VectorStoreConfig,
    embedding: &EmbeddingConfig,
) -> Result<Arc<dyn VectorStore>> {
    match store.provider.as_str() {
        "chroma" => {
            let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::new(embedding)?);
            Ok(Arc::new(ChromaStore::new(store, embedder)))
        }
        "memory" => Ok(Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder::new(384))))),
        other => Err(AppError::Configuration {
            message: format!("Unknown vector store provider '{}'", other),
        }),
    }
}
