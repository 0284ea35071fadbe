//! Multi-stage retrieval system
//!
//! Provides:
//! - Dense search (embedding similarity via the vector store)
//! - BM25 search (ephemeral keyword index over a candidate set)
//! - Hybrid search (RRF fusion of dense + BM25, then reranking)

mod bm25;
mod fusion;
mod hybrid;
mod rerank;
mod vector;

pub use bm25::{tokenize, Bm25Index, Bm25Params};
pub use fusion::RRFusion;
pub use hybrid::HybridRetriever;
pub use rerank::{IdentityReranker, Reranker};
pub use vector::{similarity, DenseRetriever};

use opensynthesis_common::errors::Result;
use opensynthesis_common::models::{RetrievalMethod, ScoredChunk};

/// Common trait for all retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` chunks from `domain` relevant to `query`, best first
    async fn retrieve(&self, domain: &str, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;

    /// Method tag carried by the returned chunks
    fn method(&self) -> RetrievalMethod;
}
