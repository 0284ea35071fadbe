//! Reranking stage applied after fusion

use opensynthesis_common::errors::Result;
use opensynthesis_common::models::ScoredChunk;

/// Reorders and truncates fused results, e.g. with a cross-encoder
#[async_trait::async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, chunks: Vec<ScoredChunk>, k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Keeps the fused order; truncates to `k`
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityReranker;

#[async_trait::async_trait]
impl Reranker for IdentityReranker {
    async fn rerank(&self, _query: &str, mut chunks: Vec<ScoredChunk>, k: usize) -> Result<Vec<ScoredChunk>> {
        chunks.truncate(k);
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensynthesis_common::models::{Chunk, RetrievalMethod};

    #[tokio::test]
    async fn test_identity_truncates() {
        let chunks: Vec<ScoredChunk> = (0..5)
            .map(|i| ScoredChunk::new(Chunk::new("d", i, "t"), 1.0, RetrievalMethod::Hybrid))
            .collect();

        let out = IdentityReranker.rerank("q", chunks.clone(), 3).await.unwrap();
        assert_eq!(out, chunks[..3].to_vec());
    }
}
