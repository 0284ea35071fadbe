//! Hybrid retrieval combining dense and BM25 search
//!
//! Dense candidates are re-scored with an ephemeral BM25 index, the two
//! rankings are merged with RRF, then passed through the reranker.

use super::{
    bm25::{Bm25Index, Bm25Params},
    fusion::RRFusion,
    rerank::{IdentityReranker, Reranker},
    vector::DenseRetriever,
    Retriever,
};
use opensynthesis_common::config::RetrievalConfig;
use opensynthesis_common::errors::Result;
use opensynthesis_common::metrics;
use opensynthesis_common::models::{RetrievalMethod, ScoredChunk};
use opensynthesis_common::vectorstore::VectorStore;
use std::sync::Arc;
use std::time::Instant;

/// Hybrid retriever combining dense and BM25
pub struct HybridRetriever {
    dense: DenseRetriever,
    fusion: RRFusion,
    bm25: Bm25Params,
    reranker: Arc<dyn Reranker>,
}

impl HybridRetriever {
    /// Create with the default 0.6 / 0.4 weighting
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            dense: DenseRetriever::new(store),
            fusion: RRFusion::with_weights(vec![0.6, 0.4]),
            bm25: Bm25Params::default(),
            reranker: Arc::new(IdentityReranker),
        }
    }

    /// Create with weights and rank constant from configuration
    pub fn from_config(store: Arc<dyn VectorStore>, config: &RetrievalConfig) -> Self {
        Self {
            fusion: RRFusion::with_weights(vec![config.dense_weight, config.sparse_weight])
                .with_k(config.rrf_k),
            ..Self::new(store)
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }
}

#[async_trait::async_trait]
impl Retriever for HybridRetriever {
    #[tracing::instrument(skip(self))]
    async fn retrieve(&self, domain: &str, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let start = Instant::now();

        let dense = self.dense.retrieve(domain, query, k).await?;
        if dense.is_empty() {
            tracing::debug!("No dense candidates, skipping sparse phase");
            metrics::record_retrieval(start.elapsed().as_secs_f64(), domain, 0);
            return Ok(Vec::new());
        }

        let candidates = dense.iter().map(|c| c.chunk.clone()).collect();
        let sparse = Bm25Index::with_params(candidates, self.bm25).search(query, k);

        tracing::debug!(dense = dense.len(), sparse = sparse.len(), "Fusing candidate lists");

        let fused = self.fusion.fuse(&[dense, sparse], k);
        let results = self.reranker.rerank(query, fused, k).await?;

        metrics::record_retrieval(start.elapsed().as_secs_f64(), domain, results.len());
        Ok(results)
    }

    fn method(&self) -> RetrievalMethod {
        RetrievalMethod::Hybrid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensynthesis_common::embeddings::HashEmbedder;
    use opensynthesis_common::errors::AppError;
    use opensynthesis_common::models::Chunk;
    use opensynthesis_common::vectorstore::MemoryVectorStore;

    async fn seeded_store() -> Arc<MemoryVectorStore> {
        let store = Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder::new(256))));
        let chunks = vec![
            Chunk::new("a", 0, "Psilocybin therapy reduced depression symptoms"),
            Chunk::new("a", 1, "Participants reported lasting mood improvements"),
            Chunk::new("b", 0, "Glacier retreat accelerated over the decade"),
            Chunk::new("b", 1, "Depression trial used a double blind design"),
            Chunk::new("c", 0, "Urban heat islands raise night temperatures"),
        ];
        store.add("psych", &chunks).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_hybrid_results_bounded_and_tagged() {
        let retriever = HybridRetriever::new(seeded_store().await);
        let results = tokio_test::assert_ok!(retriever.retrieve("psych", "psilocybin depression", 3).await);

        assert!(results.len() <= 3);
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.retrieval_method == RetrievalMethod::Hybrid));
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_keyword_match_ranks_first() {
        let retriever = HybridRetriever::new(seeded_store().await);
        let results = retriever.retrieve("psych", "psilocybin depression", 5).await.unwrap();
        assert_eq!(results[0].chunk.document_id, "a");
        assert_eq!(results[0].chunk.index, 0);
    }

    #[tokio::test]
    async fn test_missing_domain_propagates() {
        let retriever = HybridRetriever::new(seeded_store().await);
        let err = retriever.retrieve("nope", "q", 5).await.unwrap_err();
        assert!(matches!(err, AppError::DomainNotFound { .. }));
    }

    struct EmptyStore;

    #[async_trait::async_trait]
    impl VectorStore for EmptyStore {
        async fn add(&self, _: &str, _: &[Chunk]) -> Result<usize> {
            Ok(0)
        }
        async fn query(&self, _: &str, _: &str, _: usize) -> Result<Vec<(Chunk, f64)>> {
            Ok(Vec::new())
        }
        async fn list_domains(&self) -> Result<Vec<String>> {
            Ok(vec!["empty".into()])
        }
        async fn count(&self, _: &str) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_empty_dense_gives_empty_result() {
        let retriever = HybridRetriever::new(Arc::new(EmptyStore));
        assert!(retriever.retrieve("empty", "anything", 5).await.unwrap().is_empty());
    }

    struct ReverseReranker;

    #[async_trait::async_trait]
    impl Reranker for ReverseReranker {
        async fn rerank(&self, _: &str, mut chunks: Vec<ScoredChunk>, k: usize) -> Result<Vec<ScoredChunk>> {
            chunks.reverse();
            chunks.truncate(k);
            Ok(chunks)
        }
    }

    #[tokio::test]
    async fn test_custom_reranker_applied() {
        let store = seeded_store().await;
        let plain = HybridRetriever::new(store.clone());
        let reversed = HybridRetriever::new(store).with_reranker(Arc::new(ReverseReranker));

        let a = plain.retrieve("psych", "depression", 5).await.unwrap();
        let b = reversed.retrieve("psych", "depression", 5).await.unwrap();
        assert_eq!(a.first().map(|c| c.id()), b.last().map(|c| c.id()));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = RetrievalConfig::default();
        let retriever = HybridRetriever::from_config(seeded_store().await, &config);
        assert_eq!(retriever.fusion.weights, vec![0.6, 0.4]);
        assert_eq!(retriever.fusion.k, 60.0);
    }
}
