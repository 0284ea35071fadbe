//! Dense similarity search over the vector store

use super::Retriever;
use opensynthesis_common::errors::Result;
use opensynthesis_common::models::{RetrievalMethod, ScoredChunk};
use opensynthesis_common::vectorstore::VectorStore;
use std::sync::Arc;

/// Map an embedding distance to a similarity in (0, 1]
pub fn similarity(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Dense retriever backed by the domain vector index
pub struct DenseRetriever {
    store: Arc<dyn VectorStore>,
}

impl DenseRetriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Retriever for DenseRetriever {
    async fn retrieve(&self, domain: &str, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = self.store.query(domain, query, k).await?;

        Ok(hits
            .into_iter()
            .map(|(chunk, distance)| ScoredChunk::new(chunk, similarity(distance), RetrievalMethod::Dense))
            .collect())
    }

    fn method(&self) -> RetrievalMethod {
        RetrievalMethod::Dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensynthesis_common::embeddings::HashEmbedder;
    use opensynthesis_common::errors::AppError;
    use opensynthesis_common::models::Chunk;
    use opensynthesis_common::vectorstore::MemoryVectorStore;

    #[test]
    fn test_similarity() {
        assert_eq!(similarity(0.0), 1.0);
        assert_eq!(similarity(1.0), 0.5);
        assert!(similarity(3.0) < similarity(2.0));
    }

    #[tokio::test]
    async fn test_dense_scores_descend() {
        let store = Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder::new(64))));
        store
            .add(
                "d",
                &[
                    Chunk::new("doc", 0, "mitochondria produce energy"),
                    Chunk::new("doc", 1, "river delta sediment"),
                ],
            )
            .await
            .unwrap();

        let retriever = DenseRetriever::new(store);
        let results = retriever.retrieve("d", "mitochondria energy", 5).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert!(results.iter().all(|r| r.retrieval_method == RetrievalMethod::Dense));
    }

    #[tokio::test]
    async fn test_missing_domain() {
        let store = Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder::new(8))));
        let err = DenseRetriever::new(store).retrieve("none", "q", 3).await.unwrap_err();
        assert!(matches!(err, AppError::DomainNotFound { .. }));
    }
}
