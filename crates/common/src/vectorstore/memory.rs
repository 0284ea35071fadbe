//! In-process vector store

use super::{VectorHit, VectorStore};
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::models::Chunk;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

struct Entry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// Vector store held in memory, scored by squared L2 distance
pub struct MemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    collections: RwLock<BTreeMap<String, Vec<Entry>>>,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(BTreeMap::new()),
        }
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum()
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(&self, domain: &str, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut collections = self.collections.write().await;
        let collection = collections.entry(domain.to_string()).or_default();
        let mut existing: HashSet<String> =
            collection.iter().map(|e| e.chunk.chunk_id.clone()).collect();

        let mut added = 0;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            if !existing.insert(chunk.chunk_id.clone()) {
                continue;
            }
            collection.push(Entry {
                chunk: chunk.clone(),
                embedding,
            });
            added += 1;
        }

        Ok(added)
    }

    async fn query(&self, domain: &str, text: &str, k: usize) -> Result<Vec<VectorHit>> {
        let query = self.embedder.embed(text).await?;

        let collections = self.collections.read().await;
        let collection = collections
            .get(domain)
            .ok_or_else(|| AppError::DomainNotFound {
                domain: domain.to_string(),
            })?;

        let mut hits: Vec<VectorHit> = collection
            .iter()
            .map(|e| (e.chunk.clone(), squared_l2(&query, &e.embedding)))
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);

        Ok(hits)
    }

    async fn list_domains(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn count(&self, domain: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(domain)
            .map(Vec::len)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;

    fn store() -> MemoryVectorStore {
        MemoryVectorStore::new(Arc::new(HashEmbedder::new(128)))
    }

    #[tokio::test]
    async fn test_query_missing_domain() {
        let store = store();
        let err = store.query("nope", "anything", 5).await.unwrap_err();
        assert!(matches!(err, AppError::DomainNotFound { .. }));
    }

    #[tokio::test]
    async fn test_add_skips_duplicate_ids() {
        let store = store();
        let chunks = vec![Chunk::new("doc", 0, "alpha beta"), Chunk::new("doc", 1, "gamma")];
        assert_eq!(store.add("d", &chunks).await.unwrap(), 2);
        assert_eq!(store.add("d", &chunks).await.unwrap(), 0);
        assert_eq!(store.count("d").await.unwrap(), 2);
        assert_eq!(store.list_domains().await.unwrap(), vec!["d".to_string()]);
    }

    #[tokio::test]
    async fn test_nearest_first() {
        let store = store();
        let chunks = vec![
            Chunk::new("doc", 0, "ocean tides and lunar gravity"),
            Chunk::new("doc", 1, "psilocybin depression trial results"),
            Chunk::new("doc", 2, "soil nitrogen cycles"),
        ];
        store.add("d", &chunks).await.unwrap();

        let hits = store.query("d", "psilocybin depression", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.index, 1);
        assert!(hits[0].1 <= hits[1].1);
    }
}
