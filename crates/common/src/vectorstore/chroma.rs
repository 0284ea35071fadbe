//! Chroma server client
//!
//! Talks to the Chroma REST API (`/api/v1`). Embeddings are computed client
//! side so the collection never needs a server-side embedding function.

use super::{VectorHit, VectorStore};
use crate::config::VectorStoreConfig;
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::http::LazyClient;
use crate::models::{Chunk, ChunkMetadata};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const DOCUMENT_ID_KEY: &str = "document_id";
const CHUNK_INDEX_KEY: &str = "chunk_index";

pub struct ChromaStore {
    base_url: String,
    http: LazyClient,
    embedder: Arc<dyn Embedder>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct CreateCollection<'a> {
    name: &'a str,
    get_or_create: bool,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<&'a str>,
    metadatas: Vec<BTreeMap<String, Value>>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: [&'a str; 3],
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    documents: Option<Vec<Vec<Option<String>>>>,
    metadatas: Option<Vec<Vec<Option<BTreeMap<String, Value>>>>>,
    distances: Option<Vec<Vec<f64>>>,
}

impl ChromaStore {
    pub fn new(config: &VectorStoreConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            http: LazyClient::new(Duration::from_secs(config.timeout_secs)),
            embedder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn error_from(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AppError::VectorStore {
            message: format!("Chroma error {}: {}", status, body),
        }
    }

    /// Look up a collection by name; `None` if it does not exist
    async fn find_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let http = self.http.get().await?;
        let response = http.get(self.url(&format!("/collections/{}", name))).send().await?;

        if response.status().is_success() {
            return Ok(Some(response.json().await?));
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // Older Chroma servers report a missing collection as a 500 ValueError
        if status == reqwest::StatusCode::NOT_FOUND || body.contains("does not exist") {
            return Ok(None);
        }
        Err(AppError::VectorStore {
            message: format!("Chroma error {}: {}", status, body),
        })
    }

    async fn get_or_create(&self, name: &str) -> Result<CollectionInfo> {
        let http = self.http.get().await?;
        let response = http
            .post(self.url("/collections"))
            .json(&CreateCollection {
                name,
                get_or_create: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }
}

fn to_chroma_metadata(chunk: &Chunk) -> BTreeMap<String, Value> {
    let mut meta: BTreeMap<String, Value> = chunk
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    meta.insert(DOCUMENT_ID_KEY.into(), Value::String(chunk.document_id.clone()));
    meta.insert(CHUNK_INDEX_KEY.into(), Value::from(chunk.index as u64));
    meta
}

fn from_chroma_metadata(id: String, text: String, raw: BTreeMap<String, Value>) -> Chunk {
    let mut metadata = ChunkMetadata::new();
    let mut document_id = None;
    let mut index = 0;

    for (key, value) in raw {
        match key.as_str() {
            DOCUMENT_ID_KEY => document_id = value.as_str().map(str::to_string),
            CHUNK_INDEX_KEY => index = value.as_u64().unwrap_or(0) as usize,
            _ => {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                metadata.insert(key, text);
            }
        }
    }

    let document_id = document_id
        .or_else(|| metadata.get("source_id").cloned())
        .unwrap_or_default();

    Chunk {
        chunk_id: id,
        document_id,
        text,
        index,
        metadata,
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn add(&self, domain: &str, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let collection = self.get_or_create(domain).await?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let request = AddRequest {
            ids: chunks.iter().map(|c| c.chunk_id.as_str()).collect(),
            embeddings,
            documents: chunks.iter().map(|c| c.text.as_str()).collect(),
            metadatas: chunks.iter().map(to_chroma_metadata).collect(),
        };

        let http = self.http.get().await?;
        let response = http
            .post(self.url(&format!("/collections/{}/add", collection.id)))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        tracing::debug!(domain, count = chunks.len(), "Chunks added to Chroma");
        Ok(chunks.len())
    }

    async fn query(&self, domain: &str, text: &str, k: usize) -> Result<Vec<VectorHit>> {
        let collection = self
            .find_collection(domain)
            .await?
            .ok_or_else(|| AppError::DomainNotFound {
                domain: domain.to_string(),
            })?;

        let embedding = self.embedder.embed(text).await?;
        let http = self.http.get().await?;
        let response = http
            .post(self.url(&format!("/collections/{}/query", collection.id)))
            .json(&QueryRequest {
                query_embeddings: vec![embedding],
                n_results: k,
                include: ["documents", "metadatas", "distances"],
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: QueryResponse = response.json().await?;
        let ids = body.ids.into_iter().next().unwrap_or_default();
        let documents = body
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let metadatas = body
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default();
        let distances = body
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        let hits = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let text = documents.get(i).cloned().flatten().unwrap_or_default();
                let meta = metadatas.get(i).cloned().flatten().unwrap_or_default();
                let distance = distances.get(i).copied().unwrap_or(f64::MAX);
                (from_chroma_metadata(id, text, meta), distance)
            })
            .collect();

        Ok(hits)
    }

    async fn list_domains(&self) -> Result<Vec<String>> {
        let http = self.http.get().await?;
        let response = http.get(self.url("/collections")).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        let collections: Vec<CollectionInfo> = response.json().await?;
        Ok(collections.into_iter().map(|c| c.name).collect())
    }

    async fn count(&self, domain: &str) -> Result<usize> {
        let Some(collection) = self.find_collection(domain).await? else {
            return Ok(0);
        };

        let http = self.http.get().await?;
        let response = http
            .get(self.url(&format!("/collections/{}/count", collection.id)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn close(&self) {
        self.http.close().await;
        self.embedder.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_round_trip() {
        let mut meta = ChunkMetadata::new();
        meta.insert("authors".into(), "Davis AK".into());
        meta.insert("year".into(), "2021".into());
        let chunk = Chunk::new("s2:abc", 3, "body").with_metadata(meta);

        let raw = to_chroma_metadata(&chunk);
        assert_eq!(raw[CHUNK_INDEX_KEY], Value::from(3u64));

        let back = from_chroma_metadata(chunk.chunk_id.clone(), "body".into(), raw);
        assert_eq!(back, chunk);
    }

    #[test]
    fn test_non_string_metadata_stringified() {
        let mut raw = BTreeMap::new();
        raw.insert("year".to_string(), Value::from(2020));
        raw.insert("source_id".to_string(), Value::from("arxiv:1"));
        let chunk = from_chroma_metadata("id".into(), "t".into(), raw);
        assert_eq!(chunk.year(), "2020");
        assert_eq!(chunk.document_id, "arxiv:1");
    }
}
