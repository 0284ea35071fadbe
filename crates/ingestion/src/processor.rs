//! Corpus ingestion processor
//!
//! Core logic for growing a domain: concurrent source search, DOI
//! deduplication, chunking, and indexing.

use crate::chunker::{chunk_document, ChunkingConfig};
use crate::sources::{DataSource, SourceRegistry};
use async_trait::async_trait;
use futures::future::join_all;
use opensynthesis_common::errors::Result;
use opensynthesis_common::metrics;
use opensynthesis_common::models::Document;
use opensynthesis_common::vectorstore::VectorStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Default number of results requested from each source
pub const DEFAULT_MAX_RESULTS_PER_SOURCE: usize = 20;

/// Outcome of one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    /// Unique documents after deduplication
    pub documents: usize,
    /// Chunks added to the vector store
    pub chunks: usize,
}

/// Something that can grow a domain from a search query
#[async_trait]
pub trait Corpus: Send + Sync {
    async fn ingest(&self, query: &str, domain: &str) -> Result<IngestionReport>;
}

pub struct CorpusManager {
    store: Arc<dyn VectorStore>,
    registry: SourceRegistry,
    chunking: ChunkingConfig,
    default_sources: Option<Vec<String>>,
    max_results_per_source: usize,
}

impl CorpusManager {
    pub fn new(store: Arc<dyn VectorStore>, registry: SourceRegistry) -> Self {
        Self {
            store,
            registry,
            chunking: ChunkingConfig::default(),
            default_sources: None,
            max_results_per_source: DEFAULT_MAX_RESULTS_PER_SOURCE,
        }
    }

    /// Restrict [`Corpus::ingest`] to the named sources
    pub fn with_sources(mut self, names: Option<Vec<String>>) -> Self {
        self.default_sources = names.filter(|n| !n.is_empty());
        self
    }

    pub fn with_max_results(mut self, max_results_per_source: usize) -> Self {
        self.max_results_per_source = max_results_per_source;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Search sources, deduplicate, chunk and store.
    ///
    /// A failing source is logged and skipped; the run still succeeds with
    /// whatever the other sources returned.
    #[instrument(skip(self, source_names))]
    pub async fn ingest_with(
        &self,
        query: &str,
        domain: &str,
        source_names: Option<&[String]>,
        max_results_per_source: usize,
    ) -> Result<IngestionReport> {
        let sources = self.registry.select(source_names);
        let documents = search_all(&sources, query, max_results_per_source).await;
        let unique = deduplicate(documents);

        let mut total_chunks = 0;
        let mut outcome = Ok(());
        for doc in &unique {
            let chunks = chunk_document(doc, &self.chunking);
            match self.store.add(domain, &chunks).await {
                Ok(added) => total_chunks += added,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        for (_, source) in &sources {
            source.close().await;
        }
        outcome?;

        metrics::record_ingestion(domain, total_chunks);
        info!(documents = unique.len(), chunks = total_chunks, "Ingestion complete");

        Ok(IngestionReport {
            documents: unique.len(),
            chunks: total_chunks,
        })
    }
}

#[async_trait]
impl Corpus for CorpusManager {
    async fn ingest(&self, query: &str, domain: &str) -> Result<IngestionReport> {
        self.ingest_with(
            query,
            domain,
            self.default_sources.as_deref(),
            self.max_results_per_source,
        )
        .await
    }
}

async fn search_all(
    sources: &[(String, Arc<dyn DataSource>)],
    query: &str,
    max_results: usize,
) -> Vec<Document> {
    let searches = sources.iter().map(|(name, source)| async move {
        (name, source.search(query, max_results).await)
    });

    let mut documents = Vec::new();
    for (name, result) in join_all(searches).await {
        match result {
            Ok(docs) => {
                tracing::debug!(source = %name, count = docs.len(), "Source search finished");
                documents.extend(docs);
            }
            Err(e) => warn!(source = %name, error = %e, "Source search failed, skipping"),
        }
    }
    documents
}

/// Keep the first document per DOI (source id when no DOI)
pub fn deduplicate(documents: Vec<Document>) -> Vec<Document> {
    let mut seen: HashSet<String> = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| seen.insert(doc.dedup_key().to_string()))
        .collect()
}
