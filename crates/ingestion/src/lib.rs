//! Open Synthesis Corpus Ingestion
//!
//! Searches external literature APIs, deduplicates and chunks the returned
//! documents, and adds the chunks to a domain of the vector store.

pub mod chunker;
pub mod processor;
pub mod sources;

pub use chunker::{chunk_document, ChunkingConfig};
pub use processor::{Corpus, CorpusManager, IngestionReport};
pub use sources::{DataSource, SourceInfo, SourceRegistry};
