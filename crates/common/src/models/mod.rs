//! Core data model shared across retrieval, synthesis and ingestion

mod chunk;
mod document;
mod paper;
mod synthesis;

pub use chunk::{chunk_id, Chunk, ChunkMetadata, RetrievalMethod, ScoredChunk};
pub use document::Document;
pub use paper::{PaperResult, PaperSection, SourceEntry};
pub use synthesis::{CitationCheck, ConfidenceLevel, SynthesisResult};
