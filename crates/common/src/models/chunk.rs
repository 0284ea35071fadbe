//! Chunk and scored chunk types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Flat metadata inherited from the source document
pub type ChunkMetadata = BTreeMap<String, String>;

/// Derive the stable chunk id for a document position.
///
/// First 16 hex characters of SHA-256 over `"{document_id}:{index}"`.
pub fn chunk_id(document_id: &str, index: usize) -> String {
    let digest = Sha256::digest(format!("{}:{}", document_id, index).as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(16);
    id
}

/// Paragraph-sized unit of retrievable text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id derived from document id and position
    pub chunk_id: String,

    /// Owning document id
    pub document_id: String,

    /// Text body
    pub text: String,

    /// Position within the document
    pub index: usize,

    /// Inherited document metadata (authors, year, doi, title, source_type)
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a chunk, deriving its id from the document id and position
    pub fn new(document_id: impl Into<String>, index: usize, text: impl Into<String>) -> Self {
        let document_id = document_id.into();
        Self {
            chunk_id: chunk_id(&document_id, index),
            document_id,
            text: text.into(),
            index,
            metadata: ChunkMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Metadata lookup that treats empty values as absent
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn authors(&self) -> &str {
        self.meta("authors").unwrap_or("Unknown")
    }

    pub fn year(&self) -> &str {
        self.meta("year").unwrap_or("n.d.")
    }

    pub fn title(&self) -> &str {
        self.meta("title").unwrap_or("Untitled")
    }

    pub fn source_type(&self) -> &str {
        self.meta("source_type").unwrap_or("")
    }

    pub fn doi(&self) -> Option<&str> {
        self.meta("doi")
    }

    /// Key used to deduplicate sources: DOI, falling back to document id
    pub fn source_key(&self) -> &str {
        self.doi().unwrap_or(&self.document_id)
    }
}

/// Retrieval method that produced a score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    /// Embedding nearest-neighbour search
    Dense,
    /// BM25 keyword scoring
    Sparse,
    /// Reciprocal rank fusion output
    Hybrid,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::Dense => "dense",
            RetrievalMethod::Sparse => "sparse",
            RetrievalMethod::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chunk annotated with a relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
    pub retrieval_method: RetrievalMethod,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, score: f64, retrieval_method: RetrievalMethod) -> Self {
        Self {
            chunk,
            score,
            retrieval_method,
        }
    }

    pub fn id(&self) -> &str {
        &self.chunk.chunk_id
    }
}
