//! Text chunking module
//!
//! Splits documents into paragraph-level chunks that inherit the document's
//! bibliographic metadata.

use opensynthesis_common::models::{Chunk, ChunkMetadata, Document};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Paragraphs shorter than this (in characters) are merged forward
    pub min_chunk_length: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { min_chunk_length: 50 }
    }
}

/// Metadata every chunk of `doc` carries
pub fn inherited_metadata(doc: &Document) -> ChunkMetadata {
    let authors = if doc.authors.is_empty() {
        "Unknown".to_string()
    } else {
        doc.authors.join(", ")
    };

    let mut meta = ChunkMetadata::new();
    meta.insert("source_type".into(), doc.source_type.clone());
    meta.insert("authors".into(), authors);
    meta.insert(
        "year".into(),
        doc.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string()),
    );
    meta.insert("doi".into(), doc.doi.clone().unwrap_or_default());
    meta.insert("title".into(), doc.title.clone());
    meta.insert("source_id".into(), doc.source_id.clone());
    meta
}

/// Merge paragraphs until each reaches `min_len` characters.
///
/// A short remainder at the end is appended to the last merged paragraph.
fn merge_paragraphs<'a>(paragraphs: impl Iterator<Item = &'a str>, min_len: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut buffer = String::new();

    for para in paragraphs {
        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str(para);

        if buffer.chars().count() >= min_len {
            merged.push(std::mem::take(&mut buffer));
        }
    }

    if !buffer.is_empty() {
        match merged.last_mut() {
            Some(last) => {
                last.push_str("\n\n");
                last.push_str(&buffer);
            }
            None => merged.push(buffer),
        }
    }

    merged
}

/// Split a document into paragraph chunks.
///
/// Uses the full text when available, otherwise the abstract; a document
/// with neither yields no chunks.
pub fn chunk_document(doc: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    let Some(text) = doc.body() else {
        return Vec::new();
    };

    let paragraphs = text.split("\n\n").map(str::trim).filter(|p| !p.is_empty());
    let merged = merge_paragraphs(paragraphs, config.min_chunk_length);
    let metadata = inherited_metadata(doc);

    debug!(
        document = %doc.source_id,
        input_len = text.len(),
        chunk_count = merged.len(),
        "Document chunked"
    );

    merged
        .into_iter()
        .enumerate()
        .map(|(i, para)| Chunk::new(doc.source_id.clone(), i, para).with_metadata(metadata.clone()))
        .collect()
}
