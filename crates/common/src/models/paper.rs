//! Multi-section paper types and assembly

use super::ScoredChunk;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One section of a generated paper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperSection {
    pub title: String,
    pub description: String,

    #[serde(default)]
    pub search_queries: Vec<String>,

    #[serde(default)]
    pub synthesis: String,

    #[serde(default)]
    pub chunks_used: Vec<ScoredChunk>,
}

impl PaperSection {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// Retrieval query combining title and description
    pub fn retrieval_query(&self) -> String {
        format!("{}: {}", self.title, self.description)
    }

    pub fn word_count(&self) -> usize {
        self.synthesis.split_whitespace().count()
    }
}

/// Entry in the deduplicated reference list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// 1-based reference number
    pub number: usize,
    pub authors: String,
    pub year: String,
    pub title: String,
    pub doi: Option<String>,
    pub source_type: String,
}

/// Generated paper: topic, domain and sections in outline order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperResult {
    pub topic: String,
    pub domain: String,
    pub sections: Vec<PaperSection>,
}

impl PaperResult {
    pub fn total_words(&self) -> usize {
        self.sections.iter().map(PaperSection::word_count).sum()
    }

    /// Sources across all sections, deduplicated by DOI (fallback document
    /// id) in first-seen order and numbered sequentially
    pub fn sources(&self) -> Vec<SourceEntry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for rc in self.sections.iter().flat_map(|s| s.chunks_used.iter()) {
            let chunk = &rc.chunk;
            if !seen.insert(chunk.source_key().to_string()) {
                continue;
            }
            entries.push(SourceEntry {
                number: entries.len() + 1,
                authors: chunk.authors().to_string(),
                year: chunk.year().to_string(),
                title: chunk.title().to_string(),
                doi: chunk.doi().map(str::to_string),
                source_type: chunk.source_type().to_string(),
            });
        }

        entries
    }

    /// Render the assembled paper as markdown
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.topic);

        for section in &self.sections {
            out.push_str(&format!("## {}\n\n{}\n\n", section.title, section.synthesis.trim()));
        }

        let sources = self.sources();
        if !sources.is_empty() {
            out.push_str("## References\n\n");
            for src in sources {
                let link = src
                    .doi
                    .as_ref()
                    .map(|doi| format!(" https://doi.org/{}", doi))
                    .unwrap_or_default();
                out.push_str(&format!("{}. {} ({}). {}.{}\n", src.number, src.authors, src.year, src.title, link));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMetadata, RetrievalMethod};

    fn scored(doc: &str, index: usize, doi: &str, title: &str) -> ScoredChunk {
        let mut meta = ChunkMetadata::new();
        meta.insert("doi".into(), doi.into());
        meta.insert("title".into(), title.into());
        meta.insert("authors".into(), "Davis AK".into());
        meta.insert("year".into(), "2021".into());
        ScoredChunk::new(
            Chunk::new(doc, index, "text").with_metadata(meta),
            0.5,
            RetrievalMethod::Hybrid,
        )
    }

    #[test]
    fn test_sources_dedup_first_seen_order() {
        let mut intro = PaperSection::new("Intro", "Background");
        intro.chunks_used = vec![
            scored("doc-a", 0, "10.1/a", "Paper A"),
            scored("doc-b", 0, "", "Paper B"),
            scored("doc-a", 1, "10.1/a", "Paper A"),
        ];
        let mut methods = PaperSection::new("Methods", "How");
        methods.chunks_used = vec![
            scored("doc-c", 0, "10.1/c", "Paper C"),
            scored("doc-b", 3, "", "Paper B"),
        ];

        let paper = PaperResult {
            topic: "t".into(),
            domain: "d".into(),
            sections: vec![intro, methods],
        };

        let sources = paper.sources();
        let titles: Vec<_> = sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Paper A", "Paper B", "Paper C"]);
        let numbers: Vec<_> = sources.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_markdown_keeps_section_order() {
        let mut a = PaperSection::new("First", "one");
        a.synthesis = "Alpha text.".into();
        let mut b = PaperSection::new("Second", "two");
        b.synthesis = "Beta text.".into();
        b.chunks_used = vec![scored("doc", 0, "10.1/x", "X")];

        let paper = PaperResult {
            topic: "Topic".into(),
            domain: "d".into(),
            sections: vec![a, b],
        };
        let md = paper.to_markdown();

        let first = md.find("## First").unwrap();
        let second = md.find("## Second").unwrap();
        let refs = md.find("## References").unwrap();
        assert!(md.starts_with("# Topic"));
        assert!(first < second && second < refs);
        assert!(md.contains("1. Davis AK (2021). X. https://doi.org/10.1/x"));
        assert_eq!(paper.total_words(), 4);
    }

    #[test]
    fn test_markdown_layout_without_sources() {
        let mut section = PaperSection::new("Intro", "why");
        section.synthesis = "  Body text.\n".into();
        let paper = PaperResult {
            topic: "Topic".into(),
            domain: "d".into(),
            sections: vec![section],
        };
        assert_eq!(paper.to_markdown(), "# Topic\n\n## Intro\n\nBody text.\n\n");
    }
}
