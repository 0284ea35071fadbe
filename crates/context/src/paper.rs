//! Multi-section paper generation
//!
//! outline -> for each section (queries -> ingest -> retrieve -> synthesize)
//! -> assembled [`PaperResult`]. Sections are processed strictly in order.

use crate::prompts;
use crate::synthesizer::Synthesizer;
use opensynthesis_common::errors::{AppError, Result};
use opensynthesis_common::models::{PaperResult, PaperSection, ScoredChunk};
use opensynthesis_ingestion::Corpus;
use regex_lite::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, instrument, warn};

pub const OUTLINE_TEMPERATURE: f32 = 0.4;
pub const OUTLINE_MAX_TOKENS: usize = 2048;
pub const QUERY_TEMPERATURE: f32 = 0.3;
pub const QUERY_MAX_TOKENS: usize = 512;

/// Search queries kept per section
pub const MAX_QUERIES_PER_SECTION: usize = 3;

static SECTION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn section_pattern() -> &'static Regex {
    SECTION_PATTERN.get_or_init(|| Regex::new(r"^SECTION:\s*(.+?)\s*\|\s*(.+)$").unwrap())
}

/// Parse `SECTION: Title | Description` lines.
///
/// Fails with [`AppError::OutlineParse`] carrying the raw text when no line
/// matches.
pub fn parse_outline(text: &str) -> Result<Vec<PaperSection>> {
    let pattern = section_pattern();
    let sections: Vec<PaperSection> = text
        .lines()
        .filter_map(|line| pattern.captures(line.trim()))
        .filter_map(|caps| {
            let title = caps.get(1)?.as_str().trim();
            let description = caps.get(2)?.as_str().trim();
            Some(PaperSection::new(title, description))
        })
        .collect();

    if sections.is_empty() {
        return Err(AppError::OutlineParse { raw: text.to_string() });
    }
    Ok(sections)
}

/// Non-empty trimmed lines, capped at [`MAX_QUERIES_PER_SECTION`]
pub fn parse_queries(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .take(MAX_QUERIES_PER_SECTION)
        .map(str::to_string)
        .collect()
}

pub struct PaperPipeline {
    synthesizer: Arc<Synthesizer>,
    corpus: Arc<dyn Corpus>,
}

impl PaperPipeline {
    pub fn new(synthesizer: Arc<Synthesizer>, corpus: Arc<dyn Corpus>) -> Self {
        Self { synthesizer, corpus }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, topic: &str, domain: &str) -> Result<PaperResult> {
        let mut sections = self.outline(topic).await?;
        info!(sections = sections.len(), "Generated outline");

        let mut ingested_chunks = 0;

        for (i, section) in sections.iter_mut().enumerate() {
            info!(section = i + 1, title = %section.title, "Processing section");

            section.search_queries = self.queries(topic, section).await?;

            // Connector failures are absorbed per source inside the corpus
            for query in &section.search_queries {
                let report = self.corpus.ingest(query, domain).await?;
                info!(query = %query, documents = report.documents, chunks = report.chunks, "Ingested");
                ingested_chunks += report.chunks;
            }

            section.chunks_used = self
                .retrieve(&section.retrieval_query(), domain, ingested_chunks)
                .await?;

            let prompt = prompts::section_synthesis(topic, &section.title, &section.description);
            let context = prompts::format_context(&section.chunks_used);
            let inference = self.synthesizer.inference();
            section.synthesis = self
                .synthesizer
                .generate_raw(&prompt, &context, inference.temperature, inference.max_new_tokens)
                .await?;

            info!(words = section.word_count(), chunks = section.chunks_used.len(), "Section done");
        }

        let paper = PaperResult {
            topic: topic.to_string(),
            domain: domain.to_string(),
            sections,
        };
        info!(sections = paper.sections.len(), words = paper.total_words(), "Paper complete");
        Ok(paper)
    }

    async fn outline(&self, topic: &str) -> Result<Vec<PaperSection>> {
        let text = self
            .synthesizer
            .generate_raw(&prompts::outline(topic), "", OUTLINE_TEMPERATURE, OUTLINE_MAX_TOKENS)
            .await?;
        parse_outline(&text)
    }

    async fn queries(&self, topic: &str, section: &PaperSection) -> Result<Vec<String>> {
        let prompt = prompts::section_queries(topic, &section.title, &section.description);
        let text = self
            .synthesizer
            .generate_raw(&prompt, "", QUERY_TEMPERATURE, QUERY_MAX_TOKENS)
            .await?;
        Ok(parse_queries(&text))
    }

    /// A domain that ingestion never created yields no evidence
    async fn retrieve(&self, query: &str, domain: &str, ingested_chunks: usize) -> Result<Vec<ScoredChunk>> {
        match self.synthesizer.retrieve(query, domain).await {
            Err(AppError::DomainNotFound { .. }) if ingested_chunks == 0 => {
                warn!(domain, "Nothing ingested into domain, section has no evidence");
                Ok(Vec::new())
            }
            other => other,
        }
    }
}
