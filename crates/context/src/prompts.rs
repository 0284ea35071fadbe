//! Prompt construction
//!
//! Every model call is a system message carrying the retrieved sources and a
//! user message carrying the task. Task prompts that expect structured output
//! describe the JSON shape the validation parsers read.

use opensynthesis_common::llm::ChatMessage;
use opensynthesis_common::models::ScoredChunk;

/// Separator between source blocks in the context
pub const SOURCE_SEPARATOR: &str = "\n\n---\n\n";

/// Render chunks as numbered source blocks.
///
/// Each block is `[SOURCE i: authors (year) | source_type]` followed by the
/// chunk text; numbering starts at 1 and follows retrieval order.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, rc)| {
            let chunk = &rc.chunk;
            format!(
                "[SOURCE {}: {} ({}) | {}]\n{}",
                i + 1,
                chunk.authors(),
                chunk.year(),
                chunk.source_type(),
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join(SOURCE_SEPARATOR)
}

pub fn system_message(context: &str) -> String {
    format!(
        "You are a research synthesis tool. Synthesize the following retrieved source material \
         accurately and cite sources inline.\n\n<retrieved_sources>\n{}\n</retrieved_sources>",
        context
    )
}

/// System + user message pair sent to the backend
pub fn messages(prompt: &str, context: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_message(context)),
        ChatMessage::user(prompt),
    ]
}

pub fn synthesis(question: &str) -> String {
    format!(
        "Research question: {question}\n\n\
         Write a synthesis of the evidence in the retrieved sources that answers the question.\n\
         - Cite every factual claim inline with its source number, e.g. [SOURCE 2].\n\
         - Only state what the sources support. Say so explicitly where evidence is missing.\n\
         - Point out where sources disagree and how their methods or samples differ.\n\
         - Close with a short paragraph on the overall strength of the evidence."
    )
}

pub fn citation_check(synthesis: &str, sources: &str) -> String {
    format!(
        "Check every citation in the synthesis below against the numbered sources.\n\n\
         <synthesis>\n{synthesis}\n</synthesis>\n\n\
         <sources>\n{sources}\n</sources>\n\n\
         Respond with only a JSON object of this form:\n\
         {{\"valid\": [<citation numbers that support their claim>], \
         \"invalid\": [{{\"citation\": <number>, \"claim\": \"<claim text>\", \"issue\": \"<what is wrong>\"}}], \
         \"uncited_claims\": [\"<factual claims with no citation>\"]}}"
    )
}

pub fn hallucination_check(synthesis: &str, sources: &str) -> String {
    format!(
        "Identify statements in the synthesis below that are not supported by the sources: \
         fabricated findings, wrong numbers, overstated conclusions, or details absent from every source.\n\n\
         <synthesis>\n{synthesis}\n</synthesis>\n\n\
         <sources>\n{sources}\n</sources>\n\n\
         Respond with only a JSON object of this form:\n\
         {{\"clean\": <true if nothing is unsupported>, \
         \"flags\": [{{\"type\": \"fabrication|misquote|overstatement|unsupported\", \
         \"text\": \"<offending statement>\", \"explanation\": \"<why>\"}}]}}"
    )
}

pub fn uncertainty(synthesis: &str, sources: &str) -> String {
    format!(
        "Assess how well the sources support the conclusions of the synthesis below.\n\n\
         <synthesis>\n{synthesis}\n</synthesis>\n\n\
         <sources>\n{sources}\n</sources>\n\n\
         Respond with only a JSON object of this form:\n\
         {{\"confidence\": \"well_supported|limited|contested|insufficient\", \
         \"reasoning\": \"<one paragraph>\", \"key_gaps\": [\"<missing evidence>\"]}}"
    )
}

pub fn outline(topic: &str) -> String {
    format!(
        "Plan a research review on the topic: {topic}\n\n\
         Produce between 4 and 8 sections covering background, evidence, open debates and \
         future directions. Output one line per section and nothing else, in exactly this format:\n\
         SECTION: <title> | <one-sentence description of what the section covers>"
    )
}

pub fn section_queries(topic: &str, section_title: &str, section_description: &str) -> String {
    format!(
        "A review on \"{topic}\" has a section titled \"{section_title}\": {section_description}\n\n\
         Write up to 3 literature search queries that would find peer-reviewed papers for this \
         section. Output one query per line with no numbering or commentary."
    )
}

pub fn section_synthesis(topic: &str, section_title: &str, section_description: &str) -> String {
    format!(
        "You are writing the \"{section_title}\" section of a review on \"{topic}\".\n\
         Section scope: {section_description}\n\n\
         Write the section body from the retrieved sources only. Cite every claim inline with \
         its source number, e.g. [SOURCE 3]. Do not repeat the section title."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensynthesis_common::models::{Chunk, ChunkMetadata, RetrievalMethod};

    fn scored(doc: &str, text: &str, meta: &[(&str, &str)]) -> ScoredChunk {
        let metadata: ChunkMetadata = meta
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ScoredChunk::new(
            Chunk::new(doc, 0, text).with_metadata(metadata),
            0.1,
            RetrievalMethod::Hybrid,
        )
    }

    #[test]
    fn test_format_context_blocks() {
        let chunks = vec![
            scored(
                "a",
                "First body.",
                &[("authors", "Davis, Barrett"), ("year", "2021"), ("source_type", "openalex")],
            ),
            scored("b", "Second body.", &[]),
        ];

        assert_eq!(
            format_context(&chunks),
            "[SOURCE 1: Davis, Barrett (2021) | openalex]\nFirst body.\n\n---\n\n\
             [SOURCE 2: Unknown (n.d.) | ]\nSecond body."
        );
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_messages_wrap_context() {
        let msgs = messages("Summarise", "[SOURCE 1: X (2020) | crossref]\nbody");
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].content.contains("<retrieved_sources>\n[SOURCE 1"));
        assert!(msgs[0].content.ends_with("</retrieved_sources>"));
        assert_eq!(msgs[1].content, "Summarise");
    }

    #[test]
    fn test_templates_embed_inputs() {
        assert!(synthesis("Does X work?").contains("Does X work?"));
        assert!(citation_check("SYN", "SRC").contains("<synthesis>\nSYN\n</synthesis>"));
        assert!(hallucination_check("SYN", "SRC").contains("\"clean\""));
        assert!(uncertainty("SYN", "SRC").contains("well_supported"));
        assert!(outline("Sleep").contains("SECTION: <title> | "));
        assert!(section_queries("T", "Intro", "Why").contains("\"Intro\": Why"));
        assert!(section_synthesis("T", "Intro", "Why").contains("Section scope: Why"));
    }
}
