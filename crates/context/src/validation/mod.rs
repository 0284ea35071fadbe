//! Model-driven validation of a synthesis
//!
//! Three independent second passes over the synthesis and its sources:
//! citation checking, hallucination detection and uncertainty assessment.
//! Each stage is toggled by [`ValidationConfig`]. Malformed model output
//! never fails a stage; it degrades to a sentinel value.

pub mod citation;
pub mod hallucination;
pub mod uncertainty;

use crate::prompts;
use crate::synthesizer::Synthesizer;
use opensynthesis_common::config::ValidationConfig;
use opensynthesis_common::errors::Result;
use opensynthesis_common::metrics;
use opensynthesis_common::models::SynthesisResult;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{info, instrument};

/// Sampling temperature for every validation pass
pub const VALIDATION_TEMPERATURE: f32 = 0.1;

pub const CITATION_MAX_TOKENS: usize = 2048;
pub const HALLUCINATION_MAX_TOKENS: usize = 2048;
pub const UNCERTAINTY_MAX_TOKENS: usize = 1024;

/// Structured model output, or the raw text when it did not parse
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput<T> {
    Parsed(T),
    Unparseable(String),
}

impl<T: DeserializeOwned> ModelOutput<T> {
    /// Parse JSON, accepting a body wrapped in a markdown code fence
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(strip_code_fence(raw)) {
            Ok(value) => ModelOutput::Parsed(value),
            Err(e) => {
                tracing::debug!(error = %e, "Model output is not the expected JSON");
                ModelOutput::Unparseable(raw.to_string())
            }
        }
    }
}

impl<T> ModelOutput<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ModelOutput::Parsed(_))
    }
}

/// Body of a ```` ``` ```` / ```` ```json ```` fenced block, or the trimmed input
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. `json`) on the opening line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Runs the enabled validation stages against a synthesis
pub struct Validator {
    synthesizer: Arc<Synthesizer>,
    config: ValidationConfig,
}

impl Validator {
    pub fn new(synthesizer: Arc<Synthesizer>, config: ValidationConfig) -> Self {
        Self { synthesizer, config }
    }

    /// Annotate `result` with the outcome of each enabled stage.
    ///
    /// Backend failures (including a held slot) propagate; unparseable
    /// model output does not.
    #[instrument(skip_all, fields(question = %result.question))]
    pub async fn validate(&self, mut result: SynthesisResult) -> Result<SynthesisResult> {
        let sources = prompts::format_context(&result.chunks_used);

        if self.config.citation_check {
            let raw = self
                .run_stage(&prompts::citation_check(&result.synthesis, &sources), CITATION_MAX_TOKENS)
                .await?;
            let check = citation::check_citations(&raw);
            metrics::record_validation_stage("citation", !check.is_parse_error());
            result.citation_check = Some(check);
        }

        if self.config.hallucination_check {
            let raw = self
                .run_stage(
                    &prompts::hallucination_check(&result.synthesis, &sources),
                    HALLUCINATION_MAX_TOKENS,
                )
                .await?;
            let (flags, parsed) = hallucination::check_hallucinations(&raw);
            metrics::record_validation_stage("hallucination", parsed);
            result.hallucination_flags = flags;
        }

        if self.config.uncertainty_quantification {
            let raw = self
                .run_stage(&prompts::uncertainty(&result.synthesis, &sources), UNCERTAINTY_MAX_TOKENS)
                .await?;
            let (confidence, parsed) = uncertainty::assess_uncertainty(&raw);
            metrics::record_validation_stage("uncertainty", parsed);
            result.confidence = Some(confidence);
        }

        info!(
            confidence = ?result.confidence,
            flags = result.hallucination_flags.len(),
            "Validation complete"
        );
        Ok(result)
    }

    async fn run_stage(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        self.synthesizer
            .generate_raw(prompt, "", VALIDATION_TEMPERATURE, max_tokens)
            .await
    }
}
