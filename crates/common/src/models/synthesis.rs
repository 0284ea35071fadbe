//! Synthesis result and validation outcome types

use super::ScoredChunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Evidence strength assessed by the uncertainty pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    WellSupported,
    Limited,
    Contested,
    Insufficient,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::WellSupported => "well_supported",
            ConfidenceLevel::Limited => "limited",
            ConfidenceLevel::Contested => "contested",
            ConfidenceLevel::Insufficient => "insufficient",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidenceLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "well_supported" => Ok(ConfidenceLevel::WellSupported),
            "limited" => Ok(ConfidenceLevel::Limited),
            "contested" => Ok(ConfidenceLevel::Contested),
            "insufficient" => Ok(ConfidenceLevel::Insufficient),
            _ => Err(()),
        }
    }
}

/// Structured outcome of the citation-check pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CitationCheck {
    Checked {
        valid: Vec<serde_json::Value>,
        invalid: Vec<serde_json::Value>,
        uncited_claims: Vec<serde_json::Value>,
        parse_error: bool,
    },
    /// Model output could not be parsed; raw text kept for inspection
    Unparsed { raw: String, parse_error: bool },
}

impl CitationCheck {
    pub fn unparsed(raw: impl Into<String>) -> Self {
        CitationCheck::Unparsed {
            raw: raw.into(),
            parse_error: true,
        }
    }

    pub fn is_parse_error(&self) -> bool {
        match self {
            CitationCheck::Checked { parse_error, .. } => *parse_error,
            CitationCheck::Unparsed { parse_error, .. } => *parse_error,
        }
    }
}

/// Output of the synthesis pipeline, optionally enriched by validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub question: String,
    pub domain: String,
    pub synthesis: String,

    #[serde(default)]
    pub chunks_used: Vec<ScoredChunk>,

    #[serde(default)]
    pub confidence: Option<ConfidenceLevel>,

    #[serde(default)]
    pub citation_check: Option<CitationCheck>,

    #[serde(default)]
    pub hallucination_flags: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl SynthesisResult {
    pub fn new(
        question: impl Into<String>,
        domain: impl Into<String>,
        synthesis: impl Into<String>,
        chunks_used: Vec<ScoredChunk>,
    ) -> Self {
        Self {
            question: question.into(),
            domain: domain.into(),
            synthesis: synthesis.into(),
            chunks_used,
            confidence: None,
            citation_check: None,
            hallucination_flags: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
