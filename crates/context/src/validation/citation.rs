//! Citation verification pass

use super::ModelOutput;
use opensynthesis_common::models::CitationCheck;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct CitationReport {
    #[serde(default)]
    valid: Vec<Value>,
    #[serde(default)]
    invalid: Vec<Value>,
    #[serde(default)]
    uncited_claims: Vec<Value>,
}

/// Parse the citation-check output into a [`CitationCheck`]
pub fn check_citations(raw: &str) -> CitationCheck {
    match ModelOutput::<CitationReport>::parse(raw) {
        ModelOutput::Parsed(report) => CitationCheck::Checked {
            valid: report.valid,
            invalid: report.invalid,
            uncited_claims: report.uncited_claims,
            parse_error: false,
        },
        ModelOutput::Unparseable(raw) => CitationCheck::unparsed(raw),
    }
}
