//! Uncertainty assessment pass

use super::ModelOutput;
use opensynthesis_common::models::ConfidenceLevel;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct UncertaintyReport {
    #[serde(default)]
    confidence: Option<String>,
}

/// Confidence level from the assessment output, and whether the output parsed.
///
/// Missing, unknown and unparseable values all map to `Insufficient`.
pub fn assess_uncertainty(raw: &str) -> (ConfidenceLevel, bool) {
    match ModelOutput::<UncertaintyReport>::parse(raw) {
        ModelOutput::Parsed(report) => {
            let level = report
                .confidence
                .and_then(|c| c.parse().ok())
                .unwrap_or(ConfidenceLevel::Insufficient);
            (level, true)
        }
        ModelOutput::Unparseable(_) => (ConfidenceLevel::Insufficient, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_case_insensitive() {
        assert_eq!(
            assess_uncertainty(r#"{"confidence": "WELL_SUPPORTED"}"#),
            (ConfidenceLevel::WellSupported, true)
        );
        assert_eq!(
            assess_uncertainty(r#"{"confidence": "contested", "key_gaps": []}"#).0,
            ConfidenceLevel::Contested
        );
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(
            assess_uncertainty(r#"{"confidence": "very high"}"#).0,
            ConfidenceLevel::Insufficient
        );
        assert_eq!(assess_uncertainty("{}").0, ConfidenceLevel::Insufficient);
        assert_eq!(
            assess_uncertainty("I think it's limited"),
            (ConfidenceLevel::Insufficient, false)
        );
    }
}
