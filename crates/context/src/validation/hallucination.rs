//! Hallucination detection pass

use super::ModelOutput;
use opensynthesis_common::errors::truncate_chars;
use serde::Deserialize;

/// Characters of raw output quoted in the unparseable flag
const RAW_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct HallucinationReport {
    #[serde(default)]
    clean: bool,
    #[serde(default)]
    flags: Vec<Flag>,
}

#[derive(Debug, Deserialize)]
struct Flag {
    #[serde(rename = "type", default = "unknown_kind")]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    explanation: String,
}

fn unknown_kind() -> String {
    "unknown".to_string()
}

/// Flags rendered as `[type] text: explanation`, and whether the output parsed.
///
/// A report marked clean yields no flags regardless of its flag list.
pub fn check_hallucinations(raw: &str) -> (Vec<String>, bool) {
    match ModelOutput::<HallucinationReport>::parse(raw) {
        ModelOutput::Parsed(report) if report.clean => (Vec::new(), true),
        ModelOutput::Parsed(report) => {
            let flags = report
                .flags
                .into_iter()
                .map(|f| format!("[{}] {}: {}", f.kind, f.text, f.explanation))
                .collect();
            (flags, true)
        }
        ModelOutput::Unparseable(raw) => (
            vec![format!(
                "Unparseable hallucination check output: {}",
                truncate_chars(&raw, RAW_PREVIEW_CHARS)
            )],
            false,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_report() {
        let (flags, parsed) = check_hallucinations(r#"{"clean": true, "flags": [{"type": "x"}]}"#);
        assert!(flags.is_empty());
        assert!(parsed);
    }

    #[test]
    fn test_flags_rendered_with_defaults() {
        let (flags, _) = check_hallucinations(
            r#"{"flags": [
                {"type": "fabrication", "text": "n=400", "explanation": "source says n=40"},
                {"text": "always works"}
            ]}"#,
        );
        assert_eq!(
            flags,
            vec!["[fabrication] n=400: source says n=40", "[unknown] always works: "]
        );
    }

    #[test]
    fn test_unparseable_sentinel_truncated() {
        let raw = "y".repeat(500);
        let (flags, parsed) = check_hallucinations(&raw);
        assert!(!parsed);
        assert_eq!(flags.len(), 1);
        assert_eq!(
            flags[0],
            format!("Unparseable hallucination check output: {}", "y".repeat(200))
        );
    }
}
