//! Source document returned by data-source connectors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A document retrieved from an external data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Provider-qualified id, e.g. `s2:abc123`
    pub source_id: String,

    /// Provider name, e.g. `semantic_scholar`
    pub source_type: String,

    pub title: String,

    #[serde(default)]
    pub authors: Vec<String>,

    pub year: Option<i32>,
    pub doi: Option<String>,
    pub abstract_text: Option<String>,
    pub full_text: Option<String>,
    pub url: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    pub fetched_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        source_id: impl Into<String>,
        source_type: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_type: source_type.into(),
            title: title.into(),
            authors: Vec::new(),
            year: None,
            doi: None,
            abstract_text: None,
            full_text: None,
            url: None,
            metadata: HashMap::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Deduplication key: DOI when present, otherwise the source id
    pub fn dedup_key(&self) -> &str {
        match self.doi.as_deref() {
            Some(doi) if !doi.is_empty() => doi,
            _ => &self.source_id,
        }
    }

    /// Text to chunk: full text preferred, abstract as fallback
    pub fn body(&self) -> Option<&str> {
        self.full_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.abstract_text.as_deref().filter(|t| !t.trim().is_empty()))
    }
}
