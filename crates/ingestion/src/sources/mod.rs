//! External literature data sources
//!
//! Each connector implements [`DataSource`]; the [`SourceRegistry`] maps
//! names to instances so callers can select sources by name.

mod crossref;
mod openalex;
mod semantic_scholar;

pub use crossref::CrossrefSource;
pub use openalex::OpenAlexSource;
pub use semantic_scholar::SemanticScholarSource;

use async_trait::async_trait;
use opensynthesis_common::errors::{AppError, Result};
use opensynthesis_common::models::Document;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Request timeout shared by all connectors
pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Polite-pool identification for APIs that ask for it
pub const USER_AGENT: &str = "OpenSynthesis/0.1 (mailto:support@opensynthesis.dev)";

/// Descriptive metadata about a source
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub description: &'static str,
    pub auth_required: bool,
    pub data_type: &'static str,
    pub rate_limit: &'static str,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn info(&self) -> SourceInfo;

    /// Search the source and return up to `max_results` documents
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Document>>;

    /// Fetch one document by identifier; `None` when the source has no such record
    async fn fetch(&self, identifier: &str) -> Result<Option<Document>>;

    /// Release outbound connections
    async fn close(&self) {}
}

/// Map a non-success response to a source error
pub(crate) async fn status_error(source_name: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AppError::Source {
        source_name: source_name.to_string(),
        message: format!("HTTP {}: {}", status, opensynthesis_common::errors::truncate_chars(&body, 200)),
    }
}

/// Named collection of data sources, in registration order
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<(String, Arc<dyn DataSource>)>,
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with all shipped connectors
    pub fn with_defaults() -> Self {
        Self::empty()
            .register("semantic_scholar", Arc::new(SemanticScholarSource::new()))
            .register("openalex", Arc::new(OpenAlexSource::new()))
            .register("crossref", Arc::new(CrossrefSource::new()))
    }

    /// Add or replace a source
    pub fn register(mut self, name: impl Into<String>, source: Arc<dyn DataSource>) -> Self {
        let name = name.into();
        self.sources.retain(|(n, _)| *n != name);
        self.sources.push((name, source));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.sources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.clone())
    }

    /// Sources named in `names`, or all when `None`/empty; unknown names are skipped
    pub fn select(&self, names: Option<&[String]>) -> Vec<(String, Arc<dyn DataSource>)> {
        match names {
            Some(names) if !names.is_empty() => names
                .iter()
                .filter_map(|name| {
                    let source = self.get(name);
                    if source.is_none() {
                        tracing::warn!(source = %name, "Unknown data source ignored");
                    }
                    source.map(|s| (name.clone(), s))
                })
                .collect(),
            _ => self.sources.clone(),
        }
    }

    pub fn info(&self) -> Vec<(String, SourceInfo)> {
        self.sources
            .iter()
            .map(|(n, s)| (n.clone(), s.info()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = SourceRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["semantic_scholar", "openalex", "crossref"]);
        assert!(registry.get("openalex").is_some());
        assert!(registry.get("arxiv").is_none());
    }

    #[test]
    fn test_select_by_name_skips_unknown() {
        let registry = SourceRegistry::with_defaults();
        let names = vec!["crossref".to_string(), "nope".to_string()];
        let selected = registry.select(Some(&names));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, "crossref");

        assert_eq!(registry.select(None).len(), 3);
        assert_eq!(registry.select(Some(&[])).len(), 3);
    }

    #[test]
    fn test_register_replaces() {
        let registry = SourceRegistry::with_defaults().register("crossref", Arc::new(CrossrefSource::new()));
        assert_eq!(registry.names().len(), 3);
    }

    #[test]
    fn test_info_listing() {
        let info = SourceRegistry::with_defaults().info();
        assert!(info.iter().all(|(_, i)| !i.description.is_empty()));
    }
}
