//! Semantic Scholar Graph API

use super::{status_error, DataSource, SourceInfo, SOURCE_TIMEOUT};
use async_trait::async_trait;
use opensynthesis_common::errors::Result;
use opensynthesis_common::http::LazyClient;
use opensynthesis_common::models::Document;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const FIELDS: &str = "paperId,title,abstract,authors,year,externalIds,url";
const NAME: &str = "semantic_scholar";

pub struct SemanticScholarSource {
    api_key: Option<String>,
    http: LazyClient,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    paper_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    external_ids: Option<HashMap<String, Value>>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct Author {
    #[serde(default)]
    name: Option<String>,
}

impl Paper {
    fn into_document(self) -> Document {
        let doi = self
            .external_ids
            .as_ref()
            .and_then(|ids| ids.get("DOI"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut doc = Document::new(format!("s2:{}", self.paper_id), NAME, self.title.unwrap_or_default());
        doc.authors = self.authors.into_iter().filter_map(|a| a.name).collect();
        doc.year = self.year;
        doc.doi = doi;
        doc.abstract_text = self.abstract_text;
        doc.url = self.url;
        doc
    }
}

impl SemanticScholarSource {
    pub fn new() -> Self {
        Self {
            api_key: None,
            http: LazyClient::new(SOURCE_TIMEOUT),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }
}

impl Default for SemanticScholarSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for SemanticScholarSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            description: "Search academic papers via Semantic Scholar API",
            auth_required: false,
            data_type: "papers",
            rate_limit: "100 requests/5 min (unauthenticated)",
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Document>> {
        let http = self.http.get().await?;
        let limit = max_results.to_string();
        let request = http
            .get(format!("{}/paper/search", BASE_URL))
            .query(&[("query", query), ("limit", limit.as_str()), ("fields", FIELDS)]);

        let response = self.authorize(request).send().await?;
        if !response.status().is_success() {
            return Err(status_error(NAME, response).await);
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.data.into_iter().map(Paper::into_document).collect())
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<Document>> {
        let http = self.http.get().await?;
        let request = http
            .get(format!("{}/paper/{}", BASE_URL, identifier))
            .query(&[("fields", FIELDS)]);

        let response = self.authorize(request).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(NAME, response).await);
        }

        let paper: Paper = response.json().await?;
        Ok(Some(paper.into_document()))
    }

    async fn close(&self) {
        self.http.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_to_document() {
        let body = r#"{
            "total": 1,
            "data": [{
                "paperId": "abc123",
                "title": "Psilocybin for depression",
                "abstract": "We ran a trial.",
                "authors": [{"authorId": "1", "name": "A. Davis"}, {"authorId": "2", "name": "F. Barrett"}],
                "year": 2021,
                "externalIds": {"DOI": "10.1001/jama.2020", "CorpusId": 229},
                "url": "https://www.semanticscholar.org/paper/abc123"
            }]
        }"#;

        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let doc = parsed.data.into_iter().next().unwrap().into_document();

        assert_eq!(doc.source_id, "s2:abc123");
        assert_eq!(doc.source_type, "semantic_scholar");
        assert_eq!(doc.authors, vec!["A. Davis", "F. Barrett"]);
        assert_eq!(doc.year, Some(2021));
        assert_eq!(doc.doi.as_deref(), Some("10.1001/jama.2020"));
        assert_eq!(doc.abstract_text.as_deref(), Some("We ran a trial."));
    }

    #[test]
    fn test_sparse_paper() {
        let paper: Paper = serde_json::from_str(r#"{"paperId":"x","externalIds":null}"#).unwrap();
        let doc = paper.into_document();
        assert_eq!(doc.title, "");
        assert!(doc.doi.is_none());
        assert!(doc.authors.is_empty());
    }
}
