//! OpenAlex works API

use super::{status_error, DataSource, SourceInfo, SOURCE_TIMEOUT, USER_AGENT};
use async_trait::async_trait;
use opensynthesis_common::errors::Result;
use opensynthesis_common::http::LazyClient;
use opensynthesis_common::models::Document;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

const BASE_URL: &str = "https://api.openalex.org";
const NAME: &str = "openalex";

pub struct OpenAlexSource {
    api_key: Option<String>,
    http: LazyClient,
}

#[derive(Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Deserialize)]
struct Work {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    #[serde(default)]
    publication_year: Option<i32>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
}

#[derive(Deserialize)]
struct Authorship {
    #[serde(default)]
    author: Option<AuthorRef>,
}

#[derive(Deserialize)]
struct AuthorRef {
    #[serde(default)]
    display_name: Option<String>,
}

/// Rebuild plain text from OpenAlex's word -> positions index
fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut words: BTreeMap<usize, &str> = BTreeMap::new();
    for (word, positions) in index {
        for pos in positions {
            words.insert(*pos, word.as_str());
        }
    }
    words.into_values().collect::<Vec<_>>().join(" ")
}

impl Work {
    fn into_document(self) -> Document {
        let short_id = self
            .id
            .as_deref()
            .and_then(|id| id.rsplit('/').next())
            .unwrap_or_default()
            .to_string();

        let abstract_text = self
            .abstract_inverted_index
            .as_ref()
            .filter(|idx| !idx.is_empty())
            .map(rebuild_abstract);

        let doi = self
            .doi
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| d.trim_start_matches("https://doi.org/").to_string());

        let mut doc = Document::new(format!("openalex:{}", short_id), NAME, self.title.unwrap_or_default());
        doc.authors = self
            .authorships
            .into_iter()
            .filter_map(|a| a.author.and_then(|r| r.display_name))
            .filter(|name| !name.is_empty())
            .collect();
        doc.year = self.publication_year;
        doc.abstract_text = abstract_text;
        doc.url = self.doi.filter(|d| !d.is_empty()).or(self.id);
        doc.doi = doi;
        doc
    }
}

impl OpenAlexSource {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        Self {
            api_key: None,
            http: LazyClient::with_headers(SOURCE_TIMEOUT, headers),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

impl Default for OpenAlexSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for OpenAlexSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            description: "Large-scale academic paper search via OpenAlex",
            auth_required: false,
            data_type: "papers",
            rate_limit: "10 requests/sec (polite pool with mailto)",
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Document>> {
        let http = self.http.get().await?;
        let per_page = max_results.to_string();
        let mut params = vec![("search", query), ("per_page", per_page.as_str())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }

        let response = http.get(format!("{}/works", BASE_URL)).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(status_error(NAME, response).await);
        }

        let body: WorksResponse = response.json().await?;
        Ok(body.results.into_iter().map(Work::into_document).collect())
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<Document>> {
        let http = self.http.get().await?;
        let response = http.get(format!("{}/works/{}", BASE_URL, identifier)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(NAME, response).await);
        }

        let work: Work = response.json().await?;
        Ok(Some(work.into_document()))
    }

    async fn close(&self) {
        self.http.close().await;
    }
}
