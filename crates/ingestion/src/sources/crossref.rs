//! Crossref works API

use super::{status_error, DataSource, SourceInfo, SOURCE_TIMEOUT, USER_AGENT};
use async_trait::async_trait;
use opensynthesis_common::errors::Result;
use opensynthesis_common::http::LazyClient;
use opensynthesis_common::models::Document;
use regex_lite::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::sync::OnceLock;

const BASE_URL: &str = "https://api.crossref.org/works";
const NAME: &str = "crossref";

pub struct CrossrefSource {
    http: LazyClient,
}

#[derive(Deserialize)]
struct Envelope<T> {
    message: T,
}

#[derive(Deserialize)]
struct ItemList {
    #[serde(default)]
    items: Vec<Work>,
}

#[derive(Deserialize)]
struct Work {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<Author>,
    #[serde(default, rename = "published-print")]
    published_print: Option<DateParts>,
    #[serde(default, rename = "published-online")]
    published_online: Option<DateParts>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default, rename = "DOI")]
    doi: Option<String>,
    #[serde(default, rename = "URL")]
    url: Option<String>,
}

#[derive(Deserialize)]
struct Author {
    #[serde(default)]
    given: Option<String>,
    #[serde(default)]
    family: Option<String>,
}

#[derive(Deserialize)]
struct DateParts {
    #[serde(default, rename = "date-parts")]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl DateParts {
    fn year(&self) -> Option<i32> {
        self.date_parts.first().and_then(|p| p.first().copied().flatten())
    }
}

/// Strip JATS/XML markup that Crossref embeds in abstracts
fn strip_markup(text: &str) -> String {
    static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
    let stripped = match TAGS.get_or_init(|| Regex::new(r"<[^>]+>").ok()) {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_string(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Work {
    fn into_document(self) -> Document {
        let title = self.title.into_iter().next().unwrap_or_default();
        let doi = self.doi.unwrap_or_default();

        let source_id = if doi.is_empty() {
            format!("crossref:{}", title.chars().take(40).collect::<String>())
        } else {
            format!("doi:{}", doi)
        };

        let year = self
            .published_print
            .as_ref()
            .or(self.published_online.as_ref())
            .and_then(DateParts::year);

        let mut doc = Document::new(source_id, NAME, title);
        doc.authors = self
            .author
            .into_iter()
            .map(|a| {
                format!("{} {}", a.given.unwrap_or_default(), a.family.unwrap_or_default())
                    .trim()
                    .to_string()
            })
            .filter(|name| !name.is_empty())
            .collect();
        doc.year = year;
        doc.abstract_text = self
            .abstract_text
            .map(|a| strip_markup(&a))
            .filter(|a| !a.is_empty());
        doc.doi = Some(doi).filter(|d| !d.is_empty());
        doc.url = self.url;
        doc
    }
}

impl CrossrefSource {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        Self {
            http: LazyClient::with_headers(SOURCE_TIMEOUT, headers),
        }
    }
}

impl Default for CrossrefSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for CrossrefSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            description: "DOI resolution and bibliographic metadata via CrossRef",
            auth_required: false,
            data_type: "metadata",
            rate_limit: "50 requests/sec with polite pool (mailto header)",
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Document>> {
        let http = self.http.get().await?;
        let rows = max_results.to_string();
        let response = http
            .get(BASE_URL)
            .query(&[("query", query), ("rows", rows.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(NAME, response).await);
        }

        let body: Envelope<ItemList> = response.json().await?;
        Ok(body.message.items.into_iter().map(Work::into_document).collect())
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<Document>> {
        let http = self.http.get().await?;
        let response = http.get(format!("{}/{}", BASE_URL, identifier)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(NAME, response).await);
        }

        let body: Envelope<Work> = response.json().await?;
        Ok(Some(body.message.into_document()))
    }

    async fn close(&self) {
        self.http.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("<jats:p>Background:   we\n<jats:italic>did</jats:italic> it</jats:p>"),
            "Background: we did it"
        );
    }

    #[test]
    fn test_item_to_document() {
        let body = r#"{"status": "ok", "message": {"items": [{
            "title": ["Effects of psilocybin"],
            "author": [{"given": "Alan", "family": "Davis"}, {"family": "Barrett"}, {}],
            "published-online": {"date-parts": [[2020, 11]]},
            "published-print": {"date-parts": [[2021, 5, 1]]},
            "abstract": "<jats:p>Importance</jats:p>",
            "DOI": "10.1001/jamapsychiatry.2020.3285",
            "URL": "http://dx.doi.org/10.1001/jamapsychiatry.2020.3285"
        }]}}"#;

        let parsed: Envelope<ItemList> = serde_json::from_str(body).unwrap();
        let doc = parsed.message.items.into_iter().next().unwrap().into_document();

        assert_eq!(doc.source_id, "doi:10.1001/jamapsychiatry.2020.3285");
        assert_eq!(doc.title, "Effects of psilocybin");
        assert_eq!(doc.authors, vec!["Alan Davis", "Barrett"]);
        assert_eq!(doc.year, Some(2021));
        assert_eq!(doc.abstract_text.as_deref(), Some("Importance"));
    }

    #[test]
    fn test_item_without_doi() {
        let work: Work = serde_json::from_str(
            r#"{"title": ["A very long title that certainly exceeds forty characters"],
                "published-online": {"date-parts": [[null]]}}"#,
        )
        .unwrap();
        let doc = work.into_document();

        assert_eq!(doc.source_id, "crossref:A very long title that certainly exceeds");
        assert!(doc.doi.is_none());
        assert!(doc.year.is_none());
    }
}
