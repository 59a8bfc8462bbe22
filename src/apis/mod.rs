pub mod arxiv;
pub mod dblp;
pub mod scholar;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Most results a single search returns, across every host.
pub const RESULT_CAP: usize = 10;

/// One normalized search result. Every host maps into this shape; fields a
/// host cannot supply stay `None` and cross the wire as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: Option<u16>,
    pub venue: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub doi: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub bibtex: BestEffort<String>,
    pub bibtex_url: Option<String>,
    pub pdf_link: Option<String>,
    pub citations: Option<u32>,
}

/// Outcome of a best-effort side fetch. `Unavailable` means the fetch was
/// skipped or failed; it is distinct from a fetched-but-empty value, so
/// callers cannot confuse the two. Serializes untagged: the bare value, or
/// `null` when unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BestEffort<T> {
    Fetched(T),
    #[default]
    Unavailable,
}

impl<T> BestEffort<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            BestEffort::Fetched(v) => Some(v),
            BestEffort::Unavailable => None,
        }
    }
}

/// What a search endpoint hands back: the page of articles plus the
/// host-reported total (which may exceed the page length).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub articles: Vec<Article>,
    pub total_results: u64,
}

impl SearchResults {
    /// Total falls back to the page length when the host did not report one.
    pub fn new(articles: Vec<Article>, reported_total: Option<u64>) -> Self {
        let total_results = reported_total.unwrap_or(articles.len() as u64);
        Self { articles, total_results }
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("API error: {0}")]
    Api(String),
}

/// A scholarly search provider. One search, first page only, capped at
/// [`RESULT_CAP`]; sub-fetches inside `search` are best-effort and never
/// fail the call.
#[async_trait]
pub trait SearchHost: Send + Sync {
    /// Short code used in the `host` query parameter.
    fn code(&self) -> &str;
    /// Display name for listings and error messages.
    fn name(&self) -> &str;
    async fn search(&self, query: &str) -> Result<SearchResults, HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article {
            id: "dblp:123".into(),
            title: "A Paper.".into(),
            authors: vec!["Ada Lovelace".into()],
            abstract_text: None,
            year: Some(2021),
            venue: Some("ICML".into()),
            kind: Some("Conference and Workshop Papers".into()),
            doi: None,
            url: Some("https://dblp.org/rec/conf/icml/L21".into()),
            bibtex: BestEffort::Unavailable,
            bibtex_url: None,
            pdf_link: None,
            citations: None,
        }
    }

    #[test]
    fn test_best_effort_serializes_as_value_or_null() {
        let fetched: BestEffort<String> = BestEffort::Fetched("@article{}".into());
        assert_eq!(serde_json::to_value(&fetched).unwrap(), serde_json::json!("@article{}"));
        let missing: BestEffort<String> = BestEffort::Unavailable;
        assert_eq!(serde_json::to_value(&missing).unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_best_effort_deserializes_null_as_unavailable() {
        let v: BestEffort<String> = serde_json::from_str("null").unwrap();
        assert_eq!(v, BestEffort::Unavailable);
        let v: BestEffort<String> = serde_json::from_str("\"@misc{x}\"").unwrap();
        assert_eq!(v, BestEffort::Fetched("@misc{x}".into()));
    }

    #[test]
    fn test_article_wire_shape_is_camel_case_with_nulls() {
        let json = serde_json::to_value(article()).unwrap();
        assert_eq!(json["id"], "dblp:123");
        assert_eq!(json["type"], "Conference and Workshop Papers");
        assert!(json["abstract"].is_null());
        assert!(json["bibtex"].is_null());
        assert!(json["pdfLink"].is_null());
        assert!(json.get("pdf_link").is_none());
    }

    #[test]
    fn test_article_round_trips_without_bibtex_field() {
        // Saved metadata from older folders may predate the bibtex field.
        let json = r#"{"id":"arxiv:1","title":"T","authors":[],"abstract":null,
            "year":null,"venue":null,"type":null,"doi":null,"url":null,
            "bibtexUrl":null,"pdfLink":null,"citations":null}"#;
        let a: Article = serde_json::from_str(json).unwrap();
        assert_eq!(a.bibtex, BestEffort::Unavailable);
    }

    #[test]
    fn test_total_falls_back_to_page_length() {
        let r = SearchResults::new(vec![article(), article()], None);
        assert_eq!(r.total_results, 2);
        let r = SearchResults::new(vec![article()], Some(812));
        assert_eq!(r.total_results, 812);
    }
}
