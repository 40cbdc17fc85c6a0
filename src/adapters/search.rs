//! Search adapter (C5) — a Google search proxy accessed over HTTP.
//!
//! The provider's endpoint accepts a batch of query objects in one POST body
//! and returns a position-matched array of results; this adapter issues that
//! request with a batch of exactly one query per call (`search_one`), which
//! keeps every call shaped the way the provider's real batch endpoint reads
//! a request while letting the caller fan queries out under the bounded
//! executor (C3) rather than serializing them behind one giant POST. See
//! DESIGN.md for the batching/fan-out tradeoff this resolves.
//!
//! Never panics; parse failures for a sub-response yield an empty entry
//! rather than failing the whole call. Empty input returns empty output.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClassifiedError;
use crate::retry::{run_with_retry, RetryPolicy};

use super::send_classified;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResultItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub position: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchQueryResult {
    pub query: String,
    pub results: Vec<SearchResultItem>,
    pub total_results: u64,
    pub related_queries: Vec<String>,
    pub error: Option<ClassifiedError>,
}

pub struct SearchAdapter {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    deadline: Duration,
}

impl SearchAdapter {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, deadline: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            deadline,
        }
    }

    /// Search adapter's retry policy: retryable on `{429, 500, 502, 503, 504}` (§4.2).
    pub fn retry_policy() -> RetryPolicy {
        RetryPolicy::for_search()
    }

    /// Run a single query, retrying per [`Self::retry_policy`]. Never returns
    /// `Err` — a final failure is folded into `SearchQueryResult.error`.
    pub async fn search_one(&self, query: &str) -> SearchQueryResult {
        let policy = Self::retry_policy();
        let query_owned = query.to_string();
        let result = run_with_retry(
            |_attempt| {
                let query = query_owned.clone();
                async move { self.call(&query, None).await }
            },
            &policy,
        )
        .await;
        match result {
            Ok(mut parsed) => {
                parsed.query = query.to_string();
                parsed
            }
            Err(err) => SearchQueryResult {
                query: query.to_string(),
                error: Some(err),
                ..Default::default()
            },
        }
    }

    /// Reddit-scoped variant: appends `site:reddit.com` and an optional date
    /// filter to the query string before issuing the same single-query call.
    pub async fn search_reddit_one(&self, query: &str, date_filter: Option<&str>) -> SearchQueryResult {
        let policy = Self::retry_policy();
        let scoped = reddit_scoped_query(query, date_filter);
        let original_query = query.to_string();
        let result = run_with_retry(
            |_attempt| {
                let scoped = scoped.clone();
                async move { self.call(&scoped, None).await }
            },
            &policy,
        )
        .await;
        match result {
            Ok(mut parsed) => {
                parsed.query = original_query;
                parsed
            }
            Err(err) => SearchQueryResult {
                query: original_query,
                error: Some(err),
                ..Default::default()
            },
        }
    }

    async fn call(&self, query: &str, _unused: Option<()>) -> Result<SearchQueryResult, ClassifiedError> {
        let payload = serde_json::json!([{ "q": query }]);
        let request = self
            .http
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&payload);
        let (_status, body) = send_classified(request, self.deadline).await?;
        Ok(parse_batch_response(&body).into_iter().next().unwrap_or_default())
    }
}

fn reddit_scoped_query(query: &str, date_filter: Option<&str>) -> String {
    match date_filter {
        Some(df) if !df.is_empty() => format!("{query} site:reddit.com {df}"),
        _ => format!("{query} site:reddit.com"),
    }
}

/// Parse a batched response body into position-matched query results. A
/// malformed sub-entry yields a default (empty) entry at that position
/// rather than failing the whole batch, per §4.5.
fn parse_batch_response(body: &str) -> Vec<SearchQueryResult> {
    #[derive(Deserialize)]
    struct RawOrganic {
        #[serde(default)]
        title: String,
        #[serde(default)]
        link: String,
        #[serde(default)]
        snippet: String,
    }
    #[derive(Deserialize)]
    struct RawEntry {
        #[serde(default)]
        organic: Vec<RawOrganic>,
        #[serde(rename = "totalResults", default)]
        total_results: u64,
        #[serde(rename = "relatedSearches", default)]
        related_searches: Vec<RawRelated>,
    }
    #[derive(Deserialize)]
    struct RawRelated {
        #[serde(default)]
        query: String,
    }

    let parsed: Result<Vec<RawEntry>, _> = serde_json::from_str(body).or_else(|_| {
        // Some proxies return a single object instead of an array for a batch of 1.
        serde_json::from_str::<RawEntry>(body).map(|entry| vec![entry])
    });

    match parsed {
        Ok(entries) => entries
            .into_iter()
            .map(|entry| SearchQueryResult {
                query: String::new(),
                results: entry
                    .organic
                    .into_iter()
                    .enumerate()
                    .map(|(position, o)| SearchResultItem {
                        title: o.title,
                        url: o.link,
                        snippet: o.snippet,
                        position,
                    })
                    .collect(),
                total_results: entry.total_results,
                related_queries: entry.related_searches.into_iter().map(|r| r.query).collect(),
                error: None,
            })
            .collect(),
        Err(_) => vec![SearchQueryResult::default()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reddit_scoped_query_appends_domain_filter() {
        assert_eq!(reddit_scoped_query("rust async", None), "rust async site:reddit.com");
    }

    #[test]
    fn reddit_scoped_query_appends_date_filter_when_present() {
        assert_eq!(
            reddit_scoped_query("rust async", Some("after:2024-01-01")),
            "rust async site:reddit.com after:2024-01-01"
        );
    }

    #[test]
    fn parse_batch_response_extracts_organic_results_in_order() {
        let body = serde_json::json!([{
            "organic": [
                {"title": "A", "link": "https://a.example", "snippet": "s1"},
                {"title": "B", "link": "https://b.example", "snippet": "s2"}
            ],
            "totalResults": 42,
            "relatedSearches": [{"query": "related one"}]
        }])
        .to_string();
        let parsed = parse_batch_response(&body);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].results.len(), 2);
        assert_eq!(parsed[0].results[0].position, 0);
        assert_eq!(parsed[0].results[1].position, 1);
        assert_eq!(parsed[0].total_results, 42);
        assert_eq!(parsed[0].related_queries, vec!["related one"]);
    }

    #[test]
    fn parse_batch_response_malformed_body_yields_empty_entry_not_failure() {
        let parsed = parse_batch_response("not json at all");
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].results.is_empty());
    }

    #[test]
    fn parse_batch_response_accepts_single_object_for_batch_of_one() {
        let body = serde_json::json!({
            "organic": [{"title": "A", "link": "https://a.example", "snippet": "s"}],
            "totalResults": 1,
            "relatedSearches": []
        })
        .to_string();
        let parsed = parse_batch_response(&body);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].results.len(), 1);
    }
}
