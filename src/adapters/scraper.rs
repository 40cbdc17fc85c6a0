//! Scraper adapter (C5) — a three-mode fallback ladder.
//!
//! `basic` -> `javascript` -> `javascript+geo`. A mode advances to the next
//! on a non-permanent failure, returns immediately on a 2xx or a `404`
//! (treated as a valid "not found" terminal response), and stops the ladder
//! on a permanent failure (401/400/403) without trying remaining modes.

use std::time::Duration;

use serde::Serialize;

use crate::error::{ClassifiedError, ErrorKind};
use crate::fanout::run_in_waves;

use super::send_classified;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeMode {
    Basic,
    Javascript,
    JavascriptGeo,
}

impl ScrapeMode {
    const LADDER: [ScrapeMode; 3] = [Self::Basic, Self::Javascript, Self::JavascriptGeo];

    fn query_params(self, geo: &str) -> Vec<(&'static str, String)> {
        match self {
            ScrapeMode::Basic => vec![],
            ScrapeMode::Javascript => vec![("render", "true".to_string())],
            ScrapeMode::JavascriptGeo => {
                vec![("render", "true".to_string()), ("country_code", geo.to_string())]
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            ScrapeMode::Basic => "basic",
            ScrapeMode::Javascript => "javascript",
            ScrapeMode::JavascriptGeo => "javascript+geo",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    pub url: String,
    pub content: String,
    pub status_code: u16,
    pub credits_consumed: u32,
    pub mode_used: &'static str,
    pub error: Option<ClassifiedError>,
}

/// `{400, 401, 403}` terminate the ladder immediately without trying the
/// remaining modes (§4.5).
fn is_permanent(status: u16) -> bool {
    matches!(status, 400 | 401 | 403)
}

pub struct ScraperAdapter {
    api_key: String,
    base_url: String,
    geo_code: String,
    http: reqwest::Client,
    deadline: Duration,
    batch_pause: Duration,
}

impl ScraperAdapter {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        geo_code: impl Into<String>,
        deadline: Duration,
        batch_pause: Duration,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            geo_code: geo_code.into(),
            http: reqwest::Client::new(),
            deadline,
            batch_pause,
        }
    }

    /// Try each ladder mode in order for a single URL. Never panics; the
    /// terminal result (success, 404, or the last permanent failure) is
    /// always returned rather than raised.
    pub async fn scrape_with_fallback(&self, url: &str) -> ScrapeResult {
        let mut last: Option<ScrapeResult> = None;
        for mode in ScrapeMode::LADDER {
            let attempt = self.call(url, mode).await;
            let is_terminal = match &attempt {
                Ok(result) => (200..300).contains(&result.status_code) || result.status_code == 404,
                Err(err) => err.http_status.map(is_permanent).unwrap_or(false),
            };
            let result = match attempt {
                Ok(result) => result,
                Err(err) => ScrapeResult {
                    url: url.to_string(),
                    content: String::new(),
                    status_code: err.http_status.unwrap_or(0),
                    credits_consumed: 0,
                    mode_used: mode.label(),
                    error: Some(err),
                },
            };
            let stop = is_terminal;
            last = Some(result);
            if stop {
                break;
            }
        }
        last.unwrap_or_else(|| ScrapeResult {
            url: url.to_string(),
            content: String::new(),
            status_code: 0,
            credits_consumed: 0,
            mode_used: ScrapeMode::Basic.label(),
            error: Some(ClassifiedError::new(ErrorKind::Internal, "empty ladder")),
        })
    }

    /// Run [`Self::scrape_with_fallback`] over many URLs under the bounded
    /// executor (C3) with a concurrency cap (default 30, §4.5), waiting
    /// `batch_pause` between consecutive waves of `concurrency` URLs to
    /// reduce burstiness (§5).
    pub async fn scrape_batch(self: std::sync::Arc<Self>, urls: Vec<String>, concurrency: usize) -> Vec<ScrapeResult> {
        let pause = self.batch_pause;
        run_in_waves(urls, concurrency, pause, move |url| {
            let adapter = self.clone();
            async move { adapter.scrape_with_fallback(&url).await }
        })
        .await
    }

    async fn call(&self, url: &str, mode: ScrapeMode) -> Result<ScrapeResult, ClassifiedError> {
        let mut request = self
            .http
            .get(format!("{}/scrape", self.base_url))
            .query(&[("api_key", self.api_key.as_str()), ("url", url)]);
        for (key, value) in mode.query_params(&self.geo_code) {
            request = request.query(&[(key, value)]);
        }
        match send_classified(request, self.deadline).await {
            Ok((status, body)) => Ok(ScrapeResult {
                url: url.to_string(),
                content: body,
                status_code: status,
                credits_consumed: mode_credit_cost(mode),
                mode_used: mode.label(),
                error: None,
            }),
            Err(err) if err.http_status == Some(404) => Ok(ScrapeResult {
                url: url.to_string(),
                content: String::new(),
                status_code: 404,
                credits_consumed: mode_credit_cost(mode),
                mode_used: mode.label(),
                error: None,
            }),
            Err(err) => Err(err),
        }
    }
}

fn mode_credit_cost(mode: ScrapeMode) -> u32 {
    match mode {
        ScrapeMode::Basic => 1,
        ScrapeMode::Javascript => 5,
        ScrapeMode::JavascriptGeo => 10,
    }
}
