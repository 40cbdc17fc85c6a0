//! `scrape_urls` tool handler: run the scraper adapter's fallback ladder
//! across a batch of URLs under the bounded executor (scenario 4, §8).

use std::sync::Arc;

use crate::adapters::scraper::ScrapeResult;
use crate::context::AppContext;
use crate::dispatch::ERROR_SENTINEL;

use super::check_bounds;

pub const MIN_URLS: usize = 1;
pub const MAX_URLS: usize = 50;

pub async fn handle(ctx: &AppContext, urls: Vec<String>) -> String {
    if let Err(msg) = check_bounds(urls.len(), MIN_URLS, MAX_URLS, "urls") {
        return format!("{ERROR_SENTINEL}\n\n{msg}");
    }

    let scraper: Arc<_> = ctx.scraper.clone();
    let concurrency = ctx.config.tunables.scraper_concurrency;
    let results = scraper.scrape_batch(urls, concurrency).await;
    render_body(&results)
}

/// Aggregate per-URL scrape results into the Markdown body. A pure function
/// over `ScrapeResult` so the formatting is testable without a mock server.
fn render_body(results: &[ScrapeResult]) -> String {
    let failures = results.iter().filter(|r| r.error.is_some()).count();
    let successes = results.len() - failures;

    let mut body = format!(
        "# Scrape Results\n\n{} URLs scraped ({} succeeded, {} failed).\n",
        results.len(),
        successes,
        failures,
    );

    for result in results {
        match &result.error {
            None => body.push_str(&format!(
                "\n## {} (mode: {}, status {}, {} credits)\n{} bytes of content.\n",
                result.url,
                result.mode_used,
                result.status_code,
                result.credits_consumed,
                result.content.len(),
            )),
            Some(err) => {
                body.push_str(&format!(
                    "\n## \u{274c} Failed: {}\n{}: {}\n",
                    result.url, err.kind, err.message
                ));
                if let Some(hint) = err.retry_hint() {
                    body.push_str(&format!("_{hint}_\n"));
                }
            }
        }
    }

    if successes == 0 {
        if let Some(hint) = results
            .iter()
            .filter_map(|r| r.error.as_ref())
            .find_map(|e| e.missing_key_hint(crate::config::CAP_SCRAPING))
        {
            body.push_str(&format!("\n{hint}\n"));
        }
        body = format!("{ERROR_SENTINEL}\n\n{body}");
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClassifiedError, ErrorKind};
    use crate::dispatch::is_error_body;

    #[test]
    fn partial_failure_among_successes_does_not_flip_is_error() {
        let results = vec![
            ScrapeResult {
                url: "https://ok.example".into(),
                content: "hi".into(),
                status_code: 200,
                credits_consumed: 1,
                mode_used: "basic",
                error: None,
            },
            ScrapeResult {
                url: "https://down.example".into(),
                content: String::new(),
                status_code: 0,
                credits_consumed: 0,
                mode_used: "basic",
                error: Some(ClassifiedError::new(ErrorKind::ServiceUnavailable, "down")),
            },
        ];
        let body = render_body(&results);
        assert!(!is_error_body(&body));
    }

    #[test]
    fn all_permanent_auth_failures_flip_is_error_with_missing_key_hint() {
        let results = vec![ScrapeResult {
            url: "https://x.example".into(),
            content: String::new(),
            status_code: 401,
            credits_consumed: 0,
            mode_used: "basic",
            error: Some(ClassifiedError::new(ErrorKind::Auth, "unauthorized").with_status(401)),
        }];
        let body = render_body(&results);
        assert!(is_error_body(&body));
        assert!(body.contains("scraping"));
    }

    #[test]
    fn bounds_reject_empty_and_oversized_batches() {
        assert!(check_bounds(0, MIN_URLS, MAX_URLS, "urls").is_err());
        assert!(check_bounds(51, MIN_URLS, MAX_URLS, "urls").is_err());
        assert!(check_bounds(10, MIN_URLS, MAX_URLS, "urls").is_ok());
    }
}
