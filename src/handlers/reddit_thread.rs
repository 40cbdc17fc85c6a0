//! `fetch_reddit_threads` tool handler: resolve a batch of Reddit post URLs
//! into metadata and a comment budget allocated across them (scenario 5, §8).

use crate::allocator::allocate_comments;
use crate::context::AppContext;
use crate::dispatch::ERROR_SENTINEL;
use crate::fanout::run_bounded;

use super::check_bounds;

pub const MIN_URLS: usize = 2;
pub const MAX_URLS: usize = 50;
const REDDIT_CONCURRENCY: usize = 5;

pub async fn handle(ctx: &AppContext, urls: Vec<String>, comment_budget: Option<u32>) -> String {
    if let Err(msg) = check_bounds(urls.len(), MIN_URLS, MAX_URLS, "urls") {
        return format!("{ERROR_SENTINEL}\n\n{msg}");
    }

    let budget = comment_budget.unwrap_or(ctx.config.tunables.default_comment_budget);
    let allocation = allocate_comments(budget, urls.len(), ctx.config.tunables.reddit_comment_ceiling);

    let reddit = ctx.reddit.clone();
    let per_item = allocation.per_item_capped;
    let results = run_bounded(urls.clone(), REDDIT_CONCURRENCY, move |url| {
        let reddit = reddit.clone();
        async move { reddit.fetch_thread(&url, per_item).await }
    })
    .await;

    let failures = results.iter().filter(|r| r.error.is_some()).count();
    let successes = results.len() - failures;

    let mut body = format!(
        "# Reddit Threads\n\n{} posts fetched ({} succeeded, {} failed).\n\n\
         **Comment Allocation**: {} comments/post (uncapped {}, budget {})\n",
        urls.len(),
        successes,
        failures,
        allocation.per_item_capped,
        allocation.per_item_uncapped,
        budget,
    );

    for result in &results {
        match (&result.post_metadata, &result.error) {
            (Some(meta), _) => {
                body.push_str(&format!(
                    "\n## {} (score {})\n{} comments fetched.\n",
                    meta.title,
                    meta.score,
                    result.comments.len(),
                ));
            }
            (None, Some(err)) => {
                body.push_str(&format!("\n## \u{274c} Failed\n{}: {}\n", err.kind, err.message));
            }
            (None, None) => {}
        }
    }

    if successes == 0 {
        body = format!("{ERROR_SENTINEL}\n\n{body}");
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProcConfig, Tunables};
    use crate::dispatch::is_error_body;

    #[test]
    fn comment_allocation_matches_spec_scenario_5() {
        let allocation = allocate_comments(1_000, 10, 500);
        assert_eq!(allocation.per_item_capped, 100);
    }

    #[test]
    fn bounds_reject_single_url_and_oversized_batches() {
        assert!(check_bounds(1, MIN_URLS, MAX_URLS, "urls").is_err());
        assert!(check_bounds(51, MIN_URLS, MAX_URLS, "urls").is_err());
        assert!(check_bounds(10, MIN_URLS, MAX_URLS, "urls").is_ok());
    }

    #[tokio::test]
    async fn single_url_below_minimum_yields_error_sentinel_body() {
        let ctx = AppContext::new(ProcConfig {
            search_api_key: None,
            reddit_client_id: Some("id".into()),
            reddit_client_secret: Some("secret".into()),
            scraper_api_key: None,
            llm_api_key: None,
            research_model: "m".into(),
            llm_extraction_model: "m".into(),
            openrouter_base_url: "https://x".into(),
            tunables: Tunables::default(),
        });
        let body = handle(&ctx, vec!["https://reddit.com/r/rust/comments/abc/x/".into()], None).await;
        assert!(is_error_body(&body));
    }
}
