//! `discover_reddit_discussions` tool handler: fan out Reddit-scoped search
//! queries and apply the CTR-weighted ranking algorithm (§4.6) to surface
//! consensus Reddit threads across multiple keywords.

use crate::context::AppContext;
use crate::dispatch::ERROR_SENTINEL;
use crate::fanout::run_bounded;
use crate::ranking::{aggregate, default_weight};

use super::check_bounds;

pub const MIN_KEYWORDS: usize = 1;
pub const MAX_KEYWORDS: usize = 10;
const CONSENSUS_THRESHOLD: usize = 2;

pub async fn handle(ctx: &AppContext, keywords: Vec<String>, date_filter: Option<String>) -> String {
    if let Err(msg) = check_bounds(keywords.len(), MIN_KEYWORDS, MAX_KEYWORDS, "keywords") {
        return format!("{ERROR_SENTINEL}\n\n{msg}");
    }

    let cap = keywords.len().max(1);
    let search = ctx.search.clone();
    let date_filter_owned = date_filter.clone();
    let results = run_bounded(keywords.clone(), cap, move |keyword| {
        let search = search.clone();
        let date_filter = date_filter_owned.clone();
        async move { search.search_reddit_one(&keyword, date_filter.as_deref()).await }
    })
    .await;

    let failures = results.iter().filter(|r| r.error.is_some()).count();
    let successes = results.len() - failures;
    let ranked = aggregate(results, default_weight, CONSENSUS_THRESHOLD);

    let mut body = format!(
        "# Reddit Discussion Discovery\n\n{} queries ({} succeeded, {} failed). {} consensus threads, {} total.\n",
        keywords.len(),
        successes,
        failures,
        ranked.consensus.len(),
        ranked.all.len(),
    );

    body.push_str("\n## Consensus (appeared in \u{2265}2 queries)\n");
    for item in &ranked.consensus {
        body.push_str(&format!(
            "- [{}]({}) — score {:.3}, seen in {} quer{}\n",
            item.url,
            item.url,
            item.score,
            item.appearances,
            if item.appearances == 1 { "y" } else { "ies" },
        ));
    }

    body.push_str("\n## All Results\n");
    for item in &ranked.all {
        body.push_str(&format!("- [{}]({}) — score {:.3}\n", item.url, item.url, item.score));
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

    fn test_ctx() -> AppContext {
        AppContext::new(ProcConfig {
            search_api_key: Some("k".into()),
            reddit_client_id: None,
            reddit_client_secret: None,
            scraper_api_key: None,
            llm_api_key: None,
            research_model: "m".into(),
            llm_extraction_model: "m".into(),
            openrouter_base_url: "https://x".into(),
            tunables: Tunables::default(),
        })
    }

    #[test]
    fn bounds_reject_empty_and_oversized_batches() {
        assert!(check_bounds(0, MIN_KEYWORDS, MAX_KEYWORDS, "keywords").is_err());
        assert!(check_bounds(11, MIN_KEYWORDS, MAX_KEYWORDS, "keywords").is_err());
        assert!(check_bounds(3, MIN_KEYWORDS, MAX_KEYWORDS, "keywords").is_ok());
    }

    #[tokio::test]
    async fn bounds_violation_yields_error_sentinel_body() {
        let ctx = test_ctx();
        let body = handle(&ctx, Vec::new(), None).await;
        assert!(is_error_body(&body));
    }
}
