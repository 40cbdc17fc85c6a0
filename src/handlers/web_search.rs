//! `web_search` tool handler: fan out keyword queries to the search adapter
//! and report an aggregated Markdown body (scenarios 1-2, §8).

use crate::context::AppContext;
use crate::dispatch::ERROR_SENTINEL;
use crate::fanout::run_bounded;

use super::check_bounds;

pub const MIN_KEYWORDS: usize = 1;
pub const MAX_KEYWORDS: usize = 10;

pub async fn handle(ctx: &AppContext, keywords: Vec<String>) -> String {
    if let Err(msg) = check_bounds(keywords.len(), MIN_KEYWORDS, MAX_KEYWORDS, "keywords") {
        return format!("{ERROR_SENTINEL}\n\n{msg}");
    }

    let cap = keywords.len().max(1);
    let search = ctx.search.clone();
    let results = run_bounded(keywords.clone(), cap, move |keyword| {
        let search = search.clone();
        async move { search.search_one(&keyword).await }
    })
    .await;

    let total_results: usize = results.iter().map(|r| r.results.len()).sum();
    let failures = results.iter().filter(|r| r.error.is_some()).count();
    let successes = results.len() - failures;

    let mut body = format!(
        "# Web Search Results\n\n{} keywords searched, {} total results ({} succeeded, {} failed).\n",
        keywords.len(),
        total_results,
        successes,
        failures,
    );

    for result in &results {
        body.push_str(&format!("\n## \"{}\"\n", result.query));
        match &result.error {
            Some(err) => body.push_str(&format!("- \u{274c} search failed: {}\n", err.message)),
            None => {
                if result.results.is_empty() {
                    body.push_str("- no results\n");
                }
                for item in &result.results {
                    body.push_str(&format!("- [{}]({}) — {}\n", item.title, item.url, item.snippet));
                }
            }
        }
    }

    if successes == 0 {
        body = format!("{ERROR_SENTINEL}\n\n{body}");
    }

    body
}
