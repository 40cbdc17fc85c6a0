//! Search-Reddit ranking (§4.6) — the one non-trivial algorithm in the tool
//! handlers (C6). When multiple queries are aggregated, each returned URL
//! receives a click-through-weighted score across all the queries it
//! appeared in, and the aggregate is split into a "consensus" group (URLs
//! that appeared across at least a threshold number of queries) and an
//! "all" group, each sorted by descending score with position/URL
//! tie-breaks.
//!
//! Open question resolved (§9, DESIGN.md): the weighting function is a
//! parameter of the aggregator (`fn(usize) -> f64`), defaulting to
//! `|pos| 1.0 / (1.0 + pos as f64)`.

use std::collections::HashMap;

use crate::adapters::search::SearchQueryResult;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedUrl {
    pub url: String,
    pub score: f64,
    pub appearances: usize,
    pub min_position: usize,
}

#[derive(Debug, Clone)]
pub struct RankedResults {
    pub consensus: Vec<RankedUrl>,
    pub all: Vec<RankedUrl>,
    /// Per-query raw results, preserved verbatim (§4.6).
    pub raw_by_query: Vec<SearchQueryResult>,
}

/// Default position-weighting function: higher (earlier) positions score more.
pub fn default_weight(position: usize) -> f64 {
    1.0 / (1.0 + position as f64)
}

/// Aggregate multiple queries' search results into consensus/all rankings.
/// `consensus_threshold` is the minimum number of distinct queries a URL
/// must appear in to be included in `consensus` (default 2, §4.6).
pub fn aggregate<W>(results: Vec<SearchQueryResult>, weight: W, consensus_threshold: usize) -> RankedResults
where
    W: Fn(usize) -> f64,
{
    struct Accumulated {
        score: f64,
        queries_seen: std::collections::HashSet<usize>,
        min_position: usize,
    }

    let mut by_url: HashMap<String, Accumulated> = HashMap::new();

    for (query_index, query_result) in results.iter().enumerate() {
        for item in &query_result.results {
            let entry = by_url.entry(item.url.clone()).or_insert(Accumulated {
                score: 0.0,
                queries_seen: std::collections::HashSet::new(),
                min_position: usize::MAX,
            });
            entry.score += weight(item.position);
            entry.queries_seen.insert(query_index);
            entry.min_position = entry.min_position.min(item.position);
        }
    }

    let mut all: Vec<RankedUrl> = by_url
        .into_iter()
        .map(|(url, acc)| RankedUrl {
            url,
            score: acc.score,
            appearances: acc.queries_seen.len(),
            min_position: acc.min_position,
        })
        .collect();

    sort_ranked(&mut all);

    let consensus = all
        .iter()
        .filter(|r| r.appearances >= consensus_threshold)
        .cloned()
        .collect();

    RankedResults { consensus, all, raw_by_query: results }
}

fn sort_ranked(items: &mut [RankedUrl]) {
    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.min_position.cmp(&b.min_position))
            .then_with(|| a.url.cmp(&b.url))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::search::SearchResultItem;

    fn query(query: &str, urls: &[(&str, usize)]) -> SearchQueryResult {
        SearchQueryResult {
            query: query.to_string(),
            results: urls
                .iter()
                .map(|(url, position)| SearchResultItem {
                    title: String::new(),
                    url: url.to_string(),
                    snippet: String::new(),
                    position: *position,
                })
                .collect(),
            total_results: urls.len() as u64,
            related_queries: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn url_appearing_in_multiple_queries_scores_higher_than_single_appearance() {
        let results = vec![
            query("a", &[("https://x.example", 0), ("https://y.example", 1)]),
            query("b", &[("https://x.example", 0)]),
        ];
        let ranked = aggregate(results, default_weight, 2);
        let x = ranked.all.iter().find(|r| r.url == "https://x.example").unwrap();
        let y = ranked.all.iter().find(|r| r.url == "https://y.example").unwrap();
        assert!(x.score > y.score);
        assert_eq!(x.appearances, 2);
        assert_eq!(y.appearances, 1);
    }

    #[test]
    fn consensus_group_requires_threshold_appearances() {
        let results = vec![
            query("a", &[("https://only-a.example", 0)]),
            query("b", &[("https://both.example", 0)]),
            query("a-again", &[("https://both.example", 1)]),
        ];
        let ranked = aggregate(results, default_weight, 2);
        assert!(ranked.consensus.iter().any(|r| r.url == "https://both.example"));
        assert!(!ranked.consensus.iter().any(|r| r.url == "https://only-a.example"));
        assert_eq!(ranked.all.len(), 2);
    }

    #[test]
    fn earlier_position_weighs_more_than_later() {
        assert!(default_weight(0) > default_weight(1));
        assert!(default_weight(1) > default_weight(5));
    }

    #[test]
    fn ties_break_by_min_position_then_url_lexicographic() {
        let results = vec![query(
            "a",
            &[("https://z.example", 0), ("https://a.example", 0)],
        )];
        let ranked = aggregate(results, default_weight, 1);
        // Equal score and equal position -> lexicographic tiebreak.
        assert_eq!(ranked.all[0].url, "https://a.example");
        assert_eq!(ranked.all[1].url, "https://z.example");
    }

    #[test]
    fn raw_per_query_results_are_preserved_verbatim() {
        let results = vec![query("a", &[("https://x.example", 0)])];
        let ranked = aggregate(results.clone(), default_weight, 2);
        assert_eq!(ranked.raw_by_query.len(), results.len());
        assert_eq!(ranked.raw_by_query[0].query, "a");
    }

    #[test]
    fn empty_input_produces_empty_rankings() {
        let ranked = aggregate(Vec::new(), default_weight, 2);
        assert!(ranked.all.is_empty());
        assert!(ranked.consensus.is_empty());
    }
}
