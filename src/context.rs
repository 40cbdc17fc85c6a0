//! Shared per-process context: configuration, capabilities, and the one
//! long-lived instance of each provider adapter. Everything here is
//! read-only after construction except the Reddit adapter's internal token
//! cache (§5).

use std::sync::Arc;

use crate::adapters::llm::LlmAdapter;
use crate::adapters::reddit::RedditAdapter;
use crate::adapters::scraper::ScraperAdapter;
use crate::adapters::search::SearchAdapter;
use crate::config::{Capabilities, ProcConfig};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ProcConfig>,
    pub capabilities: Arc<Capabilities>,
    pub search: Arc<SearchAdapter>,
    pub reddit: Arc<RedditAdapter>,
    pub scraper: Arc<ScraperAdapter>,
    pub llm: Arc<LlmAdapter>,
}

impl AppContext {
    pub fn new(config: ProcConfig) -> Self {
        let capabilities = config.capabilities();
        let deadline = config.tunables.request_deadline;

        let search = SearchAdapter::new(
            config.search_api_key.clone().unwrap_or_default(),
            "https://google.serper.dev",
            deadline,
        );
        let reddit = RedditAdapter::new(
            config.reddit_client_id.clone().unwrap_or_default(),
            config.reddit_client_secret.clone().unwrap_or_default(),
            deadline,
            config.tunables.reddit_token_safety_window,
        );
        let scraper = ScraperAdapter::new(
            config.scraper_api_key.clone().unwrap_or_default(),
            "https://api.scraperapi.com",
            "us",
            deadline,
            config.tunables.scraper_batch_pause,
        );
        let llm = LlmAdapter::new(
            config.llm_api_key.clone().unwrap_or_default(),
            config.openrouter_base_url.clone(),
            deadline,
            config.tunables.llm_input_char_ceiling,
        );

        Self {
            config: Arc::new(config),
            capabilities: Arc::new(capabilities),
            search: Arc::new(search),
            reddit: Arc::new(reddit),
            scraper: Arc::new(scraper),
            llm: Arc::new(llm),
        }
    }
}
