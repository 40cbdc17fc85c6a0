//! Process configuration (C9) and the capability map (§3 Data Model).
//!
//! `ProcConfig` loads once at startup from environment variables, mirroring
//! the sibling binaries' `HarnessConfig::from_env()` pattern, with CLI
//! overrides layered on top via `clap`. `Capabilities` is derived from it and
//! never mutated afterward.

use std::collections::HashMap;
use std::time::Duration;

/// Capability tags named in §6 External Interfaces.
pub const CAP_SEARCH: &str = "search";
pub const CAP_REDDIT: &str = "reddit";
pub const CAP_SCRAPING: &str = "scraping";
pub const CAP_DEEP_RESEARCH: &str = "deep_research";
pub const CAP_LLM_EXTRACTION: &str = "llm_extraction";

/// Process-wide immutable `capability_tag -> bool` map, computed once from
/// environment at startup (§3). A tool whose capability is absent or `false`
/// never invokes its handler.
#[derive(Debug, Clone, Default)]
pub struct Capabilities(HashMap<&'static str, bool>);

impl Capabilities {
    pub fn from_config(config: &ProcConfig) -> Self {
        let mut map = HashMap::new();
        map.insert(CAP_SEARCH, config.search_api_key.is_some());
        map.insert(
            CAP_REDDIT,
            config.reddit_client_id.is_some() && config.reddit_client_secret.is_some(),
        );
        map.insert(CAP_SCRAPING, config.scraper_api_key.is_some());
        map.insert(CAP_DEEP_RESEARCH, config.llm_api_key.is_some());
        map.insert(CAP_LLM_EXTRACTION, config.llm_api_key.is_some());
        Self(map)
    }

    /// Whether `tag` is enabled. An unknown tag is treated as disabled rather
    /// than panicking — a tool referencing a capability this map never heard
    /// of is a configuration bug, not a crash.
    pub fn is_enabled(&self, tag: &str) -> bool {
        self.0.get(tag).copied().unwrap_or(false)
    }

    /// The environment variable name(s) to point a user at when `tag` is
    /// disabled, used for the "missing environment variable" hint (§4.7, §7).
    pub fn missing_key_hint(tag: &str) -> &'static str {
        match tag {
            CAP_SEARCH => "SEARCH_API_KEY",
            CAP_REDDIT => "REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET",
            CAP_SCRAPING => "SCRAPER_API_KEY",
            CAP_DEEP_RESEARCH | CAP_LLM_EXTRACTION => "LLM_API_KEY",
            other => other,
        }
    }
}

/// Tunables the distilled spec leaves as "for example" values (§4, §5).
/// All are `clap`-overridable at the binary's call site, the same way
/// `--max-iterations` overrides `HARNESS_MAX_ITERATIONS` in the sibling tool.
#[derive(Debug, Clone)]
pub struct Tunables {
    /// Per-call HTTP deadline (§5). Default 30s.
    pub request_deadline: Duration,
    /// Scraper batched-operation concurrency cap (§4.5). Default 30.
    pub scraper_concurrency: usize,
    /// LLM deep-research fan-out cap (§4.6). Default 3.
    pub llm_concurrency: usize,
    /// Reddit comment-allocation request ceiling (§4.4). Default 500.
    pub reddit_comment_ceiling: u32,
    /// Pause between consecutive scraper batches (§5). Default 500ms.
    pub scraper_batch_pause: Duration,
    /// Reddit token refresh safety window before expiry (§4.5, §9). Default 60s.
    pub reddit_token_safety_window: Duration,
    /// LLM input character ceiling before truncation (§4.5). Default 50,000.
    pub llm_input_char_ceiling: usize,
    /// Default token budget for deep-research (§4.4). Default 32,000.
    pub default_token_budget: u32,
    /// Default comment budget for Reddit fetches (§4.4). Default 1,000.
    pub default_comment_budget: u32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            request_deadline: Duration::from_secs(30),
            scraper_concurrency: 30,
            llm_concurrency: 3,
            reddit_comment_ceiling: 500,
            scraper_batch_pause: Duration::from_millis(500),
            reddit_token_safety_window: Duration::from_secs(60),
            llm_input_char_ceiling: 50_000,
            default_token_budget: 32_000,
            default_comment_budget: 1_000,
        }
    }
}

/// Startup-time configuration failures (§6: "unknown parameter types are a
/// startup-time fatal error" generalizes here to "tunables out of range").
/// Distinct from [`crate::error::ErrorKind`], which classifies a per-call
/// failure, not a process-level one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcError {
    #[error("{field} must be >= 1, got {value}")]
    TunableBelowMinimum { field: &'static str, value: u64 },
}

/// Process configuration loaded once at startup.
#[derive(Debug, Clone)]
pub struct ProcConfig {
    pub search_api_key: Option<String>,
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub scraper_api_key: Option<String>,
    pub llm_api_key: Option<String>,
    pub research_model: String,
    pub llm_extraction_model: String,
    pub openrouter_base_url: String,
    pub tunables: Tunables,
}

impl ProcConfig {
    pub fn from_env() -> Self {
        Self {
            search_api_key: non_empty_env("SEARCH_API_KEY"),
            reddit_client_id: non_empty_env("REDDIT_CLIENT_ID"),
            reddit_client_secret: non_empty_env("REDDIT_CLIENT_SECRET"),
            scraper_api_key: non_empty_env("SCRAPER_API_KEY"),
            llm_api_key: non_empty_env("LLM_API_KEY"),
            research_model: std::env::var("RESEARCH_MODEL")
                .unwrap_or_else(|_| "anthropic/claude-3.5-sonnet".to_string()),
            llm_extraction_model: std::env::var("LLM_EXTRACTION_MODEL")
                .unwrap_or_else(|_| "anthropic/claude-3.5-haiku".to_string()),
            openrouter_base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            tunables: Tunables::default(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_config(self)
    }

    /// Reject tunables that would make a fan-out or allocation meaningless
    /// (a concurrency cap of 0 would deadlock [`crate::fanout::run_bounded`]'s
    /// semaphore sizing before it even clamps). Called once at startup; a
    /// failure here is a fatal config error (§6 exit code 1), not a per-call
    /// [`crate::error::ErrorKind`].
    pub fn validate(&self) -> Result<(), ProcError> {
        if self.tunables.scraper_concurrency == 0 {
            return Err(ProcError::TunableBelowMinimum {
                field: "scraper_concurrency",
                value: 0,
            });
        }
        if self.tunables.llm_concurrency == 0 {
            return Err(ProcError::TunableBelowMinimum {
                field: "llm_concurrency",
                value: 0,
            });
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
