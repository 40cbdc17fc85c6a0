//! PROC MCP server entry point.
//!
//! Wires the declarative tool table (the `#[tool_router]`-collected methods
//! below) to the stdio JSON-RPC transport, initializes the ambient stack
//! (tracing to stderr, env-derived configuration, the process supervisor),
//! and drives the server until a shutdown signal or transport close.
//!
//! ```bash
//! # Standard MCP mode, reading capabilities from the environment
//! SEARCH_API_KEY=... REDDIT_CLIENT_ID=... REDDIT_CLIENT_SECRET=... \
//! SCRAPER_API_KEY=... LLM_API_KEY=... proc-research-mcp
//! ```

#![allow(dead_code)]

use anyhow::Result;
use clap::Parser;
use rmcp::{
    handler::server::wrapper::Parameters,
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_router, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tokio::io::{stdin, stdout};

use proc_research_mcp::config::{CAP_DEEP_RESEARCH, CAP_LLM_EXTRACTION, CAP_REDDIT, CAP_SCRAPING, CAP_SEARCH};
use proc_research_mcp::dispatch::{capability_gate, is_error_body, render_error_body};
use proc_research_mcp::error::{ClassifiedError, ErrorKind};
use proc_research_mcp::{AppContext, ProcConfig, Supervisor};

mod handlers_wire {
    pub use proc_research_mcp::handlers::{
        deep_research, extract, reddit_discovery, reddit_thread, scrape, web_search,
    };
}

/// CLI overrides for tunables the distilled spec leaves as "for example"
/// values (§4, §5, SPEC_FULL.md Ambient Stack C9). Every flag here mirrors an
/// environment variable read by [`ProcConfig::from_env`]; the flag wins when
/// both are set.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the scraper batched-operation concurrency cap (default 30).
    #[arg(long)]
    scraper_concurrency: Option<usize>,

    /// Override the LLM deep-research fan-out cap (default 3).
    #[arg(long)]
    llm_concurrency: Option<usize>,

    /// Override the Reddit per-post comment request ceiling (default 500).
    #[arg(long)]
    reddit_comment_ceiling: Option<u32>,

    /// Override the default token budget for deep-research (default 32000).
    #[arg(long)]
    default_token_budget: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct WebSearchRequest {
    #[schemars(description = "1 to 10 search keywords/phrases to query")]
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DiscoverRedditRequest {
    #[schemars(description = "1 to 10 keywords to search for Reddit discussions about")]
    keywords: Vec<String>,
    #[schemars(description = "Optional date filter appended to each query (e.g. \"after:2024-01-01\")")]
    date_filter: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct FetchRedditThreadsRequest {
    #[schemars(description = "2 to 50 Reddit post URLs to fetch")]
    urls: Vec<String>,
    #[schemars(description = "Total comment budget to split across all posts (default 1000)")]
    comment_budget: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ScrapeUrlsRequest {
    #[schemars(description = "1 to 50 URLs to scrape")]
    urls: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DeepResearchRequest {
    #[schemars(description = "1 to 10 research questions")]
    questions: Vec<String>,
    #[schemars(description = "Total token budget to split across all questions (default 32000)")]
    token_budget: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ExtractContentRequest {
    #[schemars(description = "Raw content to extract information from")]
    content: String,
    #[schemars(description = "Extraction instructions describing what to pull out of the content")]
    prompt: String,
}

/// The MCP server handler. Holds the one long-lived [`AppContext`] (provider
/// adapters, capabilities, config) shared across every tool invocation.
#[derive(Clone)]
struct ProcServer {
    ctx: AppContext,
}

impl ProcServer {
    fn new(config: ProcConfig) -> Self {
        Self { ctx: AppContext::new(config) }
    }

    /// Run the dispatcher's capability gate (C7 step 2) before invoking
    /// `run` (C7 step 5). The handler runs on its own spawned task so a
    /// panic inside it surfaces as a `JoinError` instead of taking down the
    /// transport's task — the one place this server needs an actual
    /// exception backstop, since everything below this layer is designed to
    /// return rather than raise. On success, apply the response-shape
    /// sentinel check (C7 step 6): a body containing the error sentinel is
    /// returned as `Err` so the transport marks `is_error = true`, matching
    /// `response_shape` in §3.
    async fn dispatch<F, Fut>(&self, capability: &str, run: F) -> Result<String, String>
    where
        F: FnOnce(AppContext) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = String> + Send + 'static,
    {
        if let Some(gated) = capability_gate(&self.ctx.capabilities, capability) {
            return Err(gated);
        }
        let body = match tokio::spawn(run(self.ctx.clone())).await {
            Ok(body) => body,
            Err(join_err) => {
                tracing::error!(error = %join_err, capability, "tool handler panicked");
                let err = ClassifiedError::new(ErrorKind::Internal, "handler panicked").retryable(false);
                render_error_body(&err, capability)
            }
        };
        if is_error_body(&body) {
            Err(body)
        } else {
            Ok(body)
        }
    }
}

#[tool_router]
impl ProcServer {
    #[tool(
        description = "Search the web for a batch of 1-10 keywords via a Google search proxy, returning ranked organic results per keyword."
    )]
    async fn web_search(&self, Parameters(req): Parameters<WebSearchRequest>) -> Result<String, String> {
        self.dispatch(CAP_SEARCH, |ctx| async move { handlers_wire::web_search::handle(&ctx, req.keywords).await })
            .await
    }

    #[tool(
        description = "Discover Reddit discussions matching 1-10 keywords, ranking result URLs by a click-through-weighted consensus score across queries."
    )]
    async fn discover_reddit_discussions(
        &self,
        Parameters(req): Parameters<DiscoverRedditRequest>,
    ) -> Result<String, String> {
        self.dispatch(CAP_SEARCH, |ctx| async move {
            handlers_wire::reddit_discovery::handle(&ctx, req.keywords, req.date_filter).await
        })
        .await
    }

    #[tool(
        description = "Fetch 2-50 Reddit post URLs, returning post metadata and a comment tree flattened depth-first within a shared comment budget."
    )]
    async fn fetch_reddit_threads(
        &self,
        Parameters(req): Parameters<FetchRedditThreadsRequest>,
    ) -> Result<String, String> {
        self.dispatch(CAP_REDDIT, |ctx| async move {
            handlers_wire::reddit_thread::handle(&ctx, req.urls, req.comment_budget).await
        })
        .await
    }

    #[tool(
        description = "Scrape 1-50 URLs via a three-mode fallback ladder (basic, JS-rendered, JS-rendered+geo), advancing modes on transient failure and stopping on permanent failure."
    )]
    async fn scrape_urls(&self, Parameters(req): Parameters<ScrapeUrlsRequest>) -> Result<String, String> {
        self.dispatch(CAP_SCRAPING, |ctx| async move { handlers_wire::scrape::handle(&ctx, req.urls).await })
            .await
    }

    #[tool(
        description = "Research 1-10 open-ended questions via an LLM, splitting a shared output-token budget across the batch."
    )]
    async fn deep_research(&self, Parameters(req): Parameters<DeepResearchRequest>) -> Result<String, String> {
        self.dispatch(CAP_DEEP_RESEARCH, |ctx| async move {
            handlers_wire::deep_research::handle(&ctx, req.questions, req.token_budget).await
        })
        .await
    }

    #[tool(
        description = "Extract structured information out of arbitrary content using a caller-supplied extraction prompt, via a chat-completion proxy."
    )]
    async fn extract_content(
        &self,
        Parameters(req): Parameters<ExtractContentRequest>,
    ) -> Result<String, String> {
        self.dispatch(CAP_LLM_EXTRACTION, |ctx| async move {
            handlers_wire::extract::handle(&ctx, req.content, req.prompt).await
        })
        .await
    }
}

impl ServerHandler for ProcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Research-orchestration server. Tools fan a batch of inputs out to external \
                 providers (search, Reddit, scraper, LLM) under bounded concurrency with \
                 classified retry, and fold results into one Markdown reply per call. Each \
                 tool requires its provider's credential to be configured in the environment; \
                 a missing credential is reported as a structured error rather than a crash."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("proc_research_mcp=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let supervisor = Supervisor::new();
    supervisor.install_panic_hook();

    let mut config = ProcConfig::from_env();
    apply_cli_overrides(&mut config, &_args);
    config.validate().map_err(|e| {
        tracing::error!(error = %e, "fatal config error at startup");
        anyhow::anyhow!(e)
    })?;

    tracing::info!(
        search = config.search_api_key.is_some(),
        reddit = config.reddit_client_id.is_some() && config.reddit_client_secret.is_some(),
        scraping = config.scraper_api_key.is_some(),
        llm = config.llm_api_key.is_some(),
        "starting PROC research server",
    );

    let server = ProcServer::new(config);
    let transport = (stdin(), stdout());
    let service = server.serve(transport).await?;

    tokio::select! {
        result = service.waiting() => {
            result?;
        }
        _ = supervisor.wait_for_shutdown_signal() => {
            tracing::info!("transport draining after shutdown signal");
        }
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut ProcConfig, args: &Args) {
    if let Some(v) = args.scraper_concurrency {
        config.tunables.scraper_concurrency = v;
    }
    if let Some(v) = args.llm_concurrency {
        config.tunables.llm_concurrency = v;
    }
    if let Some(v) = args.reddit_comment_ceiling {
        config.tunables.reddit_comment_ceiling = v;
    }
    if let Some(v) = args.default_token_budget {
        config.tunables.default_token_budget = v;
    }
}
