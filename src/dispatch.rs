//! Capability gating and response-shape helpers for the dispatcher (C7).
//!
//! The rest of C7's pipeline — tool lookup and JSON-schema validation of
//! `args` — is carried by `rmcp`'s `#[tool_router]`/`Parameters<T>` machinery
//! (see SPEC_FULL.md §4.7); what remains to implement by hand is the
//! capability gate (step 2) and the sentinel-based response shape (step 6).

use crate::config::Capabilities;

/// Sentinel prefix a handler's Markdown body carries when it represents a
/// total failure (§3, §9). Never appears in a successful body.
pub const ERROR_SENTINEL: &str = "# \u{274c} Error";

pub fn is_error_body(body: &str) -> bool {
    body.contains(ERROR_SENTINEL)
}

/// Step 2 of the dispatch pipeline: if `capability` is disabled, produce the
/// "missing environment variable" error body without invoking the handler.
/// Returns `None` when the capability is enabled and the handler should run.
pub fn capability_gate(caps: &Capabilities, capability: &str) -> Option<String> {
    if caps.is_enabled(capability) {
        return None;
    }
    let hint = Capabilities::missing_key_hint(capability);
    Some(format!(
        "{ERROR_SENTINEL}\n\nThe \"{capability}\" capability is not configured. Set {hint} and restart the server."
    ))
}

/// Render a [`crate::error::ClassifiedError`] as the user-visible failure
/// body described in §7: error kind, message, retry hint, and — for
/// auth/quota errors — a pointer to the missing environment variable.
pub fn render_error_body(err: &crate::error::ClassifiedError, capability: &str) -> String {
    let mut body = format!("{ERROR_SENTINEL}\n\n**{}**: {}", err.kind, err.message);
    if let Some(hint) = err.retry_hint() {
        body.push_str(&format!("\n\n_{hint}_"));
    }
    if let Some(missing) = err.missing_key_hint(capability) {
        body.push_str(&format!("\n\n{missing}"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProcConfig, Tunables, CAP_SEARCH};
    use crate::error::{ClassifiedError, ErrorKind};

    #[test]
    fn capability_gate_blocks_when_disabled() {
        let config = ProcConfig {
            search_api_key: None,
            reddit_client_id: None,
            reddit_client_secret: None,
            scraper_api_key: None,
            llm_api_key: None,
            research_model: "m".into(),
            llm_extraction_model: "m".into(),
            openrouter_base_url: "https://x".into(),
            tunables: Tunables::default(),
        };
        let caps = config.capabilities();
        let gated = capability_gate(&caps, CAP_SEARCH);
        assert!(gated.is_some());
        assert!(is_error_body(&gated.unwrap()));
    }

    #[test]
    fn capability_gate_passes_when_enabled() {
        let config = ProcConfig {
            search_api_key: Some("key".into()),
            reddit_client_id: None,
            reddit_client_secret: None,
            scraper_api_key: None,
            llm_api_key: None,
            research_model: "m".into(),
            llm_extraction_model: "m".into(),
            openrouter_base_url: "https://x".into(),
            tunables: Tunables::default(),
        };
        let caps = config.capabilities();
        assert!(capability_gate(&caps, CAP_SEARCH).is_none());
    }

    #[test]
    fn render_error_body_includes_retry_hint_for_retryable_kinds() {
        let err = ClassifiedError::new(ErrorKind::RateLimited, "slow down");
        let body = render_error_body(&err, CAP_SEARCH);
        assert!(body.contains("this error may be temporary"));
    }

    #[test]
    fn render_error_body_includes_missing_key_for_auth() {
        let err = ClassifiedError::new(ErrorKind::Auth, "bad key");
        let body = render_error_body(&err, CAP_SEARCH);
        assert!(body.contains("SEARCH_API_KEY") || body.contains("search"));
    }
}
