//! Provider Adapters (C5).
//!
//! One adapter per external service (Search, Reddit, Scraper, LLM). Each
//! exposes a small set of async operations and owns that provider's
//! status-code semantics; none of them retry on their own — retry is the
//! retry engine's (C2) job — except where a provider's own semantics force
//! an adapter-driven second attempt (documented per adapter).
//!
//! Every adapter response carries an explicit optional `error` field rather
//! than encoding failure by absence, so callers can tell "empty successful
//! result" from "failed" (§3).

pub mod llm;
pub mod reddit;
pub mod scraper;
pub mod search;

use std::time::Duration;

use crate::error::{classify, ClassifiableFailure, ClassifiedError};

/// Issue `request` and classify any transport-level failure or non-2xx
/// response into a [`ClassifiedError`], reading the body as UTF-8 text.
/// This is the one place every adapter routes its HTTP call through, so the
/// per-call deadline (§5) and classification dispatch (§4.1) are applied
/// uniformly.
pub async fn send_classified(
    request: reqwest::RequestBuilder,
    deadline: Duration,
) -> Result<(u16, String), ClassifiedError> {
    let response = match tokio::time::timeout(deadline, request.send()).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(err)) => return Err(classify(ClassifiableFailure::Transport(&err))),
        Err(_elapsed) => return Err(classify(ClassifiableFailure::Cancelled)),
    };
    let status = response.status().as_u16();
    let body = match tokio::time::timeout(deadline, response.text()).await {
        Ok(Ok(body)) => body,
        Ok(Err(err)) => return Err(classify(ClassifiableFailure::Transport(&err))),
        Err(_elapsed) => return Err(classify(ClassifiableFailure::Cancelled)),
    };
    if !(200..300).contains(&status) {
        return Err(classify(ClassifiableFailure::HttpStatus {
            status,
            body: Some(body.as_str()),
        }));
    }
    Ok((status, body))
}
