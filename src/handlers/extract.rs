//! `extract_content` tool handler: a single LLM extraction call over
//! caller-supplied content and prompt. Distinct from `deep_research` in
//! capability tag (`llm_extraction` vs `deep_research`), both gated on the
//! same `LLM_API_KEY` (§6).

use crate::adapters::llm::LlmResult;
use crate::context::AppContext;
use crate::dispatch::ERROR_SENTINEL;

const DEFAULT_MAX_TOKENS: u32 = 2_048;

pub async fn handle(ctx: &AppContext, content: String, prompt: String) -> String {
    let result = ctx
        .llm
        .complete(&prompt, &content, &ctx.config.llm_extraction_model, DEFAULT_MAX_TOKENS)
        .await;
    render_body(&result)
}

/// Format an [`LlmResult`] into the Markdown body. Pure, so the degrade-
/// gracefully path (§4.5: a failed extraction still returns the original
/// content, not nothing) is testable without a mock server.
fn render_body(result: &LlmResult) -> String {
    if result.processed {
        format!("# Extraction Result\n\n{}", result.content)
    } else {
        let message = result
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "not processed".to_string());
        format!(
            "{ERROR_SENTINEL}\n\nExtraction was not processed: {message}\n\nOriginal content returned unmodified:\n\n{}",
            result.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::is_error_body;
    use crate::error::{ClassifiedError, ErrorKind};

    #[test]
    fn processed_result_renders_extraction_body_without_sentinel() {
        let result = LlmResult {
            content: "extracted fact".into(),
            processed: true,
            tokens_used: 12,
            error: None,
        };
        let body = render_body(&result);
        assert!(!is_error_body(&body));
        assert!(body.contains("extracted fact"));
    }

    #[test]
    fn unprocessed_result_degrades_to_original_content_with_sentinel() {
        let result = LlmResult {
            content: "original raw content".into(),
            processed: false,
            tokens_used: 0,
            error: Some(ClassifiedError::new(ErrorKind::Internal, "Empty response received")),
        };
        let body = render_body(&result);
        assert!(is_error_body(&body));
        assert!(body.contains("original raw content"));
        assert!(body.contains("Empty response received"));
    }
}
