//! LLM adapter (C5) — a chat-completion proxy (OpenRouter-shaped API).
//!
//! Sends a user-supplied extraction/research prompt against a configured
//! maximum output-token budget. Input exceeding a configured character
//! ceiling is truncated with a marker before it's sent. On final failure
//! (after C2 has exhausted retries) the adapter degrades gracefully: it
//! returns a response marked "not processed" carrying the *original* input
//! content, so a caller can still show the user something instead of
//! nothing (§4.5).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClassifiedError, ErrorKind};
use crate::retry::{run_with_retry, RetryPolicy};

use super::send_classified;

const TRUNCATION_MARKER: &str = "\n\n[... content truncated ...]";

#[derive(Debug, Clone, Serialize)]
pub struct LlmResult {
    pub content: String,
    pub processed: bool,
    pub tokens_used: u32,
    pub error: Option<ClassifiedError>,
}

pub struct LlmAdapter {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    deadline: Duration,
    input_char_ceiling: usize,
}

impl LlmAdapter {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        deadline: Duration,
        input_char_ceiling: usize,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            deadline,
            input_char_ceiling,
        }
    }

    pub fn retry_policy() -> RetryPolicy {
        RetryPolicy::for_llm()
    }

    /// Run a chat completion with `prompt` as the system/instruction text and
    /// `content` as the user content to operate over (truncated if it
    /// exceeds the configured character ceiling). Never returns `Err` — a
    /// final failure degrades to `processed: false` carrying the original,
    /// untruncated `content` (§4.5).
    pub async fn complete(&self, prompt: &str, content: &str, model: &str, max_tokens: u32) -> LlmResult {
        let truncated = truncate_input(content, self.input_char_ceiling);
        let policy = Self::retry_policy();
        let prompt = prompt.to_string();
        let model = model.to_string();
        let result = run_with_retry(
            |_attempt| {
                let prompt = prompt.clone();
                let model = model.clone();
                let truncated = truncated.clone();
                async move { self.call(&prompt, &truncated, &model, max_tokens).await }
            },
            &policy,
        )
        .await;

        match result {
            Ok(result) => result,
            Err(err) => LlmResult {
                content: content.to_string(),
                processed: false,
                tokens_used: 0,
                error: Some(err),
            },
        }
    }

    async fn call(
        &self,
        prompt: &str,
        content: &str,
        model: &str,
        max_tokens: u32,
    ) -> Result<LlmResult, ClassifiedError> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }
        #[derive(Deserialize)]
        struct ChoiceMessage {
            #[serde(default)]
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Usage {
            #[serde(default)]
            total_tokens: u32,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
            #[serde(default)]
            usage: Option<Usage>,
        }

        let request_body = ChatRequest {
            model,
            messages: vec![
                Message { role: "system", content: prompt },
                Message { role: "user", content },
            ],
            max_tokens,
        };
        let request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body);
        let (_status, body) = send_classified(request, self.deadline).await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| crate::error::classify(crate::error::ClassifiableFailure::Message(&e.to_string())))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ClassifiedError::new(ErrorKind::Internal, "Empty response received").retryable(false));
        }

        Ok(LlmResult {
            content: text,
            processed: true,
            tokens_used: parsed.usage.map(|u| u.total_tokens).unwrap_or_default(),
            error: None,
        })
    }
}

fn truncate_input(content: &str, ceiling: usize) -> String {
    if content.len() <= ceiling {
        content.to_string()
    } else {
        let mut truncated = content.chars().take(ceiling).collect::<String>();
        truncated.push_str(TRUNCATION_MARKER);
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_not_truncated() {
        assert_eq!(truncate_input("hello", 100), "hello");
    }

    #[test]
    fn long_input_is_truncated_with_marker() {
        let long = "a".repeat(200);
        let truncated = truncate_input(&long, 50);
        assert!(truncated.len() < long.len());
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn exact_ceiling_length_is_not_truncated() {
        let exact = "a".repeat(50);
        assert_eq!(truncate_input(&exact, 50), exact);
    }
}
