//! `deep_research` tool handler: fan out research questions to the LLM
//! adapter under a shared token budget (scenario 6, §8).

const RESEARCH_SYSTEM_PROMPT: &str =
    "You are a research assistant. Answer the question thoroughly and cite reasoning where relevant.";

use crate::allocator::allocate_tokens;
use crate::context::AppContext;
use crate::dispatch::ERROR_SENTINEL;
use crate::fanout::run_bounded;

use super::check_bounds;

pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 10;

pub async fn handle(ctx: &AppContext, questions: Vec<String>, token_budget: Option<u32>) -> String {
    if let Err(msg) = check_bounds(questions.len(), MIN_QUESTIONS, MAX_QUESTIONS, "questions") {
        return format!("{ERROR_SENTINEL}\n\n{msg}");
    }

    let budget = token_budget.unwrap_or(ctx.config.tunables.default_token_budget);
    let allocation = allocate_tokens(budget, questions.len());

    let llm = ctx.llm.clone();
    let model = ctx.config.research_model.clone();
    let per_item = allocation.per_item;
    let concurrency = ctx.config.tunables.llm_concurrency;
    let results = run_bounded(questions.clone(), concurrency, move |question| {
        let llm = llm.clone();
        let model = model.clone();
        async move { llm.complete(RESEARCH_SYSTEM_PROMPT, &question, &model, per_item).await }
    })
    .await;

    let successes = results.iter().filter(|r| r.processed).count();
    let failures = results.len() - successes;

    let mut body = format!(
        "# Deep Research\n\n{} questions researched ({} succeeded, {} failed).\n\n\
         **Token Allocation**: {} tokens/question (budget {})\n",
        questions.len(),
        successes,
        failures,
        allocation.per_item,
        allocation.total,
    );

    for (question, result) in questions.iter().zip(results.iter()) {
        body.push_str(&format!("\n## {question}\n"));
        if result.processed {
            body.push_str(&result.content);
            body.push('\n');
        } else {
            let message = result
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "not processed".to_string());
            body.push_str(&format!("_not successful: {message}_\n"));
        }
    }

    if successes == 0 {
        body = format!("{ERROR_SENTINEL}\n\n{body}");
    }

    body
}
