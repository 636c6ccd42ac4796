//! Answer synthesis from retrieved context.
//!
//! Builds a grounding prompt from the retrieved chunk texts and asks the
//! LLM to answer using only that material.

use sibyl_llm::{ChatOptions, LlmProvider, Message};

use crate::error::PipelineError;

const SYSTEM_PROMPT: &str = "You answer questions using only the provided context";

/// Renders the grounding prompt for a question and its retrieved contexts.
///
/// Each context is prefixed with `" - "` so the model sees a bulleted list,
/// and contexts are separated by blank lines.
#[must_use]
pub fn grounding_prompt(question: &str, contexts: &[String]) -> String {
    let content_block = contexts
        .iter()
        .map(|c| format!(" - {c}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following context to answer the question. \n\nContext:\n{content_block}\n\nQuestion: {question}\nAnswer concisely using the context above."
    )
}

/// Asks the provider to answer `question` grounded in `contexts`.
pub async fn synthesize<P: LlmProvider>(
    provider: &P,
    question: &str,
    contexts: &[String],
    options: ChatOptions,
) -> Result<String, PipelineError> {
    let messages = [
        Message::system(SYSTEM_PROMPT),
        Message::user(grounding_prompt(question, contexts)),
    ];
    let answer = provider.chat(&messages, options).await?;
    Ok(answer)
}
