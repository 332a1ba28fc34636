//! One question against one document: prompt, model call, parse, measure.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::answer::Answer;
use crate::document::{DocumentContext, Question};
use crate::error::Error;
use crate::model_client::{Invocation, ModelClient};
use crate::parser::parse_answer;
use crate::prompt::build_answer_prompt;

/// An answer plus the metadata recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(flatten)]
    pub answer: Answer,
    /// Wall-clock time spent in the model client, retries and backoff included.
    pub processing_time_ms: u64,
    /// Size-based estimate for reporting; not a tokenizer count.
    pub estimated_tokens: u64,
    /// Provider calls made for this answer.
    pub attempts: u32,
    /// Set when the answer was synthesized because the provider stayed overloaded.
    #[serde(default)]
    pub degraded: bool,
}

/// Roughly four characters per token.
pub fn estimate_tokens(prompt: &str, output: &str) -> u64 {
    let chars = (prompt.chars().count() + output.chars().count()) as u64;
    chars.div_ceil(4)
}

pub struct QueryExecutor {
    client: ModelClient,
}

impl QueryExecutor {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    /// Answer `question` from `document`.
    ///
    /// Input is validated before anything is sent to the provider. Fatal
    /// provider errors propagate unchanged; persistence is left to the caller.
    pub async fn execute(&self, document: &DocumentContext, question: &str) -> Result<QueryResult, Error> {
        let question = Question::parse(question)?;
        document.ensure_ready()?;

        let prompt = build_answer_prompt(&document.text, question.as_str());
        debug!(
            document_id = %document.id,
            prompt_len = prompt.len(),
            "Executing query"
        );

        let started = Instant::now();
        let invocation = self.client.invoke(&prompt).await?;
        let processing_time_ms = started.elapsed().as_millis() as u64;

        let result = match invocation {
            Invocation::Generated { text, attempts } => QueryResult {
                answer: parse_answer(&text),
                processing_time_ms,
                estimated_tokens: estimate_tokens(&prompt, &text),
                attempts,
                degraded: false,
            },
            Invocation::Degraded { attempts, .. } => QueryResult {
                answer: Answer::degraded(attempts),
                processing_time_ms,
                estimated_tokens: estimate_tokens(&prompt, ""),
                attempts,
                degraded: true,
            },
        };

        info!(
            document_id = %document.id,
            can_answer = result.answer.can_answer,
            confidence = result.answer.confidence,
            processing_time_ms = result.processing_time_ms,
            attempts = result.attempts,
            degraded = result.degraded,
            "Query answered"
        );

        Ok(result)
    }
}
